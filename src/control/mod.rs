pub mod heading;
pub mod mixer;
pub mod motor;
pub mod receiver;
