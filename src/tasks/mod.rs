pub mod control_loop;
pub mod transmit_loop;
