use embedded_hal_async::i2c::I2c;
use heapless::Deque;
use micromath::F32Ext;

use crate::error::{Error, Result};

/// SA0 tied low.
pub const H3LIS331DL_ADDR: u8 = 0x18;
pub const DEVICE_ID: u8 = 0x32;

const WHO_AM_I: u8 = 0x0F;
const CTRL_REG1: u8 = 0x20;
const OUT_X_L: u8 = 0x28;
/// Set on the register address to read consecutive registers in one go.
const AUTO_INCREMENT: u8 = 0x80;

/// Normal power mode, 1 kHz output data rate, X/Y/Z enabled.
const CTRL_REG1_NORMAL_1KHZ_XYZ: u8 = 0b0011_1111;

/// ±100 g full scale: 49 mg per digit of the 12-bit left-justified output.
const G_PER_DIGIT: f32 = 0.049;
pub const STANDARD_GRAVITY: f32 = 9.806_65;

pub struct H3lis331dl<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> H3lis331dl<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c, address: H3LIS331DL_ADDR }
    }

    pub async fn init(&mut self) -> Result<()> {
        let id = self.read_register(WHO_AM_I).await?;
        if id != DEVICE_ID {
            return Err(Error::UnexpectedDevice(id));
        }
        self.write_register(CTRL_REG1, CTRL_REG1_NORMAL_1KHZ_XYZ).await
    }

    /// Raw X, Y, Z output registers.
    pub async fn read_accel_raw(&mut self) -> Result<(i16, i16, i16)> {
        let mut data = [0u8; 6];
        self.i2c
            .write_read(self.address, &[OUT_X_L | AUTO_INCREMENT], &mut data)
            .await
            .map_err(|_| Error::I2c)?;

        let x = i16::from_le_bytes([data[0], data[1]]);
        let y = i16::from_le_bytes([data[2], data[3]]);
        let z = i16::from_le_bytes([data[4], data[5]]);
        Ok((x, y, z))
    }

    async fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut value)
            .await
            .map_err(|_| Error::I2c)?;
        Ok(value[0])
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[register, value])
            .await
            .map_err(|_| Error::I2c)
    }
}

/// Raw output register value in m/s².
pub fn raw_to_mps2(raw: f32) -> f32 {
    (raw / 16.0) * G_PER_DIGIT * STANDARD_GRAVITY
}

/// Moving average over the last `N` raw samples.
pub struct AccelAverager<const N: usize> {
    window: Deque<(i16, i16, i16), N>,
}

impl<const N: usize> AccelAverager<N> {
    pub const fn new() -> Self {
        Self { window: Deque::new() }
    }

    pub fn push(&mut self, sample: (i16, i16, i16)) {
        if self.window.is_full() {
            self.window.pop_front();
        }
        let _ = self.window.push_back(sample);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.window.len()
    }

    /// Averaged acceleration in m/s² with gravity removed from Z.
    pub fn acceleration(&self) -> Option<(f32, f32, f32)> {
        if self.window.is_empty() {
            return None;
        }
        let (sx, sy, sz) = self
            .window
            .iter()
            .fold((0i32, 0i32, 0i32), |(sx, sy, sz), &(x, y, z)| {
                (sx + x as i32, sy + y as i32, sz + z as i32)
            });
        let n = self.window.len() as f32;

        let x = raw_to_mps2(sx as f32 / n);
        let y = raw_to_mps2(sy as f32 / n);
        let z = raw_to_mps2(sz as f32 / n) - STANDARD_GRAVITY;
        Some((x, y, z))
    }

    /// Magnitude of [`Self::acceleration`].
    pub fn magnitude(&self) -> Option<f32> {
        self.acceleration()
            .map(|(x, y, z)| (x * x + y * y + z * z).sqrt())
    }
}

impl<const N: usize> Default for AccelAverager<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, Operation};

    /// Register-file I2C device answering at one address.
    pub struct MockBus {
        pub address: u8,
        pub registers: [u8; 256],
        pub fail: bool,
        pointer: usize,
    }

    impl MockBus {
        pub fn new(address: u8) -> Self {
            Self { address, registers: [0; 256], fail: false, pointer: 0 }
        }

        pub fn set_sample(&mut self, x: i16, y: i16, z: i16) {
            let mut bytes = [0u8; 6];
            bytes[0..2].copy_from_slice(&x.to_le_bytes());
            bytes[2..4].copy_from_slice(&y.to_le_bytes());
            bytes[4..6].copy_from_slice(&z.to_le_bytes());
            self.registers[0x28..0x2e].copy_from_slice(&bytes);
        }
    }

    impl ErrorType for MockBus {
        type Error = ErrorKind;
    }

    impl I2c for MockBus {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail || address != self.address {
                return Err(ErrorKind::Other);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        if let Some((&register, data)) = bytes.split_first() {
                            self.pointer = (register & 0x7f) as usize;
                            for &byte in data {
                                self.registers[self.pointer] = byte;
                                self.pointer += 1;
                            }
                        }
                    }
                    Operation::Read(buf) => {
                        for byte in buf.iter_mut() {
                            *byte = self.registers[self.pointer];
                            self.pointer += 1;
                        }
                    }
                }
            }
            Ok(())
        }
    }
}
