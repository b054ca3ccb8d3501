//! AS5600 12-bit magnetic rotary encoder.
//!
//! Generic over any `embedded-hal` 1.0 blocking I2C bus, so the same code
//! runs against `esp-idf-hal`'s `I2cDriver` on the device and a register
//! mock in tests.
//!
//! Only the two reads the controller needs are implemented: the unscaled
//! raw angle and the magnet status bits.

use embedded_hal::i2c::I2c;
use log::debug;

use crate::app::ports::MagnetStatus;
use crate::error::DriverError;

/// Fixed 7-bit bus address.
pub const ADDRESS: u8 = 0x36;

const REG_STATUS: u8 = 0x0B;
/// RAW ANGLE high byte; the low byte follows at 0x0D.
const REG_RAW_ANGLE: u8 = 0x0C;

const STATUS_MH: u8 = 0x08;
const STATUS_ML: u8 = 0x10;
const STATUS_MD: u8 = 0x20;

pub struct As5600<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> As5600<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Raw angle, 0–4095, before any ZPOS/MPOS scaling.
    pub fn read_raw_angle(&mut self) -> Result<u16, DriverError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(ADDRESS, &[REG_RAW_ANGLE], &mut buf)
            .map_err(|_| DriverError::I2c)?;
        Ok(u16::from_be_bytes(buf) & 0x0FFF)
    }

    pub fn magnet_status(&mut self) -> Result<MagnetStatus, DriverError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(ADDRESS, &[REG_STATUS], &mut buf)
            .map_err(|_| DriverError::I2c)?;
        let status = MagnetStatus {
            detected: buf[0] & STATUS_MD != 0,
            too_weak: buf[0] & STATUS_ML != 0,
            too_strong: buf[0] & STATUS_MH != 0,
        };
        debug!("as5600 status 0x{:02x} -> {:?}", buf[0], status);
        Ok(status)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}
