//! SX127x register transport
//!
//! This module provides the low-level interface to the radio: every access is a
//! single SPI transaction made of one address byte followed by the payload.
//! Bit 7 of the address byte selects a write (1) or a read (0). Chip-select
//! framing is left to the [`SpiDevice`] implementation.
//!
//! On top of the raw [`Device::read`] and [`Device::write`] calls sit typed
//! accessors for the registers defined in [`crate::registers`].
//!
//! # Example
//! ```no_run
//! use sx127x_link::{Device, registers::OpMode};
//! # fn example<SPI: embedded_hal::spi::SpiDevice>(spi: SPI) -> Result<(), sx127x_link::Error> {
//! let mut device = Device::new(spi);
//!
//! let mode: OpMode = device.read_register()?;
//! device.write_fifo(&[0x01, 0x02, 0x03])?;
//! # Ok(())
//! # }
//! ```

use core::convert::Infallible;

use embedded_hal::spi::{Operation, SpiDevice};
use regiface::{errors::Error as RegifaceError, ByteArray, ReadableRegister, WritableRegister};

use crate::registers::FIFO_ADDRESS;

const WRITE_BIT: u8 = 0x80;

/// Register-level interface to the SX127x.
///
/// Not reentrant: a transaction must not be interrupted by another one on the
/// same bus. [`crate::Radio`] guarantees this by only touching the device
/// inside a critical section.
pub struct Device<SPI> {
    spi: SPI,
}

impl<SPI> Device<SPI> {
    /// Creates a new Device instance wrapping the provided SPI interface.
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Releases the underlying SPI device.
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI> Device<SPI>
where
    SPI: SpiDevice,
{
    /// Writes `bytes` starting at register `address`.
    ///
    /// The chip auto-increments the address for every byte except at the FIFO
    /// data register.
    ///
    /// # Errors
    /// * `RegifaceError::BusError` - SPI communication failed
    pub fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), RegifaceError> {
        self.spi
            .transaction(&mut [
                Operation::Write(&[address | WRITE_BIT]),
                Operation::Write(bytes),
            ])
            .map_err(|_| RegifaceError::BusError)
    }

    /// Reads `bytes.len()` bytes starting at register `address`.
    ///
    /// # Errors
    /// * `RegifaceError::BusError` - SPI communication failed
    pub fn read(&mut self, address: u8, bytes: &mut [u8]) -> Result<(), RegifaceError> {
        self.spi
            .transaction(&mut [
                Operation::Write(&[address & !WRITE_BIT]),
                Operation::Read(bytes),
            ])
            .map_err(|_| RegifaceError::BusError)
    }

    /// Reads a register value from the device.
    ///
    /// # Errors
    /// * `RegifaceError::BusError` - SPI communication failed
    /// * `RegifaceError::DeserializationError` - Failed to parse register value
    pub fn read_register<R>(&mut self) -> Result<R, RegifaceError>
    where
        R: ReadableRegister<IdType = u8>,
    {
        let mut raw_value = R::Array::new();
        self.read(R::id(), raw_value.as_mut())?;

        R::from_bytes(raw_value).map_err(|_| RegifaceError::DeserializationError)
    }

    /// Writes a value to a device register.
    ///
    /// # Errors
    /// * `RegifaceError::BusError` - SPI communication failed
    pub fn write_register<R>(&mut self, register: R) -> Result<(), RegifaceError>
    where
        R: WritableRegister<IdType = u8, Error = Infallible>,
    {
        let raw_value = match register.to_bytes() {
            Ok(raw) => raw,
            Err(never) => match never {},
        };

        self.write(R::id(), raw_value.as_ref())
    }

    /// Writes bytes to the FIFO at the current FIFO pointer.
    pub fn write_fifo(&mut self, bytes: &[u8]) -> Result<(), RegifaceError> {
        self.write(FIFO_ADDRESS, bytes)
    }

    /// Reads bytes from the FIFO at the current FIFO pointer.
    pub fn read_fifo(&mut self, bytes: &mut [u8]) -> Result<(), RegifaceError> {
        self.read(FIFO_ADDRESS, bytes)
    }
}
