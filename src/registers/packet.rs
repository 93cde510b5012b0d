//! Packet status and interrupt registers
//!
//! This module contains the registers read by the receive path:
//! - Interrupt flags (read, then cleared by writing the same bits back)
//! - Received byte count
//! - Last packet SNR and RSSI
//!
//! plus the payload length written by the transmit path.

use bitflags::bitflags;
use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

bitflags! {
    /// LoRa interrupt sources as reported in [`IrqFlags`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts: u8 {
        /// Reception timed out (single receive mode only)
        const RX_TIMEOUT = 0x80;
        /// Packet reception complete
        const RX_DONE = 0x40;
        /// Payload CRC check failed
        const PAYLOAD_CRC_ERROR = 0x20;
        /// Valid header received
        const VALID_HEADER = 0x10;
        /// Packet transmission complete
        const TX_DONE = 0x08;
        /// Channel activity detection finished
        const CAD_DONE = 0x04;
        /// Frequency hop requested
        const FHSS_CHANGE_CHANNEL = 0x02;
        /// Channel activity detected
        const CAD_DETECTED = 0x01;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Interrupts {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Interrupts({=u8:#04x})", self.bits())
    }
}

/// Interrupt flags register (address: 0x12)
///
/// Flags are cleared by writing a 1 to them. Writing back the value that was
/// just read clears exactly the interrupts that were pending.
#[register(0x12u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct IrqFlags {
    /// Pending interrupt sources
    pub flags: Interrupts,
}

/// Number of payload bytes of the last packet received (address: 0x13, read-only)
#[register(0x13u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister)]
pub struct RxNbBytes {
    /// Byte count
    pub count: u8,
}

/// SNR estimate of the last packet received (address: 0x19, read-only)
///
/// Two's complement, in quarters of a dB.
#[register(0x19u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister)]
pub struct PktSnrValue {
    /// Raw signed SNR value (dB * 4)
    pub raw: i8,
}

/// RSSI of the last packet received (address: 0x1A, read-only)
///
/// Must be offset and, for positive SNR, linearized before use. See
/// [`crate::packet::SignalQuality`].
#[register(0x1Au8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister)]
pub struct PktRssiValue {
    /// Raw unsigned RSSI value
    pub raw: u8,
}

/// Payload length for transmission (address: 0x22)
///
/// Counts the full frame written to the FIFO, header included.
#[register(0x22u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct PayloadLength {
    /// Frame length in bytes, 1..=255
    pub length: u8,
}

impl FromByteArray for IrqFlags {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            flags: Interrupts::from_bits_retain(bytes[0]),
        })
    }
}

impl ToByteArray for IrqFlags {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.flags.bits()])
    }
}

impl FromByteArray for RxNbBytes {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { count: bytes[0] })
    }
}

impl FromByteArray for PktSnrValue {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            raw: bytes[0] as i8,
        })
    }
}

impl FromByteArray for PktRssiValue {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { raw: bytes[0] })
    }
}

impl FromByteArray for PayloadLength {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self { length: bytes[0] })
    }
}

impl ToByteArray for PayloadLength {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.length])
    }
}
