//! RF-related registers
//!
//! This module contains registers related to RF configuration:
//! - Carrier frequency
//! - Power amplifier selection and output power
//! - High power (+20 dBm) DAC setting

use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

/// RF carrier frequency registers (addresses: 0x06 MSB, 0x07 MID, 0x08 LSB)
///
/// Written as a single 3-byte burst; the chip auto-increments the address.
///
/// # Frequency Calculation
/// f_RF = F_STEP * frf, where F_STEP = F_XOSC / 2^19 (~61 Hz with a 32 MHz crystal)
///
/// # Important Notes
/// - The new frequency only takes effect on the write of the LSB
/// - Only the low 24 bits of `frf` are meaningful
#[register(0x06u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct Frequency {
    /// Frequency synthesizer steps
    pub frf: u32,
}

/// Power amplifier configuration register (address: 0x09)
///
/// # Important Notes
/// - Boards wired to the PA_BOOST pin must set `pa_boost`
/// - `output_power` is written as-is into bits 6:0, so values above 15 spill
///   into the MaxPower field. The power table in [`crate::config`] relies on
///   this to stay compatible with deployed nodes.
#[register(0x09u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct PaConfig {
    /// PaSelect bit (bit 7): true = PA_BOOST pin, false = RFO pin
    pub pa_boost: bool,
    /// Bits 6:0 (MaxPower and OutputPower)
    pub output_power: u8,
}

/// High power settings of the PA_BOOST pin (address: 0x4D)
#[register(0x4Du8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub enum PaDac {
    /// 0x04: default, up to +17 dBm on PA_BOOST
    Default,
    /// 0x07: +20 dBm on PA_BOOST
    HighPower,
}

/// Error type for PA DAC conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidPaDac(pub u8);

impl PaDac {
    /// Convert a raw byte value to PaDac
    pub fn from_byte(value: u8) -> Result<Self, InvalidPaDac> {
        match value & 0x07 {
            0x04 => Ok(Self::Default),
            0x07 => Ok(Self::HighPower),
            _ => Err(InvalidPaDac(value)),
        }
    }

    /// Convert PaDac to its raw byte value
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Default => 0x04,
            Self::HighPower => 0x07,
        }
    }
}

impl FromByteArray for Frequency {
    type Error = Infallible;
    type Array = [u8; 3];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            frf: u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]),
        })
    }
}

impl ToByteArray for Frequency {
    type Error = Infallible;
    type Array = [u8; 3];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        let [_, msb, mid, lsb] = self.frf.to_be_bytes();
        Ok([msb, mid, lsb])
    }
}

impl FromByteArray for PaConfig {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            pa_boost: bytes[0] & 0x80 != 0,
            output_power: bytes[0] & 0x7F,
        })
    }
}

impl ToByteArray for PaConfig {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([(if self.pa_boost { 0x80 } else { 0x00 }) | (self.output_power & 0x7F)])
    }
}

impl FromByteArray for PaDac {
    type Error = InvalidPaDac;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Self::from_byte(bytes[0])
    }
}

impl ToByteArray for PaDac {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.to_byte()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_is_big_endian() {
        let reg = Frequency { frf: 0xE4C000 };
        assert_eq!(reg.to_bytes().unwrap(), [0xE4, 0xC0, 0x00]);
        assert_eq!(Frequency::from_bytes([0xD9, 0x06, 0x66]).unwrap().frf, 0xD90666);
    }

    #[test]
    fn pa_config_keeps_seven_power_bits() {
        let reg = PaConfig {
            pa_boost: true,
            output_power: 18,
        };
        assert_eq!(reg.to_bytes().unwrap(), [0x92]);
    }
}
