//! LoRa modem configuration registers
//!
//! Bandwidth, coding rate, spreading factor and the associated flags are split
//! across three registers. The driver only ever writes them as one of the
//! literal presets in [`crate::config::ModemPreset`], but they decode into
//! typed fields so a readback can be inspected.

use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

/// Signal bandwidth (bits 7:4 of [`ModemConfig1`])
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bandwidth {
    /// 7.8 kHz
    Khz7_8 = 0,
    /// 10.4 kHz
    Khz10_4 = 1,
    /// 15.6 kHz
    Khz15_6 = 2,
    /// 20.8 kHz
    Khz20_8 = 3,
    /// 31.25 kHz
    Khz31_25 = 4,
    /// 41.7 kHz
    Khz41_7 = 5,
    /// 62.5 kHz
    Khz62_5 = 6,
    /// 125 kHz
    Khz125 = 7,
    /// 250 kHz
    Khz250 = 8,
    /// 500 kHz
    Khz500 = 9,
}

/// Error correction coding rate (bits 3:1 of [`ModemConfig1`])
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodingRate {
    /// 4/5
    Cr4_5 = 1,
    /// 4/6
    Cr4_6 = 2,
    /// 4/7
    Cr4_7 = 3,
    /// 4/8
    Cr4_8 = 4,
}

/// Spreading factor (bits 7:4 of [`ModemConfig2`])
///
/// SF7 spreads each symbol over 128 chips, SF12 over 4096.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpreadingFactor {
    /// 64 chips / symbol
    Sf6 = 6,
    /// 128 chips / symbol
    Sf7 = 7,
    /// 256 chips / symbol
    Sf8 = 8,
    /// 512 chips / symbol
    Sf9 = 9,
    /// 1024 chips / symbol
    Sf10 = 10,
    /// 2048 chips / symbol
    Sf11 = 11,
    /// 4096 chips / symbol
    Sf12 = 12,
}

/// Error type for modem configuration decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvalidModemConfig {
    /// Reserved bandwidth code
    Bandwidth(u8),
    /// Reserved coding rate code
    CodingRate(u8),
    /// Reserved spreading factor code
    SpreadingFactor(u8),
}

impl TryFrom<u8> for Bandwidth {
    type Error = InvalidModemConfig;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Khz7_8),
            1 => Ok(Self::Khz10_4),
            2 => Ok(Self::Khz15_6),
            3 => Ok(Self::Khz20_8),
            4 => Ok(Self::Khz31_25),
            5 => Ok(Self::Khz41_7),
            6 => Ok(Self::Khz62_5),
            7 => Ok(Self::Khz125),
            8 => Ok(Self::Khz250),
            9 => Ok(Self::Khz500),
            invalid => Err(InvalidModemConfig::Bandwidth(invalid)),
        }
    }
}

impl TryFrom<u8> for CodingRate {
    type Error = InvalidModemConfig;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Cr4_5),
            2 => Ok(Self::Cr4_6),
            3 => Ok(Self::Cr4_7),
            4 => Ok(Self::Cr4_8),
            invalid => Err(InvalidModemConfig::CodingRate(invalid)),
        }
    }
}

impl TryFrom<u8> for SpreadingFactor {
    type Error = InvalidModemConfig;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            6 => Ok(Self::Sf6),
            7 => Ok(Self::Sf7),
            8 => Ok(Self::Sf8),
            9 => Ok(Self::Sf9),
            10 => Ok(Self::Sf10),
            11 => Ok(Self::Sf11),
            12 => Ok(Self::Sf12),
            invalid => Err(InvalidModemConfig::SpreadingFactor(invalid)),
        }
    }
}

/// Modem PHY configuration 1 (address: 0x1D)
#[register(0x1Du8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct ModemConfig1 {
    /// Signal bandwidth
    pub bandwidth: Bandwidth,
    /// Coding rate
    pub coding_rate: CodingRate,
    /// Implicit header mode (bit 0); the driver always uses explicit headers
    pub implicit_header: bool,
}

/// Modem PHY configuration 2 (address: 0x1E)
#[register(0x1Eu8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct ModemConfig2 {
    /// Spreading factor
    pub spreading_factor: SpreadingFactor,
    /// Continuous transmit mode (bit 3), for test signals only
    pub tx_continuous: bool,
    /// CRC generation and check on payload (bit 2)
    pub rx_payload_crc_on: bool,
    /// RX timeout MSB (bits 1:0)
    pub symb_timeout_msb: u8,
}

/// Modem PHY configuration 3 (address: 0x26)
#[register(0x26u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct ModemConfig3 {
    /// Mandatory when the symbol length exceeds 16 ms (bit 3)
    pub low_data_rate_optimize: bool,
    /// LNA gain set by the internal AGC loop (bit 2)
    pub agc_auto_on: bool,
}

/// Preamble length in symbols (addresses: 0x20 MSB, 0x21 LSB)
///
/// The chip adds 4.25 symbols to the programmed value.
#[register(0x20u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct PreambleLength {
    /// Programmed preamble length
    pub symbols: u16,
}

impl FromByteArray for ModemConfig1 {
    type Error = InvalidModemConfig;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            bandwidth: Bandwidth::try_from(bytes[0] >> 4)?,
            coding_rate: CodingRate::try_from((bytes[0] >> 1) & 0x07)?,
            implicit_header: bytes[0] & 0x01 != 0,
        })
    }
}

impl ToByteArray for ModemConfig1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([((self.bandwidth as u8) << 4)
            | ((self.coding_rate as u8) << 1)
            | self.implicit_header as u8])
    }
}

impl FromByteArray for ModemConfig2 {
    type Error = InvalidModemConfig;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            spreading_factor: SpreadingFactor::try_from(bytes[0] >> 4)?,
            tx_continuous: bytes[0] & 0x08 != 0,
            rx_payload_crc_on: bytes[0] & 0x04 != 0,
            symb_timeout_msb: bytes[0] & 0x03,
        })
    }
}

impl ToByteArray for ModemConfig2 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([((self.spreading_factor as u8) << 4)
            | ((self.tx_continuous as u8) << 3)
            | ((self.rx_payload_crc_on as u8) << 2)
            | (self.symb_timeout_msb & 0x03)])
    }
}

impl FromByteArray for ModemConfig3 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            low_data_rate_optimize: bytes[0] & 0x08 != 0,
            agc_auto_on: bytes[0] & 0x04 != 0,
        })
    }
}

impl ToByteArray for ModemConfig3 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([((self.low_data_rate_optimize as u8) << 3) | ((self.agc_auto_on as u8) << 2)])
    }
}

impl FromByteArray for PreambleLength {
    type Error = Infallible;
    type Array = [u8; 2];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            symbols: u16::from_be_bytes(bytes),
        })
    }
}

impl ToByteArray for PreambleLength {
    type Error = Infallible;
    type Array = [u8; 2];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok(self.symbols.to_be_bytes())
    }
}
