//! Operating mode register

use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

/// Transceiver mode bits of [`OpMode`] (bits 2:0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceMode {
    /// SLEEP: lowest power, FIFO not accessible
    Sleep = 0b000,
    /// STDBY: crystal oscillator running
    Standby = 0b001,
    /// FSTX: frequency synthesis for transmit
    FrequencySynthesisTx = 0b010,
    /// TX: transmit the FIFO contents, then return to STDBY
    Transmit = 0b011,
    /// FSRX: frequency synthesis for receive
    FrequencySynthesisRx = 0b100,
    /// RXCONTINUOUS: receive until told otherwise
    ReceiveContinuous = 0b101,
    /// RXSINGLE: receive one packet, then return to STDBY
    ReceiveSingle = 0b110,
    /// CAD: channel activity detection
    ChannelActivityDetection = 0b111,
}

impl DeviceMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0b000 => Self::Sleep,
            0b001 => Self::Standby,
            0b010 => Self::FrequencySynthesisTx,
            0b011 => Self::Transmit,
            0b100 => Self::FrequencySynthesisRx,
            0b101 => Self::ReceiveContinuous,
            0b110 => Self::ReceiveSingle,
            _ => Self::ChannelActivityDetection,
        }
    }
}

/// Operating mode register (address: 0x01)
///
/// # Important Notes
/// - `long_range` selects LoRa (true) or FSK/OOK (false) and can only be
///   changed while the device is in SLEEP
/// - The mode bits are the only thing the driver changes at runtime
#[register(0x01u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct OpMode {
    /// LongRangeMode bit (bit 7)
    pub long_range: bool,
    /// Transceiver mode (bits 2:0)
    pub mode: DeviceMode,
}

impl OpMode {
    /// LoRa operating mode register value for `mode`
    pub const fn lora(mode: DeviceMode) -> Self {
        Self {
            long_range: true,
            mode,
        }
    }

    /// Raw register byte
    pub fn bits(self) -> u8 {
        (if self.long_range { 0x80 } else { 0x00 }) | self.mode as u8
    }
}

impl FromByteArray for OpMode {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        Ok(Self {
            long_range: bytes[0] & 0x80 != 0,
            mode: DeviceMode::from_bits(bytes[0]),
        })
    }
}

impl ToByteArray for OpMode {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.bits()])
    }
}
