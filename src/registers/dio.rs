//! Digital IO mapping register
//!
//! DIO0 is the only interrupt line the driver uses. Its meaning depends on the
//! mapping written here, so it is reprogrammed on every transition into
//! transmit or continuous receive.

use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

/// Source signalled on DIO0 in LoRa mode (bits 7:6 of [`DioMapping1`])
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dio0Mapping {
    /// 00: RxDone
    RxDone = 0b00,
    /// 01: TxDone
    TxDone = 0b01,
    /// 10: CadDone
    CadDone = 0b10,
    /// 11: unused in LoRa mode
    None = 0b11,
}

/// DIO mapping register 1 (address: 0x40)
///
/// Only DIO0 is configured; DIO1..DIO3 are left on mapping 00.
#[register(0x40u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister)]
pub struct DioMapping1 {
    /// DIO0 source
    pub dio0: Dio0Mapping,
}

impl FromByteArray for DioMapping1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
        let dio0 = match bytes[0] >> 6 {
            0b00 => Dio0Mapping::RxDone,
            0b01 => Dio0Mapping::TxDone,
            0b10 => Dio0Mapping::CadDone,
            _ => Dio0Mapping::None,
        };
        Ok(Self { dio0 })
    }
}

impl ToByteArray for DioMapping1 {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([(self.dio0 as u8) << 6])
    }
}
