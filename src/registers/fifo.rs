//! FIFO pointer registers
//!
//! The 256-byte FIFO is shared between transmit and receive. The driver never
//! runs both at once, so both base addresses are left at 0.

use core::convert::Infallible;

use regiface::{register, FromByteArray, ReadableRegister, ToByteArray, WritableRegister};

/// FIFO SPI pointer (address: 0x0D)
///
/// Position of the next FIFO data register access. Incremented by the chip
/// after every byte read or written through address 0x00.
#[register(0x0Du8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister, Default)]
pub struct FifoAddrPtr {
    /// FIFO offset
    pub address: u8,
}

/// Transmit base address in FIFO (address: 0x0E)
#[register(0x0Eu8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister, Default)]
pub struct FifoTxBaseAddr {
    /// FIFO offset where the packet to send starts
    pub address: u8,
}

/// Receive base address in FIFO (address: 0x0F)
#[register(0x0Fu8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister, WritableRegister, Default)]
pub struct FifoRxBaseAddr {
    /// FIFO offset where received packets are written
    pub address: u8,
}

/// Start address of the last packet received (address: 0x10, read-only)
#[register(0x10u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ReadableRegister)]
pub struct FifoRxCurrentAddr {
    /// FIFO offset of the first byte of the last received packet
    pub address: u8,
}

macro_rules! single_byte_address {
    ($($reg:ident),*) => {
        $(
            impl FromByteArray for $reg {
                type Error = Infallible;
                type Array = [u8; 1];

                fn from_bytes(bytes: Self::Array) -> Result<Self, Self::Error> {
                    Ok(Self { address: bytes[0] })
                }
            }
        )*
    };
}

single_byte_address!(FifoAddrPtr, FifoTxBaseAddr, FifoRxBaseAddr, FifoRxCurrentAddr);

impl ToByteArray for FifoAddrPtr {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.address])
    }
}

impl ToByteArray for FifoTxBaseAddr {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.address])
    }
}

impl ToByteArray for FifoRxBaseAddr {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.address])
    }
}
