//! Register definitions for the SX127x radio in LoRa mode
//! Taken from the SX1276/77/78/79 datasheet, rev. 7

mod dio;
mod fifo;
mod modem;
mod op_mode;
mod packet;
mod rf;

pub use dio::*;
pub use fifo::*;
pub use modem::*;
pub use op_mode::*;
pub use packet::*;
pub use rf::*;

/// Address of the FIFO data register (0x00)
///
/// Burst accesses at this address read or write the FIFO at the position held
/// by [`FifoAddrPtr`], which the chip advances after every byte.
pub const FIFO_ADDRESS: u8 = 0x00;
