//! Driver error type

use core::fmt;

use regiface::errors::Error as RegifaceError;

/// Errors reported by the radio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The SPI transaction failed
    Bus,
    /// A register value read back from the chip could not be decoded
    Deserialization,
    /// The operating-mode register did not hold the value just written.
    ///
    /// Points at a wiring fault or at a chip that is not an SX127x. The radio
    /// must not be used after this.
    ModeMismatch {
        /// Raw value written to the mode register
        expected: u8,
        /// Raw value read back
        found: u8,
    },
    /// Acknowledged delivery was requested for the broadcast address
    BroadcastAck,
    /// The payload does not fit in the FIFO next to the header
    PayloadTooLarge(usize),
    /// Another acknowledged send is still waiting for its acknowledgement
    SendInProgress,
    /// The reset line could not be driven
    Reset,
}

impl From<RegifaceError> for Error {
    fn from(err: RegifaceError) -> Self {
        match err {
            RegifaceError::BusError => Self::Bus,
            _ => Self::Deserialization,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => f.write_str("SPI bus error"),
            Self::Deserialization => f.write_str("invalid register value"),
            Self::ModeMismatch { expected, found } => write!(
                f,
                "mode register readback mismatch: wrote {expected:#04x}, read {found:#04x}"
            ),
            Self::BroadcastAck => f.write_str("broadcast packets cannot be acknowledged"),
            Self::PayloadTooLarge(len) => write!(f, "payload of {len} bytes exceeds the FIFO"),
            Self::SendInProgress => f.write_str("an acknowledged send is already in progress"),
            Self::Reset => f.write_str("reset pin error"),
        }
    }
}

impl core::error::Error for Error {}
