//! Packet framing and signal quality
//!
//! Every frame starts with a 4-byte header followed by up to 251 payload bytes:
//!
//! | byte | field                          |
//! |------|--------------------------------|
//! | 0    | destination address            |
//! | 1    | source address                 |
//! | 2    | sequence id                    |
//! | 3    | flags (bit 7 = acknowledgement)|
//! | 4..  | application payload            |

use bitflags::bitflags;
use num_traits::float::FloatCore;

/// Size of the frame header in bytes
pub const HEADER_LEN: usize = 4;

/// Size of the chip FIFO usable for one frame
pub const MAX_FRAME_LEN: usize = 255;

/// Largest application payload: FIFO size minus header
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - HEADER_LEN;

/// Destination address that reaches every node. Never acknowledged.
pub const BROADCAST_ADDRESS: u8 = 255;

const RSSI_OFFSET_HIGH_BAND: f32 = 157.0;
const RSSI_OFFSET_LOW_BAND: f32 = 164.0;

bitflags! {
    /// Header flags byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        /// Frame acknowledges the sequence id in its header
        const ACK = 0x80;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Flags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Flags({=u8:#04x})", self.bits())
    }
}

/// Frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    /// Destination address
    pub to: u8,
    /// Source address
    pub from: u8,
    /// Sequence id
    pub id: u8,
    /// Flags
    pub flags: Flags,
}

impl Header {
    /// Builds the acknowledgement for a received data frame, sent back by `me`.
    pub fn ack_for(received: &Header, me: u8) -> Self {
        Self {
            to: received.from,
            from: me,
            id: received.id,
            flags: Flags::ACK,
        }
    }

    /// Whether this frame is an acknowledgement
    pub fn is_ack(&self) -> bool {
        self.flags.contains(Flags::ACK)
    }

    /// Whether this frame is addressed to every node
    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST_ADDRESS
    }

    fn to_bytes(self) -> [u8; HEADER_LEN] {
        [self.to, self.from, self.id, self.flags.bits()]
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            to: bytes[0],
            from: bytes[1],
            id: bytes[2],
            flags: Flags::from_bits_retain(bytes[3]),
        }
    }
}

/// Error type for frame encoding and decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Fewer bytes than a header
    TooShort(usize),
    /// More payload than fits in the FIFO
    TooLong(usize),
}

/// Writes header and payload into `buf`, returning the frame length.
pub fn encode(header: Header, payload: &[u8], buf: &mut [u8; MAX_FRAME_LEN]) -> Result<usize, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::TooLong(payload.len()));
    }
    let len = HEADER_LEN + payload.len();
    buf[..HEADER_LEN].copy_from_slice(&header.to_bytes());
    buf[HEADER_LEN..len].copy_from_slice(payload);
    Ok(len)
}

/// Splits a raw frame into header and payload.
pub fn decode(frame: &[u8]) -> Result<(Header, &[u8]), FrameError> {
    if frame.len() < HEADER_LEN {
        return Err(FrameError::TooShort(frame.len()));
    }
    if frame.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLong(frame.len() - HEADER_LEN));
    }
    Ok((Header::from_bytes(frame), &frame[HEADER_LEN..]))
}

/// Link quality of a received packet
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalQuality {
    /// Received signal strength in dBm
    pub rssi: i16,
    /// Signal to noise ratio in dB
    pub snr: f32,
}

impl SignalQuality {
    /// Derives RSSI and SNR from the raw `PktSnrValue` and `PktRssiValue` readings.
    ///
    /// SNR is the signed raw value in quarter dB. Below 0 dB SNR the RSSI is
    /// `raw + snr`, otherwise it is linearized as `raw * 16 / 15`. The band
    /// offset is then 157 (>= 779 MHz) or 164, and the result is rounded to
    /// the nearest dBm.
    pub fn from_raw(raw_snr: i8, raw_rssi: u8, high_band: bool) -> Self {
        let snr = raw_snr as f32 / 4.0;
        let mut rssi = if snr < 0.0 {
            raw_rssi as f32 + snr
        } else {
            raw_rssi as f32 * 16.0 / 15.0
        };
        rssi -= if high_band {
            RSSI_OFFSET_HIGH_BAND
        } else {
            RSSI_OFFSET_LOW_BAND
        };

        Self {
            rssi: FloatCore::round(rssi) as i16,
            snr,
        }
    }
}

/// A received frame
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    /// Frame header
    pub header: Header,
    /// Application payload, 0..=251 bytes
    pub payload: heapless::Vec<u8, MAX_PAYLOAD_LEN>,
    /// Received signal strength in dBm
    pub rssi: i16,
    /// Signal to noise ratio in dB
    pub snr: f32,
}

impl Packet {
    /// Decodes a raw frame read from the FIFO.
    pub fn from_frame(frame: &[u8], quality: SignalQuality) -> Result<Self, FrameError> {
        let (header, body) = decode(frame)?;
        let payload =
            heapless::Vec::from_slice(body).map_err(|_| FrameError::TooLong(body.len()))?;
        Ok(Self {
            header,
            payload,
            rssi: quality.rssi,
            snr: quality.snr,
        })
    }
}
