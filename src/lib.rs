#![cfg_attr(not(test), no_std)]
//! SX127x LoRa Packet Driver
//!
//! This crate drives the Semtech SX1276/77/78/79 transceivers in LoRa mode and
//! adds a small link layer on top: every frame carries a 4-byte header with
//! destination, source, sequence id and flags, data frames addressed to a node
//! can be acknowledged automatically, and a sender can retransmit until it
//! sees the acknowledgement.
//!
//! # Features
//! - Addressed unicast and broadcast (address 255) delivery
//! - Automatic acknowledgements and retrying sends, blocking or async
//! - Interrupt-driven reception into a bounded queue, with an optional
//!   handler called from interrupt context
//! - RSSI and SNR for every received packet
//! - Four fixed modem presets shared with other nodes in the field
//! - `no_std`, no allocation; logging through `defmt` or `log`
//!
//! # Architecture
//! The driver is organized into several modules:
//!
//! - [`device`]: Register transport over an [`embedded_hal::spi::SpiDevice`]
//!   - Single and burst register access, FIFO access
//!   - Typed access to the registers in [`registers`]
//!
//! - [`registers`]: Register definitions for the LoRa register page
//!
//! - [`mode`]: Operating modes and the DIO0 mapping that goes with each
//!
//! - [`config`]: Radio settings and their register encoding
//!   - Carrier frequency, transmit power, modem presets
//!
//! - [`packet`]: Frame header codec and signal quality
//!
//! - [`radio`]: The [`Radio`] driver tying it all together
//!   - Init sequence, interrupt dispatch, sending with and without
//!     acknowledgement
//!
//! # Usage
//! [`Radio`] takes `&self` everywhere so it can live in a `static` shared with
//! the DIO0 interrupt handler. The application owns the GPIO lines: it drives
//! the optional reset line through [`Radio::reset`] and routes the DIO0 rising
//! edge to [`Radio::on_interrupt`].
//!
//! 1. Create a [`Radio`] with the SPI device and a [`RadioConfig`]
//! 2. Optionally pulse the reset line with [`Radio::reset`]
//! 3. Call [`Radio::init`]; the radio ends up listening
//! 4. Enable the DIO0 interrupt
//! 5. Send with [`Radio::send`] or [`Radio::send_and_wait`], drain received
//!    packets with [`Radio::receive`]
//!
//! # Important Notes
//! - [`Radio::init`] fails with [`Error::ModeMismatch`] when the chip does not
//!   answer; the radio must not be used afterwards
//! - After acknowledging a packet or finishing a plain [`Radio::send`] the
//!   radio idles in standby; call [`Radio::listen`] to receive again
//! - Only one [`Radio::send_and_wait`] may run at a time
//!
//! # Example
//! ```no_run
//! use embedded_hal::{delay::DelayNs, spi::SpiDevice};
//! use sx127x_link::{Error, Radio, RadioConfig};
//!
//! fn ping<SPI: SpiDevice, D: DelayNs>(spi: SPI, delay: &mut D) -> Result<bool, Error> {
//!     let radio = Radio::new(
//!         spi,
//!         RadioConfig {
//!             frequency_mhz: 868.0,
//!             address: 1,
//!             ..Default::default()
//!         },
//!     );
//!     radio.init(delay)?;
//!
//!     // three retries, 200 ms per attempt
//!     radio.send_and_wait(b"PING", 2, 3, 200, delay)
//! }
//! ```

#[macro_use]
mod fmt;

pub mod config;
pub mod device;
mod error;
pub mod mode;
pub mod packet;
pub mod radio;
pub mod registers;

pub use config::{ModemPreset, RadioConfig};
pub use device::Device;
pub use error::Error;
pub use mode::Mode;
pub use packet::{Flags, Header, Packet, BROADCAST_ADDRESS};
pub use radio::{Radio, ReceiveHandler, RxStats};
