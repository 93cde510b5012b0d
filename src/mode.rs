//! Operating mode control
//!
//! The driver keeps its own copy of the chip's operating mode instead of
//! querying it: the interrupt handler needs it to tell a TxDone from an RxDone,
//! and skipping redundant writes keeps the SPI traffic in the interrupt path
//! short. The cache is only correct as long as every mode change goes through
//! [`ModeController`].

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use crate::device::Device;
use crate::registers::{Dio0Mapping, DioMapping1, DeviceMode, OpMode};
use crate::Error;

/// Settling time after a forced mode write before reading it back
const MODE_SETTLE_MS: u32 = 10;

/// Operating modes used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Lowest power, configuration retained
    Sleep,
    /// Idle; FIFO and registers accessible
    Standby,
    /// Sending the frame in the FIFO
    Transmit,
    /// Listening for frames
    ReceiveContinuous,
}

impl Mode {
    fn device_mode(self) -> DeviceMode {
        match self {
            Self::Sleep => DeviceMode::Sleep,
            Self::Standby => DeviceMode::Standby,
            Self::Transmit => DeviceMode::Transmit,
            Self::ReceiveContinuous => DeviceMode::ReceiveContinuous,
        }
    }

    /// DIO0 source that has to be active in this mode, if any
    fn dio0(self) -> Option<Dio0Mapping> {
        match self {
            Self::Transmit => Some(Dio0Mapping::TxDone),
            Self::ReceiveContinuous => Some(Dio0Mapping::RxDone),
            Self::Sleep | Self::Standby => None,
        }
    }
}

/// Cached operating mode plus the register writes to change it.
#[derive(Debug)]
pub(crate) struct ModeController {
    current: Option<Mode>,
}

impl ModeController {
    /// The chip's mode is unknown until the first forced write.
    pub const fn new() -> Self {
        Self { current: None }
    }

    pub fn current(&self) -> Option<Mode> {
        self.current
    }

    /// Moves the chip to `target` unless the cache says it is already there.
    ///
    /// Returns whether a write happened.
    pub fn transition<SPI: SpiDevice>(
        &mut self,
        device: &mut Device<SPI>,
        target: Mode,
    ) -> Result<bool, Error> {
        if self.current == Some(target) {
            return Ok(false);
        }

        device.write_register(OpMode::lora(target.device_mode()))?;
        if let Some(dio0) = target.dio0() {
            device.write_register(DioMapping1 { dio0 })?;
        }
        trace!("mode {:?} -> {:?}", self.current, target);
        self.current = Some(target);
        Ok(true)
    }

    /// Writes `target` regardless of the cache and verifies it by reading
    /// the register back.
    ///
    /// Used during init, when the chip state is unknown. LoRa mode can only be
    /// entered from sleep, so the first forced mode must be [`Mode::Sleep`].
    pub fn force<SPI: SpiDevice, D: DelayNs>(
        &mut self,
        device: &mut Device<SPI>,
        target: Mode,
        delay: &mut D,
    ) -> Result<(), Error> {
        self.current = None;
        let expected = OpMode::lora(target.device_mode());
        device.write_register(expected)?;
        delay.delay_ms(MODE_SETTLE_MS);

        let found: OpMode = device.read_register()?;
        if found != expected {
            return Err(Error::ModeMismatch {
                expected: expected.bits(),
                found: found.bits(),
            });
        }
        self.current = Some(target);
        Ok(())
    }

    pub fn to_standby<SPI: SpiDevice>(&mut self, device: &mut Device<SPI>) -> Result<bool, Error> {
        self.transition(device, Mode::Standby)
    }

    pub fn to_receive_continuous<SPI: SpiDevice>(
        &mut self,
        device: &mut Device<SPI>,
    ) -> Result<bool, Error> {
        self.transition(device, Mode::ReceiveContinuous)
    }

    pub fn to_transmit<SPI: SpiDevice>(&mut self, device: &mut Device<SPI>) -> Result<bool, Error> {
        self.transition(device, Mode::Transmit)
    }

    pub fn to_sleep<SPI: SpiDevice>(&mut self, device: &mut Device<SPI>) -> Result<bool, Error> {
        self.transition(device, Mode::Sleep)
    }
}
