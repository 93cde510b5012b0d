//! Radio configuration
//!
//! Translates the high-level settings in [`RadioConfig`] into register values.
//! The conversions are pure so they can be checked without hardware; the
//! [`crate::Radio`] applies them at init and whenever a setting changes.

use num_traits::float::FloatCore;

use crate::registers::{Frequency, PaConfig, PaDac};

/// Crystal oscillator frequency in Hz
pub const CRYSTAL_FREQUENCY_HZ: f64 = 32_000_000.0;

/// Frequency synthesizer step in Hz: F_XOSC / 2^19
pub const FREQUENCY_STEP_HZ: f64 = CRYSTAL_FREQUENCY_HZ / 524_288.0;

/// Lowest accepted transmit power in dBm
pub const MIN_TX_POWER_DBM: i8 = 5;

/// Highest accepted transmit power in dBm
pub const MAX_TX_POWER_DBM: i8 = 23;

/// Preamble length written at init, in symbols
pub const PREAMBLE_SYMBOLS: u16 = 8;

/// Frequencies at or above this value use the high-frequency RSSI offset
pub const HIGH_BAND_THRESHOLD_MHZ: f32 = 779.0;

/// Predefined modem settings
///
/// Each preset is named after bandwidth, coding rate and chips per symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemPreset {
    /// Bw = 125 kHz, Cr = 4/5, Sf = 128 chips/symbol. Medium range.
    #[default]
    Bw125Cr45Sf128,
    /// Bw = 500 kHz, Cr = 4/5, Sf = 128 chips/symbol. Fast, short range.
    Bw500Cr45Sf128,
    /// Bw = 31.25 kHz, Cr = 4/8, Sf = 512 chips/symbol. Slow, long range.
    Bw31_25Cr48Sf512,
    /// Bw = 125 kHz, Cr = 4/8, Sf = 4096 chips/symbol. Very slow, long range.
    Bw125Cr48Sf4096,
}

impl ModemPreset {
    /// Values for ModemConfig1 (0x1D), ModemConfig2 (0x1E) and ModemConfig3 (0x26).
    ///
    /// Every preset uses an explicit header, payload CRC and AGC. Low data
    /// rate optimization is on only for SF12.
    pub const fn register_values(self) -> [u8; 3] {
        match self {
            Self::Bw125Cr45Sf128 => [0x72, 0x74, 0x04],
            Self::Bw500Cr45Sf128 => [0x92, 0x74, 0x04],
            Self::Bw31_25Cr48Sf512 => [0x48, 0x94, 0x04],
            Self::Bw125Cr48Sf4096 => [0x78, 0xC4, 0x0C],
        }
    }
}

/// Driver configuration, fixed after [`crate::Radio::new`] apart from the
/// settings that have an explicit setter on the radio.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioConfig {
    /// Carrier frequency in MHz, e.g. 868.0 or 915.0
    pub frequency_mhz: f32,
    /// Transmit power in dBm, clamped to 5..=23
    pub tx_power_dbm: i8,
    /// This node's address, 0..=254
    pub address: u8,
    /// Modem preset
    pub modem: ModemPreset,
    /// Accept packets addressed to any node
    pub receive_all: bool,
    /// Acknowledge data packets addressed to this node
    pub auto_ack: bool,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            frequency_mhz: 915.0,
            tx_power_dbm: 13,
            address: 0,
            modem: ModemPreset::default(),
            receive_all: false,
            auto_ack: true,
        }
    }
}

impl RadioConfig {
    /// Whether RSSI readings use the high-frequency (>= 779 MHz) offset
    pub fn is_high_band(&self) -> bool {
        self.frequency_mhz >= HIGH_BAND_THRESHOLD_MHZ
    }
}

/// Converts a carrier frequency to the synthesizer register value.
///
/// `frf = round(f_MHz * 1e6 / F_STEP)`
pub fn frequency_to_register(frequency_mhz: f32) -> Frequency {
    let steps = FloatCore::round(frequency_mhz as f64 * 1_000_000.0 / FREQUENCY_STEP_HZ);
    Frequency {
        frf: (steps as u32) & 0x00FF_FFFF,
    }
}

/// Converts a synthesizer register value back to MHz.
pub fn register_to_frequency(register: Frequency) -> f64 {
    register.frf as f64 * FREQUENCY_STEP_HZ / 1_000_000.0
}

/// Register values for a transmit power setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerRegisters {
    /// Written to 0x4D
    pub pa_dac: PaDac,
    /// Written to 0x09
    pub pa_config: PaConfig,
}

/// Clamps `power_dbm` to the supported range and derives the PA registers.
///
/// Above 20 dBm the high power DAC is enabled and the power field is
/// `power - 5`; otherwise the DAC stays at default and the field is
/// `power - 2`. Both use the PA_BOOST pin.
pub fn tx_power_registers(power_dbm: i8) -> PowerRegisters {
    let power = power_dbm.clamp(MIN_TX_POWER_DBM, MAX_TX_POWER_DBM) as u8;

    if power > 20 {
        PowerRegisters {
            pa_dac: PaDac::HighPower,
            pa_config: PaConfig {
                pa_boost: true,
                output_power: power - 5,
            },
        }
    } else {
        PowerRegisters {
            pa_dac: PaDac::Default,
            pa_config: PaConfig {
                pa_boost: true,
                output_power: power - 2,
            },
        }
    }
}
