//! # SX127x Error Handling
//!
//! This module defines the Sx127xError enum, which represents the different
//! error types that can occur in the sx127x-rs crate.
//!
//! Register-transport failures are fatal at this layer: a directly-wired
//! peripheral's bus failure indicates a hardware fault, not a transient
//! condition, so nothing here retries. Out-of-range configuration inputs are
//! not errors at all - setters clamp them silently - with one exception: an
//! FSK bandwidth outside the chip's filter table is a configuration bug and
//! is surfaced rather than clamped.

use crate::hal::HalError;
use thiserror::Error;

/// Represents the different error types that can occur in the SX127x crate.
#[derive(Debug, Error)]
pub enum Sx127xError {
    /// Register transport failure (SPI/GPIO). Fatal, never retried.
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),

    /// The chip identity register did not read the expected revision.
    #[error("Unexpected chip version 0x{found:02X}, expected 0x{expected:02X}")]
    UnexpectedVersion { found: u8, expected: u8 },

    /// Requested FSK bandwidth has no entry in the channel filter table.
    #[error("Invalid FSK bandwidth {hz} Hz")]
    InvalidFskBandwidth { hz: u32 },

    /// The FSK modem did not report mode-ready within the configured budget.
    #[error("Timeout waiting for FSK mode ready")]
    ModeReadyTimeout,

    /// Operation requires a cargo feature that was not enabled at build time.
    #[error("Feature not enabled: {0}")]
    FeatureNotEnabled(String),

    /// Invalid driver configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
