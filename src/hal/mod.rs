//! # Hardware Abstraction Layer for the SX127x
//!
//! This module defines the HAL trait the driver is generic over, plus the
//! available implementations: a Raspberry Pi backend built on `rppal` and a
//! scripted mock used by the test suite.
//!
//! The SX127x is register-oriented: every bus transaction frames one command
//! bit (0 = read, 1 = write), 7 address bits, and 8 data bits. Burst variants
//! move N contiguous bytes in a single transaction, which matters both for
//! FIFO throughput and for registers that must be sampled atomically (SNR +
//! RSSI, the 3-byte frequency error indicator).

use thiserror::Error;

/// Errors that can occur during HAL operations.
///
/// A directly-wired peripheral's bus failure indicates a hardware fault, not
/// a transient condition: callers propagate these as fatal and never retry.
#[derive(Debug, Error)]
pub enum HalError {
    #[error("SPI transfer failed: {0}")]
    Spi(String),

    #[error("GPIO operation failed: {0}")]
    Gpio(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Hardware Abstraction Layer trait for SX127x register access and pin
/// control.
pub trait Hal {
    /// Read a single register by address
    fn read_register(&mut self, addr: u8) -> Result<u8, HalError>;

    /// Write a single register by address
    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError>;

    /// Read `buf.len()` bytes starting at `addr` in one bus transaction
    fn read_burst(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), HalError>;

    /// Write `data` starting at `addr` in one bus transaction
    fn write_burst(&mut self, addr: u8, data: &[u8]) -> Result<(), HalError>;

    /// Pulse the reset line: low 20 ms, high, then a 50 ms settle
    fn reset_radio(&mut self) -> Result<(), HalError>;

    /// Drive the reset line low and leave it there (chip held in reset)
    fn assert_reset(&mut self) -> Result<(), HalError>;

    /// Bind `callback` to the rising edge of the DIO0 line.
    ///
    /// The callback runs in interrupt-delivery context: it must not perform
    /// any bus I/O, only signal a worker.
    fn bind_dio0(&mut self, callback: Box<dyn FnMut() + Send>) -> Result<(), HalError>;
}

pub mod mock;

// Platform implementations
#[cfg(feature = "raspberry-pi")]
pub mod raspberry_pi;

pub use mock::MockHal;

#[cfg(feature = "raspberry-pi")]
pub use raspberry_pi::{RadioPins, RaspberryPiHal};
