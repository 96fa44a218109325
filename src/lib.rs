//! # sx127x-rs - A Rust Crate for SX127x (FSK/LoRa) Transceiver Control
//!
//! The sx127x-rs crate provides a Rust-based control core for the Semtech
//! SX127x family of dual-modulation sub-GHz radio transceivers. The chip is
//! reachable only through a narrow register-oriented SPI bus, and most
//! registers are writable only in specific power modes; this crate owns that
//! protocol so callers never have to think about mode gating.
//!
//! ## Features
//!
//! - Mode-gated register writes: every setter transparently inserts the
//!   required sleep/standby transition first
//! - Dual modulation: FSK and LoRa configuration and data paths over one
//!   physical chip, with independent cached register state per scheme
//! - Frequency synthesis with error compensation, LoRa PPM drift correction
//!   and the 500 kHz bandwidth sensitivity errata workaround
//! - Interrupt-driven completion: a single edge-triggered DIO0 line resolved
//!   into TX-done / RX-done events by a dedicated worker task
//! - Signal quality estimation: RSSI, SNR, normalized link quality,
//!   frequency error and receiver sensitivity
//! - Pluggable FEC codec for FSK payload protection
//! - Raspberry Pi HAL via `rppal` (behind the `raspberry-pi` feature) and a
//!   scripted mock HAL for tests
//!
//! ## Usage
//!
//! To use the sx127x-rs crate in your Rust project, add the following to
//! your Cargo.toml file:
//!
//! ```toml
//! [dependencies]
//! sx127x-rs = "1.0.0"
//! ```
//!
//! Then, in your Rust code, you can import the necessary types:
//!
//! ```rust
//! use sx127x_rs::{
//!     init_logger, OpMode, PaOutput, PassthroughCodec, RadioEvent,
//!     SignalBandwidth, Sx127xConfig, Sx127xDriver, Sx127xError,
//! };
//! ```

pub mod driver;
pub mod error;
pub mod fec;
pub mod fsk;
pub mod hal;
pub mod irq;
pub mod logging;
pub mod lora;
pub mod quality;
pub mod registers;

pub use crate::error::Sx127xError;
pub use crate::logging::{init_logger, log_info};

// Core driver types
pub use driver::{OpMode, PaOutput, Sx127xConfig, Sx127xDriver};

// Event delivery
pub use irq::{Dio0Trigger, Dio0Waker, EventCallback, EventNotifier, RadioEvent};

// Modulation parameters
pub use lora::{Bw500Workaround, CodingRate, HeaderMode, SignalBandwidth};

// Signal quality
pub use quality::LinkStats;

// FEC codec seam
pub use fec::{FecCodec, PassthroughCodec};
