//! # Raspberry Pi HAL Implementation
//!
//! Hardware abstraction layer implementation for Raspberry Pi 4 and 5,
//! providing SPI communication and GPIO control for SX127x radio modules.
//!
//! ## Hardware Setup
//!
//! ### SPI Configuration
//!
//! The Raspberry Pi provides two SPI controllers:
//! - **SPI0**: `/dev/spidev0.0`, `/dev/spidev0.1` (recommended)
//! - **SPI1**: `/dev/spidev1.0`, `/dev/spidev1.1`, `/dev/spidev1.2`
//!
//! ### Pinout (40-pin GPIO header)
//!
//! ```text
//! Pi Pin │ BCM GPIO │ SX127x Pin │ Function
//! ───────┼──────────┼────────────┼─────────────
//! 19     │ GPIO 10  │ MOSI       │ SPI data out
//! 21     │ GPIO 9   │ MISO       │ SPI data in
//! 23     │ GPIO 11  │ SCLK       │ SPI clock
//! 24     │ GPIO 8   │ NSS        │ Chip select
//! 15     │ GPIO 22  │ NRESET     │ Reset (output)
//! 18     │ GPIO 24  │ DIO0       │ Interrupt (input)
//! ```
//!
//! ## Wire Format
//!
//! Every SX127x bus transaction frames 1 command bit (1 = write, 0 = read),
//! 7 address bits, and one or more data bytes. The address byte therefore
//! carries `addr | 0x80` for writes and `addr & 0x7F` for reads, with the
//! register address auto-incrementing across burst transfers.

use crate::hal::{Hal, HalError};
use crate::registers::SPI_CLOCK_HZ;
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
use rppal::spi::{Bus, Error as SpiError, Mode, SlaveSelect, Spi};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Errors specific to the Raspberry Pi HAL implementation
#[derive(Error, Debug)]
pub enum RpiHalError {
    /// SPI bus initialization failed
    #[error("SPI initialization failed: {0}")]
    SpiInit(#[from] SpiError),
    /// GPIO initialization failed
    #[error("GPIO initialization failed: {0}")]
    GpioInit(#[from] rppal::gpio::Error),
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// GPIO pin assignment for the SX127x control lines.
///
/// All pin numbers use BCM GPIO numbering (not physical pin numbers).
#[derive(Debug, Clone)]
pub struct RadioPins {
    /// NRESET pin (output, active low)
    pub reset: u8,
    /// DIO0 pin (input) - completion interrupt from the radio
    pub dio0: u8,
}

impl Default for RadioPins {
    fn default() -> Self {
        Self {
            reset: 22, // GPIO 22 (Pin 15)
            dio0: 24,  // GPIO 24 (Pin 18)
        }
    }
}

/// Raspberry Pi HAL for the SX127x, built on the `rppal` crate.
///
/// The SPI interface is configured for SX127x-compatible settings:
/// Mode 0, MSB first, 9 MHz clock (10 MHz corrupts reads of the LoRa
/// modem-config register on some boards).
pub struct RaspberryPiHal {
    spi: Spi,
    reset_pin: OutputPin,
    dio0_pin: InputPin,
    bus_info: String,
}

impl RaspberryPiHal {
    /// Create a new Raspberry Pi HAL instance.
    ///
    /// # Arguments
    ///
    /// * `spi_bus` - SPI bus number (0 for primary SPI, 1 for auxiliary SPI)
    /// * `pins` - GPIO pin assignment for the radio control lines
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use sx127x_rs::hal::raspberry_pi::{RadioPins, RaspberryPiHal};
    ///
    /// let hal = RaspberryPiHal::new(0, &RadioPins::default())?;
    /// # Ok::<(), sx127x_rs::hal::raspberry_pi::RpiHalError>(())
    /// ```
    pub fn new(spi_bus: u8, pins: &RadioPins) -> Result<Self, RpiHalError> {
        let (bus, slave_select) = match spi_bus {
            0 => (Bus::Spi0, SlaveSelect::Ss0),
            1 => (Bus::Spi1, SlaveSelect::Ss0),
            _ => {
                return Err(RpiHalError::InvalidConfig(format!(
                    "Invalid SPI bus {spi_bus}, only 0 and 1 are supported"
                )))
            }
        };

        // MSB first is the rppal default and what the chip expects
        let spi = Spi::new(bus, slave_select, SPI_CLOCK_HZ, Mode::Mode0)?;
        let bus_info = format!(
            "SPI{} ({})",
            spi_bus,
            if spi_bus == 0 { "primary" } else { "auxiliary" }
        );

        let gpio = Gpio::new()?;
        let dio0_pin = gpio.get(pins.dio0)?.into_input();
        let mut reset_pin = gpio.get(pins.reset)?.into_output();
        reset_pin.set_high(); // NRESET is active low, start deasserted

        log::info!("Raspberry Pi HAL initialized:");
        log::info!("  SPI: {bus_info}");
        log::info!("  NRESET: GPIO {}", pins.reset);
        log::info!("  DIO0: GPIO {}", pins.dio0);

        Ok(Self {
            spi,
            reset_pin,
            dio0_pin,
            bus_info,
        })
    }

    /// SPI bus description, for diagnostics
    pub fn bus_info(&self) -> &str {
        &self.bus_info
    }
}

impl Hal for RaspberryPiHal {
    fn read_register(&mut self, addr: u8) -> Result<u8, HalError> {
        let tx = [addr & 0x7F, 0];
        let mut rx = [0u8; 2];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HalError::Spi(format!("register read 0x{addr:02X}: {e}")))?;
        Ok(rx[1])
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError> {
        let tx = [addr | 0x80, value];
        self.spi
            .write(&tx)
            .map_err(|e| HalError::Spi(format!("register write 0x{addr:02X}: {e}")))?;
        Ok(())
    }

    fn read_burst(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), HalError> {
        let mut tx = vec![0u8; buf.len() + 1];
        tx[0] = addr & 0x7F;
        let mut rx = vec![0u8; buf.len() + 1];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HalError::Spi(format!("burst read 0x{addr:02X}: {e}")))?;
        buf.copy_from_slice(&rx[1..]);
        Ok(())
    }

    fn write_burst(&mut self, addr: u8, data: &[u8]) -> Result<(), HalError> {
        let mut tx = Vec::with_capacity(data.len() + 1);
        tx.push(addr | 0x80);
        tx.extend_from_slice(data);
        self.spi
            .write(&tx)
            .map_err(|e| HalError::Spi(format!("burst write 0x{addr:02X}: {e}")))?;
        Ok(())
    }

    fn reset_radio(&mut self) -> Result<(), HalError> {
        log::debug!("Performing hardware reset of SX127x");
        self.reset_pin.set_low();
        thread::sleep(Duration::from_millis(20));
        self.reset_pin.set_high();
        thread::sleep(Duration::from_millis(50));
        log::debug!("Hardware reset completed");
        Ok(())
    }

    fn assert_reset(&mut self) -> Result<(), HalError> {
        self.reset_pin.set_low();
        Ok(())
    }

    fn bind_dio0(&mut self, mut callback: Box<dyn FnMut() + Send>) -> Result<(), HalError> {
        self.dio0_pin
            .set_async_interrupt(Trigger::RisingEdge, move |_level| callback())
            .map_err(|e| HalError::Gpio(format!("DIO0 interrupt binding: {e}")))
    }
}
