//! # SX127x Radio Driver
//!
//! This module provides the control core for the Semtech SX127x family of
//! dual-modulation (FSK / LoRa) sub-GHz transceivers. Every chip capability
//! is reached through 8-bit register reads and writes, and most registers are
//! only writable in specific power modes, so the driver transparently inserts
//! the required mode transitions in front of every configuration write.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────┐
//! │        Application Layer        │
//! ├─────────────────────────────────┤
//! │    Sx127xDriver (this file)     │
//! ├─────────────────────────────────┤
//! │      HAL Abstraction Layer      │
//! ├─────────────────────────────────┤
//! │    Platform-specific HAL impl   │
//! └─────────────────────────────────┘
//! ```
//!
//! The driver assumes exclusive, single-threaded ownership of one chip
//! instance. The only concurrent code is the DIO0 event worker (see
//! [`crate::irq`]), which touches nothing but the two completion flags and
//! the registered callback.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use sx127x_rs::driver::{OpMode, PaOutput, Sx127xDriver};
//! use sx127x_rs::fec::PassthroughCodec;
//! use sx127x_rs::hal::MockHal;
//! use sx127x_rs::lora::SignalBandwidth;
//!
//! # fn main() -> Result<(), sx127x_rs::Sx127xError> {
//! let mut driver = Sx127xDriver::new(MockHal::new(), PassthroughCodec, PaOutput::PaBoost);
//! driver.initialize()?;
//!
//! driver.set_op_mode(OpMode::LoRa)?;
//! driver.set_frequency(868_000_000, 0)?;
//! driver.set_lora_signal_bandwidth(SignalBandwidth::Bw500)?;
//! driver.set_lora_spreading_factor(7)?;
//!
//! driver.send(b"hello")?;
//! while !driver.is_tx_done() { /* or use set_callback */ }
//! # Ok(())
//! # }
//! ```

use crate::error::Sx127xError;
use crate::fec::FecCodec;
use crate::fsk::{self, FSK_SYNC_WORD};
use crate::hal::Hal;
use crate::irq::{Dio0Trigger, EventNotifier, EventState, RadioEvent};
use crate::lora::{self, Bw500Workaround, CodingRate, HeaderMode, SignalBandwidth};
use crate::quality::{self, LinkStats, FSK_MAX_RSSI_DBM, LORA_MAX_RSSI_DBM};
use crate::registers::*;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Active modulation scheme. The two schemes expose largely disjoint
/// register banks on the same chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpMode {
    /// Frequency shift keying, packet mode
    Fsk,
    /// LoRa long-range modulation
    LoRa,
}

/// Which output stage the board wires the antenna to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaOutput {
    /// RFO pin: low power, 0-14 dBm
    Rfo,
    /// PA_BOOST pin: 2-17 dBm, +20 dBm with the high-power DAC
    PaBoost,
}

/// Configuration for the SX127x driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sx127xConfig {
    /// SPI bus number (default: 0)
    pub spi_bus: u8,
    /// GPIO pin for radio reset (default: 22)
    pub reset_pin: u8,
    /// GPIO pin for the DIO0 interrupt (default: 24)
    pub dio0_pin: u8,
    /// Output stage the board uses (default: PA_BOOST)
    pub pa_output: PaOutput,
    /// Budget for the FSK mode-ready wait in milliseconds (default: 100)
    pub mode_ready_timeout_ms: u64,
}

impl Default for Sx127xConfig {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            reset_pin: 22,
            dio0_pin: 24,
            pa_output: PaOutput::PaBoost,
            mode_ready_timeout_ms: 100,
        }
    }
}

/// Cached FSK-bank register values
#[derive(Debug, Default)]
struct FskState {
    freq: u64,
    payload_length: u8,
    rx_bandwidth: u32,
}

/// Cached LoRa-bank register values
#[derive(Debug)]
struct LoraState {
    freq: u64,
    ppm_correction: i8,
    payload_length: u8,
    signal_bw: SignalBandwidth,
    spreading_factor: u8,
    bw500_workaround: Bw500Workaround,
}

impl Default for LoraState {
    fn default() -> Self {
        Self {
            freq: 0,
            ppm_correction: 0,
            payload_length: 0,
            signal_bw: SignalBandwidth::Bw7_8,
            spreading_factor: 0,
            bw500_workaround: Bw500Workaround::None,
        }
    }
}

/// Main driver structure for SX127x radio transceivers.
///
/// ## Type Parameters
///
/// * `H` - Hardware abstraction layer providing register transport and pin
///   control
/// * `C` - Forward error correction codec applied to FSK payloads
///
/// ## Register caching
///
/// Frequency words, payload lengths, the PPM correction and the BW500 errata
/// class are cached and only re-written to hardware when the value actually
/// changes. This is a correctness requirement, not an optimization:
/// re-issuing some of these writes mid-operation is unsafe.
pub struct Sx127xDriver<H: Hal, C: FecCodec> {
    hal: H,
    codec: C,
    pa_output: PaOutput,
    mode_ready_timeout: Duration,
    /// Last raw byte written to REG_OP_MODE
    chip_mode: u8,
    op_mode: OpMode,
    fsk: FskState,
    lora: LoraState,
    events: Arc<EventState>,
}

impl<H: Hal, C: FecCodec> Sx127xDriver<H, C> {
    /// Create a new driver instance over the given HAL and FEC codec.
    ///
    /// The chip is not touched until [`initialize`](Self::initialize) runs.
    pub fn new(hal: H, codec: C, pa_output: PaOutput) -> Self {
        Self {
            hal,
            codec,
            pa_output,
            mode_ready_timeout: Duration::from_millis(100),
            chip_mode: 0,
            op_mode: OpMode::Fsk,
            fsk: FskState::default(),
            lora: LoraState::default(),
            events: Arc::new(EventState::default()),
        }
    }

    /// Override the FSK mode-ready wait budget.
    pub fn set_mode_ready_timeout(&mut self, timeout: Duration) {
        self.mode_ready_timeout = timeout;
    }

    /// Reset the chip, verify its identity and apply the baseline
    /// configuration.
    ///
    /// # Errors
    ///
    /// * [`Sx127xError::UnexpectedVersion`] - the identity register did not
    ///   read the supported revision; the driver cannot proceed
    /// * [`Sx127xError::Hal`] - register transport failure
    pub fn initialize(&mut self) -> Result<(), Sx127xError> {
        self.hal.reset_radio()?;

        let version = self.hal.read_register(REG_VERSION)?;
        if version == EXPECTED_VERSION {
            info!("Got SX127x chip version {version}");
        } else {
            error!("Unexpected SX127x chip version {version}, expecting {EXPECTED_VERSION}");
            return Err(Sx127xError::UnexpectedVersion {
                found: version,
                expected: EXPECTED_VERSION,
            });
        }

        // Adopt whatever scheme the chip woke up in
        self.chip_mode = self.hal.read_register(REG_OP_MODE)?;
        self.op_mode = if self.chip_mode & MODE_LORA != 0 {
            OpMode::LoRa
        } else {
            OpMode::Fsk
        };
        self.fsk = FskState::default();
        self.lora = LoraState::default();

        // Sleep mode to make the configuration registers writable
        self.sleep()?;

        self.hal
            .write_register(REG_LORA_FIFO_TX_BASE_ADDR, TX_FIFO_BASE_ADDR)?;
        self.hal
            .write_register(REG_LORA_FIFO_RX_BASE_ADDR, RX_FIFO_BASE_ADDR)?;

        // LNA boost HF
        let lna = self.hal.read_register(REG_LNA)?;
        self.hal.write_register(REG_LNA, lna | 0x03)?;

        // Auto AGC
        self.hal.write_register(REG_LORA_MODEM_CONFIG_3, 0x04)?;

        self.set_tx_power(17)?;

        self.idle()?;
        self.disable_dio0()?;
        Ok(())
    }

    /// Spawn the per-instance DIO0 event worker and bind it to the
    /// interrupt line. Requires a running tokio runtime.
    ///
    /// The returned handle owns the worker task; keep it alive for as long
    /// as completion callbacks should be delivered, and call its
    /// [`shutdown`](EventNotifier::shutdown) when tearing the radio down.
    pub fn start_event_notifier(&mut self) -> Result<EventNotifier, Sx127xError> {
        let notifier = EventNotifier::spawn(self.events.clone());
        let waker = notifier.waker();
        self.hal.bind_dio0(Box::new(move || waker.wake()))?;
        Ok(notifier)
    }

    // =========================================================================
    // Mode control
    // =========================================================================

    /// Write the raw mode byte, skipping the write when it matches the cache.
    fn set_mode(&mut self, mode: u8) -> Result<(), Sx127xError> {
        if self.chip_mode != mode {
            self.hal.write_register(REG_OP_MODE, mode)?;
            self.chip_mode = mode;
            debug!("chip mode set to 0x{mode:02X}");
        }
        Ok(())
    }

    /// Enter sleep mode, preserving the active modulation scheme bit.
    pub fn sleep(&mut self) -> Result<(), Sx127xError> {
        self.set_mode((self.chip_mode & MODE_LORA) | MODE_SLEEP)
    }

    /// Enter standby mode, preserving the active modulation scheme bit.
    pub fn idle(&mut self) -> Result<(), Sx127xError> {
        self.set_mode((self.chip_mode & MODE_LORA) | MODE_STDBY)
    }

    /// Make the configuration registers of the active scheme writable.
    ///
    /// FSK allows FIFO-independent writes only from sleep. In LoRa mode both
    /// sleep and standby are writable states, so an ongoing sleep is left
    /// undisturbed.
    fn prepare_for_write(&mut self) -> Result<(), Sx127xError> {
        match self.op_mode {
            OpMode::Fsk => self.sleep(),
            OpMode::LoRa => {
                let mode = self.chip_mode & !MODE_LORA;
                if mode != MODE_SLEEP && mode != MODE_STDBY {
                    self.idle()?;
                }
                Ok(())
            }
        }
    }

    /// Switch the active modulation scheme. No-op when already active.
    ///
    /// The scheme bit may only be flipped in sleep mode; entering FSK also
    /// applies the fixed FSK receiver parameters.
    pub fn set_op_mode(&mut self, op_mode: OpMode) -> Result<(), Sx127xError> {
        if self.op_mode == op_mode {
            return Ok(());
        }
        self.set_mode((self.chip_mode & MODE_LORA) | MODE_SLEEP)?;
        match op_mode {
            OpMode::Fsk => {
                self.set_mode(MODE_SLEEP)?;
                self.apply_fsk_parameters()?;
            }
            OpMode::LoRa => {
                self.set_mode(MODE_LORA | MODE_SLEEP)?;
            }
        }
        self.op_mode = op_mode;
        debug!("op mode set to {op_mode:?}");
        Ok(())
    }

    /// Active modulation scheme
    pub fn op_mode(&self) -> OpMode {
        self.op_mode
    }

    /// Fixed FSK receiver setup, applied once when entering FSK mode.
    fn apply_fsk_parameters(&mut self) -> Result<(), Sx127xError> {
        // AGC auto on, RX trigger on preamble detect
        self.hal.write_register(REG_FSK_RX_CONFIG, 0x08 | 0x06)?;
        // detector on | detector size 01 | tolerance 10
        self.hal
            .write_register(REG_FSK_PREAMBLE_DETECT, 1 << 7 | 1 << 5 | 10)?;

        // Maximum sensitivity: RSSI threshold always satisfied
        self.hal.write_register(REG_FSK_RSSI_THRES, 0xFF)?;

        // autorestart = on, wait for pll, sync = ON, syncsize = 3 + 1 = 4
        self.hal
            .write_register(REG_FSK_SYNC_CONFIG, 2 << 5 | 1 << 4 | 0x03)?;

        self.hal
            .write_register(REG_FSK_SYNC_VALUE_1, FSK_SYNC_WORD[0])?;
        self.hal
            .write_register(REG_FSK_SYNC_VALUE_2, FSK_SYNC_WORD[1])?;
        self.hal
            .write_register(REG_FSK_SYNC_VALUE_3, FSK_SYNC_WORD[2])?;
        self.hal
            .write_register(REG_FSK_SYNC_VALUE_4, FSK_SYNC_WORD[3])?;

        // Packet mode, CRC off, whitening off
        self.hal.write_register(REG_FSK_PACKET_CONFIG_1, 1 << 5)?;
        Ok(())
    }

    /// Wait for the FSK modem to finish its mode transition.
    ///
    /// Registers and FIFO are only safely accessible once every flag except
    /// ModeReady has cleared. Bounded by the configured timeout; a radio
    /// that never settles indicates a hardware fault.
    fn wait_fsk_mode_ready(&mut self) -> Result<(), Sx127xError> {
        let start = Instant::now();
        loop {
            let flags = self.hal.read_register(REG_FSK_IRQ_FLAGS_1)?;
            if flags & !FskIrqFlags1::MODE_READY.bits() == 0 {
                return Ok(());
            }
            if start.elapsed() > self.mode_ready_timeout {
                error!("FSK mode ready timed out, flags 0x{flags:02X}");
                return Err(Sx127xError::ModeReadyTimeout);
            }
            std::hint::spin_loop();
        }
    }

    // =========================================================================
    // Frequency synthesis
    // =========================================================================

    /// Tune the carrier to `freq_hz`, compensated by a measured `error_hz`.
    ///
    /// The effective frequency is `freq_hz - error_hz`. The 24-bit tuning
    /// word is written MSB/MID/LSB only when it changed, followed by a fixed
    /// 50 us PLL lock budget. In LoRa mode the PPM drift correction is
    /// recomputed and the 500 kHz bandwidth errata re-evaluated, since its
    /// classification depends on the carrier.
    pub fn set_frequency(&mut self, freq_hz: u64, error_hz: i64) -> Result<(), Sx127xError> {
        let freq = (freq_hz as i64 - error_hz) as u64;

        let mut frf: u64 = 0;
        match self.op_mode {
            OpMode::Fsk => {
                if freq != self.fsk.freq {
                    self.fsk.freq = freq;
                    frf = (freq as f64 / FSK_FREQ_STEP_HZ).round() as u64;
                }
            }
            OpMode::LoRa => {
                if freq != self.lora.freq {
                    self.lora.freq = freq;
                    frf = (freq << 19) / FXOSC_HZ as u64;
                }
            }
        }

        if frf > 0 {
            self.prepare_for_write()?;
            self.hal.write_register(REG_FRF_MSB, (frf >> 16) as u8)?;
            self.hal.write_register(REG_FRF_MID, (frf >> 8) as u8)?;
            self.hal.write_register(REG_FRF_LSB, frf as u8)?;
            // Wait up to 50us for PLL lock (page 15, table 7)
            let start = Instant::now();
            while start.elapsed() < Duration::from_micros(PLL_LOCK_BUDGET_US) {
                std::hint::spin_loop();
            }
        }

        if self.op_mode == OpMode::LoRa {
            let ppm_correction = (0.95f32 * error_hz as f32 / (freq as f32 / 1_000_000.0))
                .round()
                .clamp(-128.0, 127.0) as i8;
            if ppm_correction != self.lora.ppm_correction {
                self.prepare_for_write()?;
                self.hal
                    .write_register(REG_LORA_PPM_CORRECTION, ppm_correction as u8)?;
                self.lora.ppm_correction = ppm_correction;
            }
            self.apply_bw500_workaround()?;
        }
        Ok(())
    }

    // =========================================================================
    // TX power
    // =========================================================================

    /// Set the output power in dBm, clamped to the range of the configured
    /// output stage. On PA_BOOST a request above 17 dBm enables the
    /// high-power DAC for +20 dBm.
    pub fn set_tx_power(&mut self, mut level: i32) -> Result<(), Sx127xError> {
        self.prepare_for_write()?;

        let pa_config;
        let mut pa_dac = PA_DAC_DEFAULT;
        match self.pa_output {
            PaOutput::Rfo => {
                level = level.clamp(0, 14);
                pa_config = 0x70 | level as u8;
            }
            PaOutput::PaBoost => {
                if level < 2 {
                    level = 2;
                } else if level > 17 {
                    level = 17;
                    pa_dac = PA_DAC_BOOST_20DBM;
                }
                pa_config = PA_BOOST | (level as u8 - 2);
            }
        }
        self.hal.write_register(REG_PA_CONFIG, pa_config)?;
        self.hal.write_register(REG_PA_DAC, pa_dac)?;
        Ok(())
    }

    // =========================================================================
    // TX/RX pipeline
    // =========================================================================

    /// Cache and program the expected payload length. The FSK path expands
    /// the size through the FEC codec first; writes are skipped when the
    /// register already holds the value.
    pub fn set_payload_size(&mut self, size: u8) -> Result<(), Sx127xError> {
        match self.op_mode {
            OpMode::Fsk => {
                let size = self.codec.encoded_len(size as usize) as u8;
                if self.fsk.payload_length != size {
                    self.prepare_for_write()?;
                    self.hal.write_register(REG_FSK_PAYLOAD_LENGTH, size)?;
                    self.fsk.payload_length = size;
                }
            }
            OpMode::LoRa => {
                if self.lora.payload_length != size {
                    self.prepare_for_write()?;
                    self.hal.write_register(REG_LORA_PAYLOAD_LENGTH, size)?;
                    self.lora.payload_length = size;
                }
            }
        }
        Ok(())
    }

    /// Load `payload` into the chip's data buffer and start transmitting.
    ///
    /// Completion is signaled through the DIO0 line: poll
    /// [`is_tx_done`](Self::is_tx_done) or register a callback. The final
    /// mode write is what actually starts RF transmission.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), Sx127xError> {
        match self.op_mode {
            OpMode::Fsk => {
                self.sleep()?;
                let mut encoded = vec![0u8; self.codec.encoded_len(payload.len())];
                self.codec.encode(payload, &mut encoded);
                // Wait here, otherwise the FIFO write lands before the modem
                // reaches sleep mode and gets ignored. See 4.2.10 FIFO
                // (page 66).
                self.wait_fsk_mode_ready()?;
                self.hal.write_burst(REG_FIFO, &encoded)?;
            }
            OpMode::LoRa => {
                // Standby, not sleep: the FIFO is unavailable in LoRa sleep
                self.idle()?;
                self.hal
                    .write_register(REG_LORA_FIFO_ADDR_PTR, TX_FIFO_BASE_ADDR)?;
                self.hal.write_burst(REG_FIFO, payload)?;
            }
        }

        self.set_payload_size(payload.len() as u8)?;

        self.events.clear_tx_done();
        self.events.set_trigger(Dio0Trigger::TxDone);

        match self.op_mode {
            OpMode::Fsk => {
                // The IRQ clears automatically when TX mode exits
                self.hal
                    .write_register(REG_DIO_MAPPING_1, DIO0_FSK_PACKET_SENT)?;
                // Start transmitting as soon as the FIFO is non-empty. Must
                // be re-armed before every send or the sent interrupt never
                // fires.
                self.hal.write_register(REG_FSK_FIFO_THRESH, 1 << 7)?;
                self.set_mode(MODE_TX)?;
            }
            OpMode::LoRa => {
                self.hal
                    .write_register(REG_LORA_IRQ_FLAGS, LoraIrqFlags::TX_DONE.bits())?;
                self.hal
                    .write_register(REG_DIO_MAPPING_1, DIO0_LORA_TX_DONE)?;
                self.set_mode(MODE_LORA | MODE_TX)?;
            }
        }
        Ok(())
    }

    /// Read a received payload of `buf.len()` bytes out of the data buffer.
    ///
    /// The read length is caller-specified, not chip-reported. The FSK path
    /// pulls the codec-expanded size and decodes it; the LoRa path reads raw
    /// bytes and explicitly clears the RX-done flag, which does not clear on
    /// its own.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Sx127xError> {
        match self.op_mode {
            OpMode::LoRa => {
                self.prepare_for_write()?;
                self.hal
                    .write_register(REG_LORA_FIFO_ADDR_PTR, RX_FIFO_BASE_ADDR)?;
                self.hal.read_burst(REG_FIFO, buf)?;
                self.events.clear_rx_done();
                self.hal
                    .write_register(REG_LORA_IRQ_FLAGS, LoraIrqFlags::RX_DONE.bits())?;
            }
            OpMode::Fsk => {
                let mut encoded = vec![0u8; self.codec.encoded_len(buf.len())];
                self.hal.read_burst(REG_FIFO, &mut encoded)?;
                self.events.clear_rx_done();
                // No explicit IRQ clear: the flag drops as the FIFO empties
                self.codec.decode(&encoded, buf);
            }
        }
        Ok(buf.len())
    }

    /// Arm continuous receive: program DIO0 for the receive-complete
    /// condition of the active scheme and switch to continuous-RX mode.
    pub fn enable_continuous_rx(&mut self) -> Result<(), Sx127xError> {
        self.events.clear_rx_done();
        self.events.set_trigger(Dio0Trigger::RxDone);

        match self.op_mode {
            OpMode::Fsk => {
                self.idle()?;
                self.wait_fsk_mode_ready()?;
                self.hal
                    .write_register(REG_DIO_MAPPING_1, DIO0_FSK_PAYLOAD_READY)?;
                self.set_mode(MODE_RX_CONTINUOUS)?;
                self.hal
                    .write_register(REG_FSK_FIFO_THRESH, 1 << 7 | self.fsk.payload_length)?;
            }
            OpMode::LoRa => {
                self.prepare_for_write()?;
                self.hal
                    .write_register(REG_DIO_MAPPING_1, DIO0_LORA_RX_DONE)?;
                self.set_mode(MODE_LORA | MODE_RX_CONTINUOUS)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Completion events
    // =========================================================================

    /// Whether the last armed transmission completed
    pub fn is_tx_done(&self) -> bool {
        self.events.tx_done()
    }

    /// Whether a reception completed since the last read
    pub fn is_rx_done(&self) -> bool {
        self.events.rx_done()
    }

    /// Register a completion callback, invoked by the event worker outside
    /// interrupt context with the completion reason.
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(RadioEvent) + Send + 'static,
    {
        self.events.set_callback(Some(Box::new(callback)));
    }

    /// Remove the completion callback. Completion remains observable through
    /// the polling flags.
    pub fn clear_callback(&mut self) {
        self.events.set_callback(None);
    }

    /// Disarm the DIO0 line: clear the pending trigger and program the
    /// no-interrupt mapping of the active scheme.
    pub fn disable_dio0(&mut self) -> Result<(), Sx127xError> {
        self.events.set_trigger(Dio0Trigger::None);
        let reg = match self.op_mode {
            OpMode::Fsk => DIO0_FSK_NONE,
            OpMode::LoRa => DIO0_LORA_NONE,
        };
        self.hal.write_register(REG_DIO_MAPPING_1, reg)?;
        Ok(())
    }

    // =========================================================================
    // FSK configuration
    // =========================================================================

    /// Set the FSK bit rate in bits per second.
    pub fn set_fsk_bitrate(&mut self, bps: u32) -> Result<(), Sx127xError> {
        self.prepare_for_write()?;
        let br = (FXOSC_HZ as f32 / bps as f32).round() as u16;
        self.hal
            .write_register(REG_FSK_BITRATE_MSB, (br >> 8) as u8)?;
        self.hal.write_register(REG_FSK_BITRATE_LSB, br as u8)?;
        Ok(())
    }

    /// Set the FSK frequency deviation in Hz.
    pub fn set_fsk_fdev(&mut self, hz: u32) -> Result<(), Sx127xError> {
        self.prepare_for_write()?;
        let dev = (hz as f64 / FSK_FREQ_STEP_HZ).round() as u16;
        self.hal.write_register(REG_FSK_FDEV_MSB, (dev >> 8) as u8)?;
        self.hal.write_register(REG_FSK_FDEV_LSB, dev as u8)?;
        Ok(())
    }

    /// Set the FSK receiver channel filter bandwidth in Hz.
    pub fn set_fsk_rx_bandwidth(&mut self, hz: u32) -> Result<(), Sx127xError> {
        self.prepare_for_write()?;
        let value = fsk::bandwidth_reg_value(hz)?;
        self.hal.write_register(REG_FSK_RX_BW, value)?;
        self.fsk.rx_bandwidth = hz;
        Ok(())
    }

    /// Set the FSK AFC channel filter bandwidth in Hz.
    pub fn set_fsk_rx_afc_bandwidth(&mut self, hz: u32) -> Result<(), Sx127xError> {
        self.prepare_for_write()?;
        let value = fsk::bandwidth_reg_value(hz)?;
        self.hal.write_register(REG_FSK_RX_AFC_BW, value)?;
        Ok(())
    }

    /// Set the FSK transmitted preamble length in bytes.
    pub fn set_fsk_preamble_length(&mut self, length: u16) -> Result<(), Sx127xError> {
        self.prepare_for_write()?;
        self.hal
            .write_register(REG_FSK_PREAMBLE_MSB, (length >> 8) as u8)?;
        self.hal.write_register(REG_FSK_PREAMBLE_LSB, length as u8)?;
        Ok(())
    }

    // =========================================================================
    // LoRa configuration
    // =========================================================================

    /// Set the LoRa spreading factor, clamped to `[6, 12]`.
    ///
    /// SF6 needs its own detection-optimize/detection-threshold pair; all
    /// other factors share one.
    pub fn set_lora_spreading_factor(&mut self, sf: u8) -> Result<(), Sx127xError> {
        self.prepare_for_write()?;

        let sf = sf.clamp(6, 12);
        if sf == 6 {
            self.hal.write_register(REG_LORA_DETECTION_OPTIMIZE, 0xC5)?;
            self.hal.write_register(REG_LORA_DETECTION_THRESHOLD, 0x0C)?;
        } else {
            self.hal.write_register(REG_LORA_DETECTION_OPTIMIZE, 0xC3)?;
            self.hal.write_register(REG_LORA_DETECTION_THRESHOLD, 0x0A)?;
        }
        let reg = self.hal.read_register(REG_LORA_MODEM_CONFIG_2)?;
        self.hal
            .write_register(REG_LORA_MODEM_CONFIG_2, (reg & 0x0F) | ((sf << 4) & 0xF0))?;
        self.lora.spreading_factor = sf;
        Ok(())
    }

    /// Set the LoRa signal bandwidth and re-evaluate the 500 kHz errata.
    pub fn set_lora_signal_bandwidth(&mut self, bw: SignalBandwidth) -> Result<(), Sx127xError> {
        self.prepare_for_write()?;

        let reg = self.hal.read_register(REG_LORA_MODEM_CONFIG_1)?;
        self.hal
            .write_register(REG_LORA_MODEM_CONFIG_1, (reg & 0x0F) | ((bw as u8) << 4))?;
        self.lora.signal_bw = bw;
        self.apply_bw500_workaround()
    }

    /// Set the LoRa forward error correction rate.
    pub fn set_lora_coding_rate(&mut self, rate: CodingRate) -> Result<(), Sx127xError> {
        self.prepare_for_write()?;

        let reg = self.hal.read_register(REG_LORA_MODEM_CONFIG_1)?;
        self.hal
            .write_register(REG_LORA_MODEM_CONFIG_1, (reg & 0xF1) | ((rate as u8) << 1))?;
        Ok(())
    }

    /// Set the LoRa preamble length in symbols.
    pub fn set_lora_preamble_length(&mut self, length: u16) -> Result<(), Sx127xError> {
        self.prepare_for_write()?;
        self.hal
            .write_register(REG_LORA_PREAMBLE_MSB, (length >> 8) as u8)?;
        self.hal.write_register(REG_LORA_PREAMBLE_LSB, length as u8)?;
        Ok(())
    }

    /// Enable or disable the LoRa payload CRC.
    pub fn set_lora_crc(&mut self, crc: bool) -> Result<(), Sx127xError> {
        self.prepare_for_write()?;

        let mut reg = self.hal.read_register(REG_LORA_MODEM_CONFIG_2)?;
        if crc {
            reg |= 0x04;
        } else {
            reg &= 0xFB;
        }
        self.hal.write_register(REG_LORA_MODEM_CONFIG_2, reg)?;
        Ok(())
    }

    /// Set the LoRa header mode. The caller must ensure the registers are
    /// writable; this setter is not gated.
    pub fn set_lora_header_mode(&mut self, mode: HeaderMode) -> Result<(), Sx127xError> {
        let mut reg = self.hal.read_register(REG_LORA_MODEM_CONFIG_1)?;
        match mode {
            HeaderMode::Implicit => reg |= 0x01,
            HeaderMode::Explicit => reg &= 0xFE,
        }
        self.hal.write_register(REG_LORA_MODEM_CONFIG_1, reg)?;
        Ok(())
    }

    /// Set the LoRa sync word. Zero cannot be detected by the chip and is
    /// remapped to 1 (page 68); 0x34 is reserved for LoRaWAN and remapped to
    /// 0x35.
    pub fn set_lora_sync_word(&mut self, mut sync_word: u8) -> Result<(), Sx127xError> {
        if sync_word == 0 {
            sync_word = 1;
        } else if sync_word == 0x34 {
            sync_word = 0x35;
        }
        self.hal.write_register(REG_LORA_SYNC_WORD, sync_word)?;
        Ok(())
    }

    /// Apply the 500 kHz bandwidth sensitivity errata.
    ///
    /// See the SX1276/77/78 errata note. Classification depends on both the
    /// bandwidth and the carrier band; registers are rewritten only when the
    /// classification changed since last applied. Callers have already made
    /// the registers writable.
    fn apply_bw500_workaround(&mut self) -> Result<(), Sx127xError> {
        let workaround = Bw500Workaround::classify(self.lora.signal_bw, self.lora.freq);
        if workaround != self.lora.bw500_workaround {
            match workaround {
                Bw500Workaround::None => {
                    // reg(0x3A) reverts to automatic selection
                    self.hal
                        .write_register(REG_LORA_DETECTION_BW500_OPTIMIZE_1, 0x03)?;
                }
                Bw500Workaround::HighBand => {
                    self.hal
                        .write_register(REG_LORA_DETECTION_BW500_OPTIMIZE_1, 0x02)?;
                    self.hal
                        .write_register(REG_LORA_DETECTION_BW500_OPTIMIZE_2, 0x64)?;
                }
                Bw500Workaround::LowBand => {
                    self.hal
                        .write_register(REG_LORA_DETECTION_BW500_OPTIMIZE_1, 0x02)?;
                    self.hal
                        .write_register(REG_LORA_DETECTION_BW500_OPTIMIZE_2, 0x7F)?;
                }
            }
            self.lora.bw500_workaround = workaround;
        }
        Ok(())
    }

    // =========================================================================
    // Signal quality
    // =========================================================================

    /// Receiver sensitivity estimate in dBm for the current configuration.
    pub fn rx_sensitivity(&self) -> i32 {
        match self.op_mode {
            // Needs per-unit calibration; fixed estimate until then
            OpMode::Fsk => quality::FSK_RX_SENSITIVITY_DBM,
            OpMode::LoRa => lora::rx_sensitivity(self.lora.signal_bw, self.lora.spreading_factor),
        }
    }

    /// RSSI, SNR and normalized link quality of the last packet.
    ///
    /// FSK reports the raw RSSI register at 0.5 dB/LSB and approximates SNR
    /// from the sensitivity floor (no true SNR is available). LoRa samples
    /// SNR and RSSI in one burst and applies the datasheet's sign-dependent
    /// correction formulas against the band's RSSI floor. SNR is in 0.25 dB
    /// units.
    pub fn rssi(&mut self) -> Result<LinkStats, Sx127xError> {
        let rx_sensitivity = self.rx_sensitivity();

        let (rssi_max_dbm, rssi_dbm, snr_quarter_db) = match self.op_mode {
            OpMode::Fsk => {
                let raw = self.hal.read_register(REG_FSK_RSSI_VALUE)? as i32;
                let rssi = raw / -2;
                let snr = (-rx_sensitivity + rssi) * 4;
                (FSK_MAX_RSSI_DBM, rssi, snr)
            }
            OpMode::LoRa => {
                // Single transaction so SNR and RSSI belong to the same packet
                let mut buf = [0u8; 2];
                self.hal.read_burst(REG_LORA_PKT_SNR_VALUE, &mut buf)?;
                let snr = buf[0] as i8 as i32;
                let raw_rssi = buf[1] as i32;
                let min_rssi = lora::min_rssi_floor(self.lora.freq);
                let rssi = if snr > 0 {
                    // Page 87: "When SNR>=0, the standard formula can be
                    // adjusted to correct the slope:
                    // RSSI = -157 + 16/15 * PacketRssi"
                    (min_rssi as f32 + (16.0 / 15.0) * raw_rssi as f32) as i32
                } else if snr < 0 {
                    // "Packet Strength (dBm) = -157 + PacketRssi
                    //  + PacketSnr * 0.25" (HF port, same shape for LF)
                    (min_rssi as f32 + raw_rssi as f32 + snr as f32 * 0.25) as i32
                } else {
                    min_rssi + raw_rssi
                };
                (LORA_MAX_RSSI_DBM, rssi, snr)
            }
        };

        Ok(LinkStats {
            rssi_dbm,
            snr_quarter_db,
            link_quality: quality::clamped_link_quality(rx_sensitivity, rssi_max_dbm, rssi_dbm),
        })
    }

    /// Measured carrier frequency error in Hz.
    ///
    /// FSK readings are unreliable on this chip and always report 0. LoRa
    /// reads the 20-bit two's-complement indicator in one burst and scales
    /// it by the active signal bandwidth.
    pub fn frequency_error(&mut self) -> Result<i32, Sx127xError> {
        match self.op_mode {
            OpMode::Fsk => Ok(0),
            OpMode::LoRa => {
                let mut buf = [0u8; 3];
                self.hal.read_burst(REG_LORA_FEI_MSB, &mut buf)?;

                let mut err =
                    ((buf[0] as i32) << 16) | ((buf[1] as i32) << 8) | buf[2] as i32;
                // Sign extend 20 bit 2's complement to 32 bit
                if err & 0x8_0000 != 0 {
                    err |= -0x10_0000;
                }

                let bw = self.lora.signal_bw.khz();
                Ok((err as f32 * bw * ((1u32 << 24) as f32 / FXOSC_HZ as f32 / 500.0)) as i32)
            }
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Force standby and hold the chip in reset.
    pub fn shutdown(&mut self) -> Result<(), Sx127xError> {
        self.idle()?;
        self.hal.assert_reset()?;
        Ok(())
    }
}

#[cfg(feature = "raspberry-pi")]
impl<C: FecCodec> Sx127xDriver<crate::hal::RaspberryPiHal, C> {
    /// Build a driver over the Raspberry Pi HAL from a configuration.
    pub fn from_config(config: &Sx127xConfig, codec: C) -> Result<Self, Sx127xError> {
        let pins = crate::hal::RadioPins {
            reset: config.reset_pin,
            dio0: config.dio0_pin,
        };
        let hal = crate::hal::RaspberryPiHal::new(config.spi_bus, &pins)
            .map_err(|e| Sx127xError::Config(e.to_string()))?;
        let mut driver = Self::new(hal, codec, config.pa_output);
        driver.set_mode_ready_timeout(Duration::from_millis(config.mode_ready_timeout_ms));
        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fec::PassthroughCodec;
    use crate::hal::MockHal;

    fn fresh_driver(pa: PaOutput) -> (Sx127xDriver<MockHal, PassthroughCodec>, MockHal) {
        let handle = MockHal::new();
        let mut driver = Sx127xDriver::new(handle.clone(), PassthroughCodec, pa);
        driver.initialize().unwrap();
        (driver, handle)
    }

    fn lora_driver() -> (Sx127xDriver<MockHal, PassthroughCodec>, MockHal) {
        let (mut driver, handle) = fresh_driver(PaOutput::PaBoost);
        driver.set_op_mode(OpMode::LoRa).unwrap();
        handle.clear_write_log();
        (driver, handle)
    }

    #[test]
    fn initialize_rejects_unknown_chip() {
        let handle = MockHal::new();
        handle.set_register(REG_VERSION, 0x21);
        let mut driver = Sx127xDriver::new(handle, PassthroughCodec, PaOutput::PaBoost);
        assert!(matches!(
            driver.initialize(),
            Err(Sx127xError::UnexpectedVersion { found: 0x21, .. })
        ));
    }

    #[test]
    fn initialize_applies_baseline_configuration() {
        let (_, handle) = fresh_driver(PaOutput::PaBoost);
        assert_eq!(handle.writes_to(REG_LORA_FIFO_TX_BASE_ADDR), vec![0x80]);
        assert_eq!(handle.writes_to(REG_LORA_FIFO_RX_BASE_ADDR), vec![0x00]);
        assert_eq!(handle.writes_to(REG_LORA_MODEM_CONFIG_3), vec![0x04]);
        assert_eq!(handle.writes_to(REG_LNA), vec![0x03]);
        // 17 dBm on PA_BOOST, default DAC
        assert_eq!(handle.writes_to(REG_PA_CONFIG), vec![0x8F]);
        assert_eq!(handle.writes_to(REG_PA_DAC), vec![0x84]);
        // Left in standby with DIO0 disarmed (FSK after reset)
        assert_eq!(handle.register(REG_OP_MODE), MODE_STDBY);
        assert_eq!(handle.writes_to(REG_DIO_MAPPING_1), vec![DIO0_FSK_NONE]);
        assert_eq!(handle.reset_pulses(), 1);
    }

    #[test]
    fn repeated_frequency_is_written_once() {
        let (mut driver, handle) = lora_driver();
        driver.set_frequency(868_000_000, 0).unwrap();
        driver.set_frequency(868_000_000, 0).unwrap();
        assert_eq!(handle.writes_to(REG_FRF_MSB).len(), 1);
        assert_eq!(handle.writes_to(REG_FRF_MID).len(), 1);
        assert_eq!(handle.writes_to(REG_FRF_LSB).len(), 1);

        driver.set_frequency(868_100_000, 0).unwrap();
        assert_eq!(handle.writes_to(REG_FRF_MSB).len(), 2);
    }

    #[test]
    fn fsk_frequency_cache_is_independent_of_lora() {
        let (mut driver, handle) = fresh_driver(PaOutput::PaBoost);
        driver.set_frequency(868_000_000, 0).unwrap();
        driver.set_frequency(868_000_000, 0).unwrap();
        assert_eq!(handle.writes_to(REG_FRF_MSB).len(), 1);

        driver.set_op_mode(OpMode::LoRa).unwrap();
        driver.set_frequency(868_000_000, 0).unwrap();
        assert_eq!(handle.writes_to(REG_FRF_MSB).len(), 2);
    }

    #[test]
    fn ppm_correction_is_cached_and_clamped() {
        let (mut driver, handle) = lora_driver();

        driver.set_frequency(868_000_000, 100_000).unwrap();
        // 0.95 * 100000 / 867.9 rounds to 109
        assert_eq!(handle.writes_to(REG_LORA_PPM_CORRECTION), vec![109]);

        // Same arguments: no further write
        driver.set_frequency(868_000_000, 100_000).unwrap();
        assert_eq!(handle.writes_to(REG_LORA_PPM_CORRECTION).len(), 1);

        driver.set_frequency(868_000_000, 50_000_000).unwrap();
        assert_eq!(
            handle.writes_to(REG_LORA_PPM_CORRECTION),
            vec![109, 127u8]
        );

        driver.set_frequency(868_000_000, -50_000_000).unwrap();
        assert_eq!(
            handle.writes_to(REG_LORA_PPM_CORRECTION),
            vec![109, 127u8, 0x80]
        );
    }

    #[test]
    fn sync_word_reserved_values_are_remapped() {
        let (mut driver, handle) = lora_driver();
        driver.set_lora_sync_word(0).unwrap();
        driver.set_lora_sync_word(0x34).unwrap();
        driver.set_lora_sync_word(0x12).unwrap();
        assert_eq!(handle.writes_to(REG_LORA_SYNC_WORD), vec![0x01, 0x35, 0x12]);
    }

    #[test]
    fn spreading_factor_clamps_and_selects_detection_registers() {
        let (mut driver, handle) = lora_driver();

        driver.set_lora_spreading_factor(3).unwrap();
        assert_eq!(handle.writes_to(REG_LORA_DETECTION_OPTIMIZE), vec![0xC5]);
        assert_eq!(handle.writes_to(REG_LORA_DETECTION_THRESHOLD), vec![0x0C]);
        assert_eq!(handle.register(REG_LORA_MODEM_CONFIG_2) >> 4, 6);

        driver.set_lora_spreading_factor(30).unwrap();
        assert_eq!(
            handle.writes_to(REG_LORA_DETECTION_OPTIMIZE),
            vec![0xC5, 0xC3]
        );
        assert_eq!(
            handle.writes_to(REG_LORA_DETECTION_THRESHOLD),
            vec![0x0C, 0x0A]
        );
        assert_eq!(handle.register(REG_LORA_MODEM_CONFIG_2) >> 4, 12);
    }

    #[test]
    fn spreading_factor_preserves_low_nibble() {
        let (mut driver, handle) = lora_driver();
        driver.set_lora_crc(true).unwrap();
        driver.set_lora_spreading_factor(9).unwrap();
        assert_eq!(handle.register(REG_LORA_MODEM_CONFIG_2), (9 << 4) | 0x04);
    }

    #[test]
    fn signal_bandwidth_occupies_high_nibble() {
        let (mut driver, handle) = lora_driver();
        driver
            .set_lora_coding_rate(CodingRate::Cr4_8)
            .unwrap();
        driver
            .set_lora_signal_bandwidth(SignalBandwidth::Bw250)
            .unwrap();
        let reg = handle.register(REG_LORA_MODEM_CONFIG_1);
        assert_eq!(reg >> 4, 7);
        assert_eq!((reg >> 1) & 0x07, 4);
    }

    #[test]
    fn header_mode_toggles_bit_zero() {
        let (mut driver, handle) = lora_driver();
        driver.set_lora_header_mode(HeaderMode::Implicit).unwrap();
        assert_eq!(handle.register(REG_LORA_MODEM_CONFIG_1) & 0x01, 0x01);
        driver.set_lora_header_mode(HeaderMode::Explicit).unwrap();
        assert_eq!(handle.register(REG_LORA_MODEM_CONFIG_1) & 0x01, 0x00);
    }

    #[test]
    fn tx_power_clamps_per_output_stage() {
        let (mut driver, handle) = fresh_driver(PaOutput::Rfo);
        handle.clear_write_log();
        driver.set_tx_power(20).unwrap();
        assert_eq!(handle.writes_to(REG_PA_CONFIG), vec![0x70 | 14]);
        assert_eq!(handle.writes_to(REG_PA_DAC), vec![PA_DAC_DEFAULT]);

        driver.set_tx_power(-5).unwrap();
        assert_eq!(handle.writes_to(REG_PA_CONFIG), vec![0x70 | 14, 0x70]);

        let (mut driver, handle) = fresh_driver(PaOutput::PaBoost);
        handle.clear_write_log();
        driver.set_tx_power(20).unwrap();
        // Above 17 dBm: clamp to 17 and enable the +20 dBm DAC
        assert_eq!(handle.writes_to(REG_PA_CONFIG), vec![PA_BOOST | 15]);
        assert_eq!(handle.writes_to(REG_PA_DAC), vec![PA_DAC_BOOST_20DBM]);

        driver.set_tx_power(0).unwrap();
        assert_eq!(
            handle.writes_to(REG_PA_CONFIG),
            vec![PA_BOOST | 15, PA_BOOST]
        );
    }

    #[test]
    fn entering_fsk_applies_fixed_parameters() {
        let (mut driver, handle) = lora_driver();
        driver.set_op_mode(OpMode::Fsk).unwrap();
        assert_eq!(handle.writes_to(REG_FSK_SYNC_VALUE_1), vec![0x69]);
        assert_eq!(handle.writes_to(REG_FSK_SYNC_VALUE_2), vec![0x81]);
        assert_eq!(handle.writes_to(REG_FSK_SYNC_VALUE_3), vec![0x7E]);
        assert_eq!(handle.writes_to(REG_FSK_SYNC_VALUE_4), vec![0x96]);
        assert_eq!(handle.writes_to(REG_FSK_RSSI_THRES), vec![0xFF]);
        assert_eq!(handle.writes_to(REG_FSK_RX_CONFIG), vec![0x0E]);
        assert_eq!(handle.writes_to(REG_FSK_PREAMBLE_DETECT), vec![0xAA]);
        assert_eq!(handle.writes_to(REG_FSK_SYNC_CONFIG), vec![0x53]);
        assert_eq!(handle.writes_to(REG_FSK_PACKET_CONFIG_1), vec![0x20]);
    }

    #[test]
    fn set_op_mode_is_a_no_op_when_unchanged() {
        let (mut driver, handle) = fresh_driver(PaOutput::PaBoost);
        handle.clear_write_log();
        driver.set_op_mode(OpMode::Fsk).unwrap();
        assert!(handle.write_log().is_empty());
    }

    #[test]
    fn payload_size_writes_only_on_change() {
        let (mut driver, handle) = lora_driver();
        driver.set_payload_size(16).unwrap();
        driver.set_payload_size(16).unwrap();
        assert_eq!(handle.writes_to(REG_LORA_PAYLOAD_LENGTH), vec![16]);
        driver.set_payload_size(32).unwrap();
        assert_eq!(handle.writes_to(REG_LORA_PAYLOAD_LENGTH), vec![16, 32]);
    }

    #[test]
    fn lora_setters_force_standby_from_rx() {
        let (mut driver, handle) = lora_driver();
        driver.enable_continuous_rx().unwrap();
        assert_eq!(handle.register(REG_OP_MODE), MODE_LORA | MODE_RX_CONTINUOUS);
        handle.clear_write_log();

        driver.set_lora_crc(true).unwrap();
        let log = handle.write_log();
        assert_eq!(log[0], (REG_OP_MODE, MODE_LORA | MODE_STDBY));
        assert_eq!(log[1].0, REG_LORA_MODEM_CONFIG_2);
    }

    #[test]
    fn fsk_bandwidth_setters_share_the_lookup_table() {
        let (mut driver, handle) = fresh_driver(PaOutput::PaBoost);
        handle.clear_write_log();
        driver.set_fsk_rx_bandwidth(50_000).unwrap();
        assert_eq!(handle.writes_to(REG_FSK_RX_BW), vec![0x0B]);
        driver.set_fsk_rx_afc_bandwidth(50_000).unwrap();
        assert_eq!(handle.writes_to(REG_FSK_RX_AFC_BW), vec![0x0B]);
        assert!(driver.set_fsk_rx_bandwidth(400_000).is_err());
    }

    #[test]
    fn fsk_bitrate_and_deviation_round_to_register_words() {
        let (mut driver, handle) = fresh_driver(PaOutput::PaBoost);
        handle.clear_write_log();
        driver.set_fsk_bitrate(100_000).unwrap();
        // 32 MHz / 100 kbps = 320 = 0x0140
        assert_eq!(handle.writes_to(REG_FSK_BITRATE_MSB), vec![0x01]);
        assert_eq!(handle.writes_to(REG_FSK_BITRATE_LSB), vec![0x40]);

        driver.set_fsk_fdev(50_000).unwrap();
        // 50 kHz / 61.03515625 Hz rounds to 819 = 0x0333
        assert_eq!(handle.writes_to(REG_FSK_FDEV_MSB), vec![0x03]);
        assert_eq!(handle.writes_to(REG_FSK_FDEV_LSB), vec![0x33]);
    }
}
