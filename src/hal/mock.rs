//! # Mock HAL
//!
//! In-memory [`Hal`] implementation backed by a shared register file. Tests
//! keep a clone of the handle, hand another clone to the driver, and then
//! assert on the recorded write log or script register contents.
//!
//! Burst access at `REG_FIFO` models the chip's data buffer: burst writes
//! append to a captured TX buffer, burst reads drain a pre-loaded RX buffer.
//! Burst access at any other address reads/writes contiguous registers,
//! matching the chip's auto-incrementing address behavior.

use crate::hal::{Hal, HalError};
use crate::registers::{EXPECTED_VERSION, REG_FIFO, REG_VERSION};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const REGISTER_SPACE: usize = 0x80;

struct MockState {
    regs: [u8; REGISTER_SPACE],
    write_log: Vec<(u8, u8)>,
    rx_fifo: VecDeque<u8>,
    tx_fifo: Vec<u8>,
    dio0_callback: Option<Box<dyn FnMut() + Send>>,
    reset_pulses: usize,
    reset_asserted: bool,
}

/// Scripted SX127x register file for tests.
#[derive(Clone)]
pub struct MockHal {
    inner: Arc<Mutex<MockState>>,
}

impl Default for MockHal {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHal {
    /// Create a mock with a blank register file and the expected chip
    /// version pre-loaded so that initialization succeeds.
    pub fn new() -> Self {
        let mut regs = [0u8; REGISTER_SPACE];
        regs[REG_VERSION as usize] = EXPECTED_VERSION;
        Self {
            inner: Arc::new(Mutex::new(MockState {
                regs,
                write_log: Vec::new(),
                rx_fifo: VecDeque::new(),
                tx_fifo: Vec::new(),
                dio0_callback: None,
                reset_pulses: 0,
                reset_asserted: false,
            })),
        }
    }

    /// Script a register value for subsequent reads
    pub fn set_register(&self, addr: u8, value: u8) {
        self.inner.lock().unwrap().regs[addr as usize] = value;
    }

    /// Current value of a register (last write wins)
    pub fn register(&self, addr: u8) -> u8 {
        self.inner.lock().unwrap().regs[addr as usize]
    }

    /// All values written to `addr`, oldest first
    pub fn writes_to(&self, addr: u8) -> Vec<u8> {
        self.inner
            .lock()
            .unwrap()
            .write_log
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Complete single-register write log, oldest first
    pub fn write_log(&self) -> Vec<(u8, u8)> {
        self.inner.lock().unwrap().write_log.clone()
    }

    /// Forget recorded writes (register contents are kept)
    pub fn clear_write_log(&self) {
        self.inner.lock().unwrap().write_log.clear();
    }

    /// Queue bytes to be returned by FIFO burst reads
    pub fn load_rx_fifo(&self, data: &[u8]) {
        self.inner.lock().unwrap().rx_fifo.extend(data);
    }

    /// Bytes captured from FIFO burst writes, oldest first
    pub fn transmitted(&self) -> Vec<u8> {
        self.inner.lock().unwrap().tx_fifo.clone()
    }

    /// Number of full reset pulses seen
    pub fn reset_pulses(&self) -> usize {
        self.inner.lock().unwrap().reset_pulses
    }

    /// Whether the reset line is currently held low
    pub fn reset_asserted(&self) -> bool {
        self.inner.lock().unwrap().reset_asserted
    }

    /// Simulate a rising edge on DIO0
    pub fn raise_dio0(&self) {
        let callback = self.inner.lock().unwrap().dio0_callback.take();
        if let Some(mut callback) = callback {
            callback();
            self.inner.lock().unwrap().dio0_callback = Some(callback);
        }
    }
}

impl Hal for MockHal {
    fn read_register(&mut self, addr: u8) -> Result<u8, HalError> {
        Ok(self.inner.lock().unwrap().regs[addr as usize])
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError> {
        let mut state = self.inner.lock().unwrap();
        state.regs[addr as usize] = value;
        state.write_log.push((addr, value));
        Ok(())
    }

    fn read_burst(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), HalError> {
        let mut state = self.inner.lock().unwrap();
        if addr == REG_FIFO {
            for byte in buf.iter_mut() {
                *byte = state.rx_fifo.pop_front().unwrap_or(0);
            }
        } else {
            for (i, byte) in buf.iter_mut().enumerate() {
                *byte = state.regs[addr as usize + i];
            }
        }
        Ok(())
    }

    fn write_burst(&mut self, addr: u8, data: &[u8]) -> Result<(), HalError> {
        let mut state = self.inner.lock().unwrap();
        if addr == REG_FIFO {
            state.tx_fifo.extend_from_slice(data);
        } else {
            for (i, byte) in data.iter().enumerate() {
                state.regs[addr as usize + i] = *byte;
            }
        }
        Ok(())
    }

    fn reset_radio(&mut self) -> Result<(), HalError> {
        let mut state = self.inner.lock().unwrap();
        state.reset_pulses += 1;
        state.reset_asserted = false;
        Ok(())
    }

    fn assert_reset(&mut self) -> Result<(), HalError> {
        self.inner.lock().unwrap().reset_asserted = true;
        Ok(())
    }

    fn bind_dio0(&mut self, callback: Box<dyn FnMut() + Send>) -> Result<(), HalError> {
        self.inner.lock().unwrap().dio0_callback = Some(callback);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_reads_track_contiguous_registers() {
        let handle = MockHal::new();
        handle.set_register(0x28, 0x0F);
        handle.set_register(0x29, 0xFC);
        handle.set_register(0x2A, 0x18);

        let mut hal = handle.clone();
        let mut buf = [0u8; 3];
        hal.read_burst(0x28, &mut buf).unwrap();
        assert_eq!(buf, [0x0F, 0xFC, 0x18]);
    }

    #[test]
    fn fifo_bursts_use_the_data_buffer() {
        let handle = MockHal::new();
        let mut hal = handle.clone();

        hal.write_burst(REG_FIFO, &[1, 2, 3]).unwrap();
        assert_eq!(handle.transmitted(), vec![1, 2, 3]);

        handle.load_rx_fifo(&[9, 8]);
        let mut buf = [0u8; 2];
        hal.read_burst(REG_FIFO, &mut buf).unwrap();
        assert_eq!(buf, [9, 8]);
    }

    #[test]
    fn dio0_callback_fires_on_raise() {
        let handle = MockHal::new();
        let mut hal = handle.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        hal.bind_dio0(Box::new(move || tx.send(()).unwrap())).unwrap();

        handle.raise_dio0();
        assert!(rx.try_recv().is_ok());
    }
}
