//! # SX127x Register Definitions and Constants
//!
//! This module contains the register addresses, operating mode bytes, and bit
//! field definitions for the Semtech SX127x transceiver family. Addresses and
//! values follow the SX1276/77/78/79 datasheet.
//!
//! ## Register Map
//!
//! The SX127x exposes two largely disjoint register banks selected by the
//! active modulation scheme:
//! - Common registers (FIFO, operating mode, carrier frequency, PA control,
//!   DIO mapping, chip version) are valid in both schemes.
//! - The FSK bank (bitrate, deviation, RX config, sync word, packet config)
//!   is only meaningful with the LongRangeMode bit cleared.
//! - The LoRa bank (FIFO pointers, modem config, spreading factor, PPM
//!   correction, frequency error) requires the LongRangeMode bit set.
//!
//! ## Operating Modes
//!
//! Bits 2..0 of `REG_OP_MODE` select the power/activity state (sleep,
//! standby, transmit, continuous receive); bit 7 selects FSK vs LoRa and may
//! only be flipped while in sleep mode.

use bitflags::bitflags;

// =============================================================================
// Oscillator and timing constants
// =============================================================================

/// Crystal oscillator frequency in Hz (32 MHz reference)
pub const FXOSC_HZ: u32 = 32_000_000;

/// FSK frequency synthesizer step in Hz (FXOSC / 2^19)
pub const FSK_FREQ_STEP_HZ: f64 = 61.035_156_25;

/// Expected value of `REG_VERSION` for a supported chip revision
pub const EXPECTED_VERSION: u8 = 0x12;

/// SPI clock rate in Hz. 10 MHz causes incorrect reads of
/// `REG_LORA_MODEM_CONFIG_1` on some boards, so stay at 9 MHz.
pub const SPI_CLOCK_HZ: u32 = 9_000_000;

/// PLL lock budget after a carrier frequency change, in microseconds
pub const PLL_LOCK_BUDGET_US: u64 = 50;

// =============================================================================
// Common register addresses
// =============================================================================

/// FIFO read/write access register
pub const REG_FIFO: u8 = 0x00;

/// Operating mode and modulation scheme selection
pub const REG_OP_MODE: u8 = 0x01;

/// RF carrier frequency (MSB)
pub const REG_FRF_MSB: u8 = 0x06;

/// RF carrier frequency (MID)
pub const REG_FRF_MID: u8 = 0x07;

/// RF carrier frequency (LSB)
pub const REG_FRF_LSB: u8 = 0x08;

/// PA selection and output power control
pub const REG_PA_CONFIG: u8 = 0x09;

/// PA ramp time control
pub const REG_PA_RAMP: u8 = 0x0A;

/// LNA gain and boost settings
pub const REG_LNA: u8 = 0x0C;

/// DIO0..DIO3 mapping
pub const REG_DIO_MAPPING_1: u8 = 0x40;

/// DIO4..DIO5 mapping and clock-out control
pub const REG_DIO_MAPPING_2: u8 = 0x41;

/// Chip version (read-only)
pub const REG_VERSION: u8 = 0x42;

/// High-power (+20 dBm) PA DAC control
pub const REG_PA_DAC: u8 = 0x4D;

// =============================================================================
// FSK register addresses
// =============================================================================

/// FSK bit rate (MSB)
pub const REG_FSK_BITRATE_MSB: u8 = 0x02;

/// FSK bit rate (LSB)
pub const REG_FSK_BITRATE_LSB: u8 = 0x03;

/// FSK frequency deviation (MSB)
pub const REG_FSK_FDEV_MSB: u8 = 0x04;

/// FSK frequency deviation (LSB)
pub const REG_FSK_FDEV_LSB: u8 = 0x05;

/// FSK receiver configuration (AGC/AFC/trigger control)
pub const REG_FSK_RX_CONFIG: u8 = 0x0D;

/// FSK RSSI threshold for interrupt generation
pub const REG_FSK_RSSI_THRES: u8 = 0x10;

/// FSK current RSSI value (read-only, 0.5 dB/LSB magnitude)
pub const REG_FSK_RSSI_VALUE: u8 = 0x11;

/// FSK channel filter bandwidth control
pub const REG_FSK_RX_BW: u8 = 0x12;

/// FSK AFC channel filter bandwidth control
pub const REG_FSK_RX_AFC_BW: u8 = 0x13;

/// FSK frequency error indicator (MSB)
pub const REG_FSK_FEI_MSB: u8 = 0x1D;

/// FSK frequency error indicator (LSB)
pub const REG_FSK_FEI_LSB: u8 = 0x1E;

/// FSK preamble detector control
pub const REG_FSK_PREAMBLE_DETECT: u8 = 0x1F;

/// FSK transmitted preamble length (MSB)
pub const REG_FSK_PREAMBLE_MSB: u8 = 0x25;

/// FSK transmitted preamble length (LSB)
pub const REG_FSK_PREAMBLE_LSB: u8 = 0x26;

/// FSK sync word recognition control
pub const REG_FSK_SYNC_CONFIG: u8 = 0x27;

/// FSK sync word byte 1
pub const REG_FSK_SYNC_VALUE_1: u8 = 0x28;

/// FSK sync word byte 2
pub const REG_FSK_SYNC_VALUE_2: u8 = 0x29;

/// FSK sync word byte 3
pub const REG_FSK_SYNC_VALUE_3: u8 = 0x2A;

/// FSK sync word byte 4
pub const REG_FSK_SYNC_VALUE_4: u8 = 0x2B;

/// FSK packet mode settings (CRC, whitening, length mode)
pub const REG_FSK_PACKET_CONFIG_1: u8 = 0x30;

/// FSK packet mode settings (data mode, IO-home)
pub const REG_FSK_PACKET_CONFIG_2: u8 = 0x31;

/// FSK payload length
pub const REG_FSK_PAYLOAD_LENGTH: u8 = 0x32;

/// FSK FIFO threshold and TX start condition
pub const REG_FSK_FIFO_THRESH: u8 = 0x35;

/// FSK interrupt flags 1 (mode ready, RX ready, sync match)
pub const REG_FSK_IRQ_FLAGS_1: u8 = 0x3E;

/// FSK interrupt flags 2 (packet sent, payload ready, FIFO state)
pub const REG_FSK_IRQ_FLAGS_2: u8 = 0x3F;

// =============================================================================
// LoRa register addresses
// =============================================================================

/// LoRa FIFO access pointer
pub const REG_LORA_FIFO_ADDR_PTR: u8 = 0x0D;

/// LoRa FIFO base address for TX data
pub const REG_LORA_FIFO_TX_BASE_ADDR: u8 = 0x0E;

/// LoRa FIFO base address for RX data
pub const REG_LORA_FIFO_RX_BASE_ADDR: u8 = 0x0F;

/// LoRa start address of the last received packet
pub const REG_LORA_FIFO_RX_CURRENT_ADDR: u8 = 0x10;

/// LoRa interrupt flags (write 1 to clear)
pub const REG_LORA_IRQ_FLAGS: u8 = 0x12;

/// LoRa number of bytes in the last received payload
pub const REG_LORA_RX_NB_BYTES: u8 = 0x13;

/// LoRa SNR of the last received packet (signed, 0.25 dB/LSB)
pub const REG_LORA_PKT_SNR_VALUE: u8 = 0x19;

/// LoRa RSSI of the last received packet (raw)
pub const REG_LORA_PKT_RSSI_VALUE: u8 = 0x1A;

/// LoRa modem configuration 1 (bandwidth, coding rate, header mode)
pub const REG_LORA_MODEM_CONFIG_1: u8 = 0x1D;

/// LoRa modem configuration 2 (spreading factor, CRC)
pub const REG_LORA_MODEM_CONFIG_2: u8 = 0x1E;

/// LoRa preamble length (MSB)
pub const REG_LORA_PREAMBLE_MSB: u8 = 0x20;

/// LoRa preamble length (LSB)
pub const REG_LORA_PREAMBLE_LSB: u8 = 0x21;

/// LoRa payload length
pub const REG_LORA_PAYLOAD_LENGTH: u8 = 0x22;

/// LoRa modem configuration 3 (AGC, low data rate optimize)
pub const REG_LORA_MODEM_CONFIG_3: u8 = 0x26;

/// LoRa data-rate (PPM) offset correction
pub const REG_LORA_PPM_CORRECTION: u8 = 0x27;

/// LoRa frequency error indicator (MSB, 20-bit two's complement)
pub const REG_LORA_FEI_MSB: u8 = 0x28;

/// LoRa frequency error indicator (MID)
pub const REG_LORA_FEI_MID: u8 = 0x29;

/// LoRa frequency error indicator (LSB)
pub const REG_LORA_FEI_LSB: u8 = 0x2A;

/// LoRa wideband RSSI (random number source)
pub const REG_LORA_RSSI_WIDEBAND: u8 = 0x2C;

/// LoRa detection optimize (SF6 vs SF7-12)
pub const REG_LORA_DETECTION_OPTIMIZE: u8 = 0x31;

/// LoRa 500 kHz bandwidth sensitivity optimization 1 (errata)
pub const REG_LORA_DETECTION_BW500_OPTIMIZE_1: u8 = 0x36;

/// LoRa detection threshold (SF6 vs SF7-12)
pub const REG_LORA_DETECTION_THRESHOLD: u8 = 0x37;

/// LoRa sync word
pub const REG_LORA_SYNC_WORD: u8 = 0x39;

/// LoRa 500 kHz bandwidth sensitivity optimization 2 (errata)
pub const REG_LORA_DETECTION_BW500_OPTIMIZE_2: u8 = 0x3A;

// =============================================================================
// Operating mode bytes (REG_OP_MODE)
// =============================================================================

/// LongRangeMode bit: set for LoRa, clear for FSK
pub const MODE_LORA: u8 = 0x80;

/// Sleep mode
pub const MODE_SLEEP: u8 = 0x00;

/// Standby mode
pub const MODE_STDBY: u8 = 0x01;

/// Transmit mode
pub const MODE_TX: u8 = 0x03;

/// Continuous receive mode
pub const MODE_RX_CONTINUOUS: u8 = 0x05;

// =============================================================================
// PA configuration
// =============================================================================

/// PA_BOOST output pin selection bit in REG_PA_CONFIG
pub const PA_BOOST: u8 = 0x80;

/// PA DAC value for the default +17 dBm ceiling
pub const PA_DAC_DEFAULT: u8 = 0x84;

/// PA DAC value enabling +20 dBm on PA_BOOST
pub const PA_DAC_BOOST_20DBM: u8 = 0x87;

// =============================================================================
// DIO0 mapping values (REG_DIO_MAPPING_1, DIO0 in bits 7..6)
// =============================================================================

/// DIO0 mapping field offset within REG_DIO_MAPPING_1
pub const DIO0_BIT_OFFSET: u8 = 6;

/// LoRa: DIO0 rises on RxDone
pub const DIO0_LORA_RX_DONE: u8 = 0 << DIO0_BIT_OFFSET;

/// LoRa: DIO0 rises on TxDone
pub const DIO0_LORA_TX_DONE: u8 = 1 << DIO0_BIT_OFFSET;

/// LoRa: DIO0 unmapped
pub const DIO0_LORA_NONE: u8 = 3 << DIO0_BIT_OFFSET;

/// FSK packet mode: DIO0 rises on PayloadReady
pub const DIO0_FSK_PAYLOAD_READY: u8 = 0 << DIO0_BIT_OFFSET;

/// FSK packet mode: DIO0 rises on PacketSent (same mapping value as
/// PayloadReady; the active direction disambiguates)
pub const DIO0_FSK_PACKET_SENT: u8 = DIO0_FSK_PAYLOAD_READY;

/// FSK: DIO0 unmapped
pub const DIO0_FSK_NONE: u8 = 2 << DIO0_BIT_OFFSET;

// =============================================================================
// FIFO data buffer layout
// =============================================================================

/// LoRa FIFO base address used for outgoing payloads
pub const TX_FIFO_BASE_ADDR: u8 = 0x80;

/// LoRa FIFO base address used for incoming payloads
pub const RX_FIFO_BASE_ADDR: u8 = 0x00;

bitflags! {
    /// FSK interrupt flags register 1 (`REG_FSK_IRQ_FLAGS_1`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FskIrqFlags1: u8 {
        /// Requested mode transition finished; registers and FIFO accessible
        const MODE_READY = 1 << 7;
        /// Receiver chain settled
        const RX_READY = 1 << 6;
        /// Transmitter PA ramped up
        const TX_READY = 1 << 5;
    }
}

bitflags! {
    /// FSK interrupt flags register 2 (`REG_FSK_IRQ_FLAGS_2`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FskIrqFlags2: u8 {
        /// Complete packet left the FIFO
        const PACKET_SENT = 1 << 3;
        /// Complete packet with valid CRC available in the FIFO
        const PAYLOAD_READY = 1 << 2;
    }
}

bitflags! {
    /// LoRa interrupt flags register (`REG_LORA_IRQ_FLAGS`, write 1 to clear)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LoraIrqFlags: u8 {
        /// Packet reception finished
        const RX_DONE = 0x40;
        /// Payload CRC check failed
        const PAYLOAD_CRC_ERROR = 0x20;
        /// Packet transmission finished
        const TX_DONE = 0x08;
    }
}
