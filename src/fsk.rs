//! # FSK Channel Filter Table and Constants
//!
//! The FSK receiver's channel filter bandwidth is programmed through a
//! mantissa/exponent register code rather than a plain value. This module
//! holds the ascending lookup table mapping requested bandwidths in Hz to
//! register codes, shared by the RX bandwidth and the RX AFC bandwidth
//! setters, plus the fixed sync pattern applied when entering FSK mode.

use crate::error::Sx127xError;

/// Fixed 4-byte FSK sync pattern programmed on entering FSK mode
pub const FSK_SYNC_WORD: [u8; 4] = [0x69, 0x81, 0x7E, 0x96];

/// One channel filter step: lowest bandwidth in Hz that selects `reg_value`
struct FskBandwidth {
    hz: u32,
    reg_value: u8,
}

/// Ascending channel filter table. The final entry is a sentinel: 300 kHz
/// exceeds the FSK receiver's filter range and its code must never be
/// programmed.
const FSK_BANDWIDTHS: [FskBandwidth; 22] = [
    FskBandwidth { hz: 2_600, reg_value: 0x17 },
    FskBandwidth { hz: 3_100, reg_value: 0x0F },
    FskBandwidth { hz: 3_900, reg_value: 0x07 },
    FskBandwidth { hz: 5_200, reg_value: 0x16 },
    FskBandwidth { hz: 6_300, reg_value: 0x0E },
    FskBandwidth { hz: 7_800, reg_value: 0x06 },
    FskBandwidth { hz: 10_400, reg_value: 0x15 },
    FskBandwidth { hz: 12_500, reg_value: 0x0D },
    FskBandwidth { hz: 15_600, reg_value: 0x05 },
    FskBandwidth { hz: 20_800, reg_value: 0x14 },
    FskBandwidth { hz: 25_000, reg_value: 0x0C },
    FskBandwidth { hz: 31_300, reg_value: 0x04 },
    FskBandwidth { hz: 41_700, reg_value: 0x13 },
    FskBandwidth { hz: 50_000, reg_value: 0x0B },
    FskBandwidth { hz: 62_500, reg_value: 0x03 },
    FskBandwidth { hz: 83_333, reg_value: 0x12 },
    FskBandwidth { hz: 100_000, reg_value: 0x0A },
    FskBandwidth { hz: 125_000, reg_value: 0x02 },
    FskBandwidth { hz: 166_700, reg_value: 0x11 },
    FskBandwidth { hz: 200_000, reg_value: 0x09 },
    FskBandwidth { hz: 250_000, reg_value: 0x01 },
    FskBandwidth { hz: 300_000, reg_value: 0x00 }, // Invalid bandwidth
];

/// Register code for a requested filter bandwidth in Hz.
///
/// Selects entry `i` such that `table[i].hz <= hz < table[i + 1].hz`. A value
/// below 2.6 kHz or at/above 300 kHz has no filter configuration and is a
/// configuration error, never clamped.
pub fn bandwidth_reg_value(hz: u32) -> Result<u8, Sx127xError> {
    for pair in FSK_BANDWIDTHS.windows(2) {
        if hz >= pair[0].hz && hz < pair[1].hz {
            return Ok(pair[0].reg_value);
        }
    }
    log::error!("Invalid FSK bandwidth {hz}");
    Err(Sx127xError::InvalidFskBandwidth { hz })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_table_values_select_their_own_code() {
        assert_eq!(bandwidth_reg_value(2_600).unwrap(), 0x17);
        assert_eq!(bandwidth_reg_value(25_000).unwrap(), 0x0C);
        assert_eq!(bandwidth_reg_value(250_000).unwrap(), 0x01);
    }

    #[test]
    fn values_between_steps_select_the_lower_step() {
        assert_eq!(bandwidth_reg_value(2_999).unwrap(), 0x17);
        assert_eq!(bandwidth_reg_value(99_999).unwrap(), 0x12);
        assert_eq!(bandwidth_reg_value(299_999).unwrap(), 0x01);
    }

    #[test]
    fn out_of_table_values_are_rejected() {
        assert!(matches!(
            bandwidth_reg_value(2_599),
            Err(Sx127xError::InvalidFskBandwidth { hz: 2_599 })
        ));
        assert!(matches!(
            bandwidth_reg_value(300_000),
            Err(Sx127xError::InvalidFskBandwidth { hz: 300_000 })
        ));
        assert!(bandwidth_reg_value(1_000_000).is_err());
    }
}
