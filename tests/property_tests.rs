//! Property tests for the clamping and remapping rules: whatever the caller
//! throws at a setter, the values reaching the registers stay legal.

use proptest::prelude::*;
use sx127x_rs::driver::{OpMode, PaOutput, Sx127xDriver};
use sx127x_rs::fec::PassthroughCodec;
use sx127x_rs::hal::MockHal;
use sx127x_rs::lora::{CodingRate, SignalBandwidth};
use sx127x_rs::registers::*;

fn lora_driver() -> (Sx127xDriver<MockHal, PassthroughCodec>, MockHal) {
    let handle = MockHal::new();
    let mut driver = Sx127xDriver::new(handle.clone(), PassthroughCodec, PaOutput::PaBoost);
    driver.initialize().unwrap();
    driver.set_op_mode(OpMode::LoRa).unwrap();
    handle.clear_write_log();
    (driver, handle)
}

proptest! {
    #[test]
    fn ppm_correction_stays_in_signed_byte_range(
        freq in 400_000_000u64..1_000_000_000,
        error in -200_000_000i64..200_000_000,
    ) {
        let (mut driver, handle) = lora_driver();
        driver.set_frequency(freq, error).unwrap();
        for value in handle.writes_to(REG_LORA_PPM_CORRECTION) {
            // Any u8 reinterprets as a valid i8; what matters is that the
            // clamp produced the nearest representable correction
            let ppm = value as i8;
            let effective = (freq as i64 - error) as u64;
            let exact = 0.95f32 * error as f32 / (effective as f32 / 1_000_000.0);
            if exact <= -128.0 {
                prop_assert_eq!(ppm, -128);
            } else if exact >= 127.0 {
                prop_assert_eq!(ppm, 127);
            } else {
                prop_assert_eq!(ppm, exact.round() as i8);
            }
        }
    }

    #[test]
    fn repeated_set_frequency_writes_nothing_new(
        freq in 400_000_000u64..1_000_000_000,
        error in -1_000_000i64..1_000_000,
    ) {
        let (mut driver, handle) = lora_driver();
        driver.set_frequency(freq, error).unwrap();
        let first = handle.write_log();
        driver.set_frequency(freq, error).unwrap();
        prop_assert_eq!(handle.write_log(), first);
    }

    #[test]
    fn spreading_factor_register_stays_in_range(sf in any::<u8>()) {
        let (mut driver, handle) = lora_driver();
        driver.set_lora_spreading_factor(sf).unwrap();
        let nibble = handle.register(REG_LORA_MODEM_CONFIG_2) >> 4;
        prop_assert!((6..=12).contains(&nibble));
    }

    #[test]
    fn sync_word_never_hits_reserved_values(sync_word in any::<u8>()) {
        let (mut driver, handle) = lora_driver();
        driver.set_lora_sync_word(sync_word).unwrap();
        let written = handle.writes_to(REG_LORA_SYNC_WORD);
        prop_assert_eq!(written.len(), 1);
        prop_assert_ne!(written[0], 0x00);
        prop_assert_ne!(written[0], 0x34);
        if sync_word != 0x00 && sync_word != 0x34 {
            prop_assert_eq!(written[0], sync_word);
        }
    }

    #[test]
    fn bandwidth_from_khz_never_leaves_the_table(khz in 0.0f32..2_000.0) {
        let bw = SignalBandwidth::from_khz(khz);
        prop_assert!((bw as u8) <= SignalBandwidth::Bw500 as u8);
        // Selected step never exceeds the request (once clamped up to 7.8)
        prop_assert!(bw.khz() <= khz.max(7.8));
    }

    #[test]
    fn coding_rate_from_denominator_is_total(denominator in any::<u8>()) {
        let rate = CodingRate::from_denominator(denominator);
        prop_assert!((1..=4).contains(&(rate as u8)));
    }

    #[test]
    fn tx_power_register_stays_in_stage_range(level in -50i32..50) {
        let (mut driver, handle) = lora_driver();
        driver.set_tx_power(level).unwrap();
        let pa_config = *handle.writes_to(REG_PA_CONFIG).last().unwrap();
        prop_assert_eq!(pa_config & PA_BOOST, PA_BOOST);
        prop_assert!((pa_config & 0x0F) <= 15);
    }
}
