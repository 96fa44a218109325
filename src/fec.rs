//! # Forward Error Correction Interface
//!
//! The FSK data path runs every payload through an external FEC codec before
//! it reaches the chip's FIFO, and back through it after reception. The codec
//! itself (whitening, parity scheme, interleaving) lives outside this crate;
//! only its interface is fixed here, as a trait the driver is generic over.
//!
//! LoRa payloads never touch the codec - the LoRa modem applies its own
//! coding in silicon.

/// Encoder/decoder applied to FSK payloads.
///
/// `encoded_len` must be a pure function of the plaintext length: the driver
/// caches the expanded length in the chip's payload-length register and sizes
/// FIFO bursts with it, so encode output for a given input length must always
/// occupy exactly `encoded_len` bytes.
pub trait FecCodec {
    /// Encoded size for a plaintext of `plain_len` bytes
    fn encoded_len(&self, plain_len: usize) -> usize;

    /// Encode `plain` into `encoded`. `encoded` holds exactly
    /// `encoded_len(plain.len())` bytes.
    fn encode(&self, plain: &[u8], encoded: &mut [u8]);

    /// Decode `encoded` into `plain`, recovering `plain.len()` bytes.
    fn decode(&self, encoded: &[u8], plain: &mut [u8]);
}

/// Identity codec for codec-less FSK operation: no expansion, no protection.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl FecCodec for PassthroughCodec {
    fn encoded_len(&self, plain_len: usize) -> usize {
        plain_len
    }

    fn encode(&self, plain: &[u8], encoded: &mut [u8]) {
        encoded.copy_from_slice(plain);
    }

    fn decode(&self, encoded: &[u8], plain: &mut [u8]) {
        plain.copy_from_slice(encoded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_is_identity() {
        let codec = PassthroughCodec;
        let plain = [0xDE, 0xAD, 0xBE, 0xEF];
        assert_eq!(codec.encoded_len(plain.len()), plain.len());

        let mut encoded = [0u8; 4];
        codec.encode(&plain, &mut encoded);
        assert_eq!(encoded, plain);

        let mut recovered = [0u8; 4];
        codec.decode(&encoded, &mut recovered);
        assert_eq!(recovered, plain);
    }
}
