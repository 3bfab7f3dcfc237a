//! Output-size arithmetic.

use common::{CipherSpec, Direction, AEAD_TAG_LEN, BLOCK_SIZE};

/// Output size estimate for `input_len` bytes.
///
/// Padded ECB/CBC round up to a whole block; every other combination,
/// AEAD included, returns `input_len` (the tag is reported separately by
/// `CipherSession::tag_len`).
pub fn output_size(spec: &CipherSpec, input_len: usize) -> usize {
    if spec.mode.is_padded_block_mode() && !spec.padding.is_none() {
        input_len + (BLOCK_SIZE - input_len % BLOCK_SIZE) % BLOCK_SIZE
    } else {
        input_len
    }
}

/// Worst-case bytes a single update or finalize may emit.
///
/// `pending` is how much earlier input the engine may still be holding.
/// Used to reject short caller buffers before calling the engine.
pub fn output_bound(spec: &CipherSpec, direction: Direction, pending: usize, input_len: usize) -> usize {
    let mut bound = pending + input_len + BLOCK_SIZE;
    if spec.mode.supports_aad() && direction == Direction::Encrypt {
        bound += AEAD_TAG_LEN;
    }
    bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{KeySize, Mode, PaddingScheme};

    fn spec(mode: Mode, padding: PaddingScheme) -> CipherSpec {
        CipherSpec::new(KeySize::Aes128, mode, padding)
    }

    #[test]
    fn padded_block_modes_round_up() {
        for mode in [Mode::Ecb, Mode::Cbc] {
            let s = spec(mode, PaddingScheme::Pkcs7);
            for n in 0..=64 {
                assert_eq!(output_size(&s, n), n + (16 - n % 16) % 16, "{mode} n={n}");
            }
            assert_eq!(output_size(&s, 20), 32);
            assert_eq!(output_size(&s, 32), 32);
        }
    }

    #[test]
    fn unpadded_and_stream_modes_are_identity() {
        assert_eq!(output_size(&spec(Mode::Cbc, PaddingScheme::None), 20), 20);
        for mode in [Mode::Cfb1, Mode::Cfb8, Mode::Ctr, Mode::Gcm, Mode::Ccm] {
            assert_eq!(output_size(&spec(mode, PaddingScheme::Pkcs7), 37), 37, "{mode}");
        }
    }

    #[test]
    fn bound_includes_tag_only_when_sealing() {
        let gcm = spec(Mode::Gcm, PaddingScheme::None);
        assert_eq!(output_bound(&gcm, Direction::Encrypt, 10, 5), 10 + 5 + 16 + 16);
        assert_eq!(output_bound(&gcm, Direction::Decrypt, 10, 5), 10 + 5 + 16);
        let cbc = spec(Mode::Cbc, PaddingScheme::Pkcs7);
        assert_eq!(output_bound(&cbc, Direction::Encrypt, 0, 20), 36);
    }
}
