//! Block-chaining modes (ECB, CBC, CFB1, CFB8, CTR) over the AES primitive.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256, Block};
use common::{Direction, Mode, PaddingScheme, BLOCK_SIZE};
use zeroize::{Zeroize, Zeroizing};

use super::padding;
use crate::engine::EngineError;

/// Expanded AES key for one of the three supported sizes.
pub(super) enum BlockKey {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl BlockKey {
    pub(super) fn new(key: &[u8]) -> Result<Self, EngineError> {
        let invalid = || EngineError::Failure(format!("invalid AES key length: {}", key.len()));
        match key.len() {
            16 => Aes128::new_from_slice(key)
                .map(BlockKey::Aes128)
                .map_err(|_| invalid()),
            24 => Aes192::new_from_slice(key)
                .map(BlockKey::Aes192)
                .map_err(|_| invalid()),
            32 => Aes256::new_from_slice(key)
                .map(BlockKey::Aes256)
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }

    fn encrypt(&self, block: &mut [u8; BLOCK_SIZE]) {
        let mut b = Block::from(*block);
        match self {
            BlockKey::Aes128(c) => c.encrypt_block(&mut b),
            BlockKey::Aes192(c) => c.encrypt_block(&mut b),
            BlockKey::Aes256(c) => c.encrypt_block(&mut b),
        }
        block.copy_from_slice(&b);
    }

    fn decrypt(&self, block: &mut [u8; BLOCK_SIZE]) {
        let mut b = Block::from(*block);
        match self {
            BlockKey::Aes128(c) => c.decrypt_block(&mut b),
            BlockKey::Aes192(c) => c.decrypt_block(&mut b),
            BlockKey::Aes256(c) => c.decrypt_block(&mut b),
        }
        block.copy_from_slice(&b);
    }
}

/// Incremental state of a non-AEAD transform.
///
/// `register` is the CBC chaining value, the CFB shift register, or the CTR
/// counter block, depending on `mode`.
pub(super) struct BlockTransform {
    key: BlockKey,
    mode: Mode,
    padding: PaddingScheme,
    direction: Direction,
    register: [u8; BLOCK_SIZE],
    keystream: [u8; BLOCK_SIZE],
    keystream_pos: usize,
    pending: Zeroizing<Vec<u8>>,
}

impl BlockTransform {
    pub(super) fn new(
        mode: Mode,
        padding: PaddingScheme,
        key: &[u8],
        iv: &[u8],
        direction: Direction,
    ) -> Result<Self, EngineError> {
        let mut register = [0u8; BLOCK_SIZE];
        match mode {
            Mode::Ecb => {}
            Mode::Cbc | Mode::Cfb1 | Mode::Cfb8 | Mode::Ctr => {
                if iv.len() != BLOCK_SIZE {
                    return Err(EngineError::Failure(format!(
                        "invalid IV length for {mode}: {}",
                        iv.len()
                    )));
                }
                register.copy_from_slice(iv);
            }
            Mode::Gcm | Mode::Ccm => {
                return Err(EngineError::Failure(format!(
                    "{mode} is not a block-chaining mode"
                )))
            }
        }

        Ok(Self {
            key: BlockKey::new(key)?,
            mode,
            // Padding only applies where partial blocks are possible.
            padding: if mode.is_padded_block_mode() {
                padding
            } else {
                PaddingScheme::None
            },
            direction,
            register,
            keystream: [0u8; BLOCK_SIZE],
            keystream_pos: BLOCK_SIZE,
            pending: Zeroizing::new(Vec::new()),
        })
    }

    pub(super) fn update(&mut self, input: &[u8]) -> Result<Vec<u8>, EngineError> {
        Ok(match self.mode {
            Mode::Ecb | Mode::Cbc => self.update_blocks(input),
            Mode::Cfb1 => self.cfb1(input),
            Mode::Cfb8 => self.cfb8(input),
            Mode::Ctr => self.ctr(input),
            Mode::Gcm | Mode::Ccm => {
                return Err(EngineError::Failure(format!(
                    "{} is not a block-chaining mode",
                    self.mode
                )))
            }
        })
    }

    pub(super) fn finalize(&mut self, input: &[u8]) -> Result<Vec<u8>, EngineError> {
        let mut out = self.update(input)?;
        if !self.mode.is_padded_block_mode() {
            return Ok(out);
        }

        let pending = std::mem::take(&mut *self.pending);
        let pending = Zeroizing::new(pending);
        match (self.direction, self.padding.is_none()) {
            (_, true) => {
                if !pending.is_empty() {
                    return Err(EngineError::IllegalBlockSize(format!(
                        "input length not a multiple of {BLOCK_SIZE} bytes with NONE padding"
                    )));
                }
            }
            (Direction::Encrypt, false) => {
                let mut block = [0u8; BLOCK_SIZE];
                block[..pending.len()].copy_from_slice(&pending);
                padding::pad(self.padding, &mut block, pending.len());
                self.chain_block(&mut block);
                out.extend_from_slice(&block);
                block.zeroize();
            }
            (Direction::Decrypt, false) => {
                if pending.len() != BLOCK_SIZE {
                    return Err(EngineError::IllegalBlockSize(format!(
                        "final block is {} bytes, expected {BLOCK_SIZE}",
                        pending.len()
                    )));
                }
                let mut block = [0u8; BLOCK_SIZE];
                block.copy_from_slice(&pending);
                self.chain_block(&mut block);
                let result = padding::unpad(self.padding, &block).map(|p| out.extend_from_slice(p));
                block.zeroize();
                result?;
            }
        }
        Ok(out)
    }

    /// ECB/CBC: emit every complete block, keeping the remainder buffered.
    /// A padded decrypt also withholds the last complete block for unpadding.
    fn update_blocks(&mut self, input: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(input);
        let mut blocks = self.pending.len() / BLOCK_SIZE;
        let withhold = self.direction == Direction::Decrypt && !self.padding.is_none();
        if withhold && blocks > 0 && self.pending.len() % BLOCK_SIZE == 0 {
            blocks -= 1;
        }

        let take = blocks * BLOCK_SIZE;
        let mut out = Vec::with_capacity(take);
        for i in 0..blocks {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(&self.pending[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE]);
            self.chain_block(&mut block);
            out.extend_from_slice(&block);
        }
        self.pending.drain(..take);
        out
    }

    fn chain_block(&mut self, block: &mut [u8; BLOCK_SIZE]) {
        match (self.mode, self.direction) {
            (Mode::Cbc, Direction::Encrypt) => {
                xor_in_place(block, &self.register);
                self.key.encrypt(block);
                self.register = *block;
            }
            (Mode::Cbc, Direction::Decrypt) => {
                let ciphertext = *block;
                self.key.decrypt(block);
                xor_in_place(block, &self.register);
                self.register = ciphertext;
            }
            (_, Direction::Encrypt) => self.key.encrypt(block),
            (_, Direction::Decrypt) => self.key.decrypt(block),
        }
    }

    fn cfb8(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());
        for &byte in input {
            let mut keystream = self.register;
            self.key.encrypt(&mut keystream);
            let transformed = byte ^ keystream[0];
            let feedback = match self.direction {
                Direction::Encrypt => transformed,
                Direction::Decrypt => byte,
            };
            self.register.copy_within(1.., 0);
            self.register[BLOCK_SIZE - 1] = feedback;
            out.push(transformed);
        }
        out
    }

    /// One-bit feedback, most significant bit first.
    fn cfb1(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());
        for &byte in input {
            let mut transformed = 0u8;
            for shift in (0..8).rev() {
                let mut keystream = self.register;
                self.key.encrypt(&mut keystream);
                let in_bit = (byte >> shift) & 1;
                let out_bit = in_bit ^ (keystream[0] >> 7);
                transformed |= out_bit << shift;
                let feedback = match self.direction {
                    Direction::Encrypt => out_bit,
                    Direction::Decrypt => in_bit,
                };
                shift_in_bit(&mut self.register, feedback);
            }
            out.push(transformed);
        }
        out
    }

    fn ctr(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());
        for &byte in input {
            if self.keystream_pos == BLOCK_SIZE {
                self.keystream = self.register;
                self.key.encrypt(&mut self.keystream);
                let counter = u128::from_be_bytes(self.register).wrapping_add(1);
                self.register = counter.to_be_bytes();
                self.keystream_pos = 0;
            }
            out.push(byte ^ self.keystream[self.keystream_pos]);
            self.keystream_pos += 1;
        }
        out
    }
}

impl Drop for BlockTransform {
    fn drop(&mut self) {
        self.register.zeroize();
        self.keystream.zeroize();
    }
}

fn xor_in_place(block: &mut [u8; BLOCK_SIZE], other: &[u8; BLOCK_SIZE]) {
    block.iter_mut().zip(other).for_each(|(b, o)| *b ^= o);
}

fn shift_in_bit(register: &mut [u8; BLOCK_SIZE], bit: u8) {
    for i in 0..BLOCK_SIZE - 1 {
        register[i] = (register[i] << 1) | (register[i + 1] >> 7);
    }
    register[BLOCK_SIZE - 1] = (register[BLOCK_SIZE - 1] << 1) | bit;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    // NIST SP 800-38A, F.2.1 / F.3.7 / F.3.13 / F.5.1, first block of each.
    const KEY: [u8; 16] = hex!("2b7e151628aed2a6abf7158809cf4f3c");
    const IV: [u8; 16] = hex!("000102030405060708090a0b0c0d0e0f");
    const PLAIN: [u8; 16] = hex!("6bc1bee22e409f96e93d7e117393172a");

    fn encrypt(mode: Mode, iv: &[u8], input: &[u8]) -> Vec<u8> {
        let mut t = BlockTransform::new(mode, PaddingScheme::None, &KEY, iv, Direction::Encrypt).unwrap();
        t.finalize(input).unwrap()
    }

    #[test]
    fn cbc_known_answer() {
        assert_eq!(
            encrypt(Mode::Cbc, &IV, &PLAIN),
            hex!("7649abac8119b246cee98e9b12e9197d")
        );
    }

    #[test]
    fn cfb8_known_answer() {
        assert_eq!(
            encrypt(Mode::Cfb8, &IV, &hex!("6bc1bee22e409f96e93d7e117393172aae2d")),
            hex!("3b79424c9c0dd436bace9e0ed4586a4f32b9")
        );
    }

    #[test]
    fn cfb1_known_answer() {
        // F.3.1: plaintext bits 0110 1011 1100 0001 → ciphertext bits 0110 1000 1011 0011.
        assert_eq!(encrypt(Mode::Cfb1, &IV, &hex!("6bc1")), hex!("68b3"));
    }

    #[test]
    fn ctr_known_answer() {
        let counter = hex!("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff");
        assert_eq!(
            encrypt(Mode::Ctr, &counter, &PLAIN),
            hex!("874d6191b620e3261bef6864990db6ce")
        );
    }

    #[test]
    fn ecb_known_answer() {
        assert_eq!(
            encrypt(Mode::Ecb, &[], &PLAIN),
            hex!("3ad77bb40d7a3660a89ecaf32466ef97")
        );
    }

    #[test]
    fn padded_decrypt_withholds_last_block() {
        let mut enc = BlockTransform::new(Mode::Cbc, PaddingScheme::Pkcs7, &KEY, &IV, Direction::Encrypt).unwrap();
        let ciphertext = enc.finalize(&[7u8; 32]).unwrap();
        assert_eq!(ciphertext.len(), 48);

        let mut dec = BlockTransform::new(Mode::Cbc, PaddingScheme::Pkcs7, &KEY, &IV, Direction::Decrypt).unwrap();
        let head = dec.update(&ciphertext).unwrap();
        assert_eq!(head.len(), 32);
        let tail = dec.finalize(&[]).unwrap();
        assert!(tail.is_empty());
        assert_eq!(head, vec![7u8; 32]);
    }

    #[test]
    fn misaligned_input_without_padding_fails() {
        let mut t = BlockTransform::new(Mode::Ecb, PaddingScheme::None, &KEY, &[], Direction::Encrypt).unwrap();
        assert!(matches!(t.finalize(&[0u8; 20]), Err(EngineError::IllegalBlockSize(_))));
    }

    #[test]
    fn truncated_padded_ciphertext_fails() {
        let mut t = BlockTransform::new(Mode::Cbc, PaddingScheme::Pkcs7, &KEY, &[0u8; 16], Direction::Decrypt).unwrap();
        assert!(matches!(t.finalize(&[0u8; 20]), Err(EngineError::IllegalBlockSize(_))));
    }

    #[test]
    fn wrong_iv_length_rejected() {
        assert!(BlockTransform::new(Mode::Ctr, PaddingScheme::None, &KEY, &[0u8; 8], Direction::Encrypt).is_err());
    }
}
