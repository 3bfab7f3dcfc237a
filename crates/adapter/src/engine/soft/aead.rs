//! AES-GCM and AES-CCM contexts.
//!
//! Both constructions buffer the whole message and seal or open it in
//! `finalize`, so decrypted bytes are only released after the tag verified.
//! CCM additionally pins the message length at configure time.

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::AesGcm;
use ccm::Ccm;
use common::{Direction, Mode, AEAD_TAG_LEN};
use zeroize::Zeroizing;

use crate::engine::EngineError;

/// Nonce length accepted by both constructions.
pub(super) const NONCE_LEN: usize = 12;

pub(super) struct AeadTransform {
    mode: Mode,
    direction: Direction,
    key: Zeroizing<Vec<u8>>,
    nonce: [u8; NONCE_LEN],
    aad: Zeroizing<Vec<u8>>,
    data: Zeroizing<Vec<u8>>,
    declared_len: Option<usize>,
    data_started: bool,
}

impl AeadTransform {
    pub(super) fn new(
        mode: Mode,
        key: &[u8],
        iv: &[u8],
        direction: Direction,
        length_hint: Option<usize>,
    ) -> Result<Self, EngineError> {
        if !mode.supports_aad() {
            return Err(EngineError::Failure(format!("{mode} is not an AEAD mode")));
        }
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(EngineError::Failure(format!(
                "invalid AES key length: {}",
                key.len()
            )));
        }
        let nonce: [u8; NONCE_LEN] = iv.try_into().map_err(|_| {
            EngineError::Failure(format!("invalid nonce length for {mode}: {}", iv.len()))
        })?;
        let declared_len = match mode {
            Mode::Ccm => Some(length_hint.ok_or_else(|| {
                EngineError::Failure("CCM requires the message length at configure time".into())
            })?),
            _ => None,
        };

        Ok(Self {
            mode,
            direction,
            key: Zeroizing::new(key.to_vec()),
            nonce,
            aad: Zeroizing::new(Vec::new()),
            data: Zeroizing::new(Vec::new()),
            declared_len,
            data_started: false,
        })
    }

    pub(super) fn absorb_aad(&mut self, aad: &[u8]) -> Result<(), EngineError> {
        if self.data_started {
            return Err(EngineError::Failure(
                "AAD must be absorbed before any data".into(),
            ));
        }
        self.aad.extend_from_slice(aad);
        Ok(())
    }

    pub(super) fn update(&mut self, input: &[u8]) -> Result<Vec<u8>, EngineError> {
        self.data_started = true;
        if let Some(limit) = self.declared_len {
            if self.data.len() + input.len() > limit {
                return Err(EngineError::Failure(format!(
                    "CCM input exceeds the declared message length of {limit} bytes"
                )));
            }
        }
        self.data.extend_from_slice(input);
        Ok(Vec::new())
    }

    pub(super) fn finalize(&mut self, input: &[u8]) -> Result<Vec<u8>, EngineError> {
        self.update(input)?;
        if let Some(limit) = self.declared_len {
            if self.data.len() != limit {
                return Err(EngineError::Failure(format!(
                    "CCM message is {} bytes, declared {limit}",
                    self.data.len()
                )));
            }
        }
        if self.direction == Direction::Decrypt && self.data.len() < AEAD_TAG_LEN {
            return Err(EngineError::IllegalBlockSize(format!(
                "ciphertext is {} bytes, shorter than the {AEAD_TAG_LEN}-byte tag",
                self.data.len()
            )));
        }

        match (self.mode, self.key.len()) {
            (Mode::Gcm, 16) => self.run::<AesGcm<Aes128, U12>>(),
            (Mode::Gcm, 24) => self.run::<AesGcm<Aes192, U12>>(),
            (Mode::Gcm, 32) => self.run::<AesGcm<Aes256, U12>>(),
            (Mode::Ccm, 16) => self.run::<Ccm<Aes128, U16, U12>>(),
            (Mode::Ccm, 24) => self.run::<Ccm<Aes192, U16, U12>>(),
            (Mode::Ccm, 32) => self.run::<Ccm<Aes256, U16, U12>>(),
            (mode, len) => Err(EngineError::Failure(format!(
                "unsupported AEAD configuration: {mode} with {len}-byte key"
            ))),
        }
    }

    fn run<A: Aead + KeyInit>(&self) -> Result<Vec<u8>, EngineError> {
        let cipher = A::new_from_slice(&self.key)
            .map_err(|_| EngineError::Failure("invalid AEAD key length".into()))?;
        let nonce = GenericArray::from_slice(&self.nonce);
        let payload = Payload {
            msg: &self.data,
            aad: &self.aad,
        };
        match self.direction {
            Direction::Encrypt => cipher
                .encrypt(nonce, payload)
                .map_err(|_| EngineError::Failure("AEAD seal failed".into())),
            Direction::Decrypt => cipher
                .decrypt(nonce, payload)
                .map_err(|_| EngineError::AuthenticationFailure),
        }
    }
}
