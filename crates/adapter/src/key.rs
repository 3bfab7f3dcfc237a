//! Key material passed through wrap and unwrap.

use std::fmt;

use common::CipherError;
use zeroize::Zeroizing;

/// The class of key an unwrapped blob should be reconstructed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Secret,
    Public,
    Private,
}

impl KeyKind {
    pub fn is_asymmetric(self) -> bool {
        matches!(self, KeyKind::Public | KeyKind::Private)
    }
}

/// A key that may be exported as raw bytes for wrapping.
pub trait EncodableKey {
    /// Algorithm name the key belongs to (e.g. `AES`).
    fn algorithm(&self) -> &str;

    /// Raw encoding, or `None` when the key cannot be exported.
    fn encoded(&self) -> Option<&[u8]>;
}

/// Raw symmetric key material tagged with its algorithm.
///
/// The bytes are zeroed when the value is dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey {
    algorithm: String,
    material: Zeroizing<Vec<u8>>,
}

impl SecretKey {
    /// Build a key for `algorithm`, checking the material against it.
    ///
    /// `AES` keys (matched case-insensitively) must be 16, 24 or 32 bytes;
    /// keys of any other algorithm must be non-empty.
    pub fn new(algorithm: impl Into<String>, material: Vec<u8>) -> Result<Self, CipherError> {
        let algorithm = algorithm.into();
        let material = Zeroizing::new(material);
        let accepted = if algorithm.eq_ignore_ascii_case("AES") {
            matches!(material.len(), 16 | 24 | 32)
        } else {
            !material.is_empty()
        };
        if !accepted {
            return Err(CipherError::InvalidKey(format!(
                "{} bytes of key material rejected by {algorithm}",
                material.len()
            )));
        }
        Ok(Self {
            algorithm,
            material,
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.material
    }

    pub fn len(&self) -> usize {
        self.material.len()
    }

    pub fn is_empty(&self) -> bool {
        self.material.is_empty()
    }
}

impl EncodableKey for SecretKey {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn encoded(&self) -> Option<&[u8]> {
        Some(&self.material)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material.
        f.debug_struct("SecretKey")
            .field("algorithm", &self.algorithm)
            .field("material", &"[REDACTED]")
            .finish()
    }
}
