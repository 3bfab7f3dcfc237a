//! The parameter object handed to `initialize`.

use common::{CipherError, Mode, AEAD_TAG_LEN};

/// Cipher parameters accompanying the key.
#[derive(Clone, PartialEq, Eq)]
pub enum ParameterSpec {
    /// A bare IV or nonce. Accepted by every mode.
    Iv(Vec<u8>),
    /// Nonce plus tag length in bytes. Only GCM and CCM with a 16-byte tag.
    Aead { iv: Vec<u8>, tag_len: usize },
    /// No parameter object.
    None,
}

impl ParameterSpec {
    /// Check the parameter shape against `mode` and return the IV it carries.
    pub(crate) fn resolve_iv(&self, mode: Mode) -> Result<&[u8], CipherError> {
        let iv = match self {
            ParameterSpec::Iv(iv) => iv.as_slice(),
            ParameterSpec::Aead { iv, tag_len } => {
                if !mode.supports_aad() {
                    return Err(CipherError::UnsupportedParameter(format!(
                        "AEAD parameters are not valid for {mode}"
                    )));
                }
                if *tag_len != AEAD_TAG_LEN {
                    return Err(CipherError::UnsupportedParameter(format!(
                        "tag length {tag_len} (only {AEAD_TAG_LEN} is supported)"
                    )));
                }
                iv.as_slice()
            }
            ParameterSpec::None => {
                return Err(CipherError::UnsupportedParameter(
                    "an IV parameter specification is required".into(),
                ))
            }
        };

        // ECB carries no IV; whatever was supplied is ignored.
        if mode == Mode::Ecb {
            return Ok(&[]);
        }
        if iv.len() != mode.iv_len() {
            return Err(CipherError::UnsupportedParameter(format!(
                "{mode} requires a {}-byte IV, got {}",
                mode.iv_len(),
                iv.len()
            )));
        }
        Ok(iv)
    }
}

impl std::fmt::Debug for ParameterSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterSpec::Iv(iv) => write!(f, "Iv({} bytes)", iv.len()),
            ParameterSpec::Aead { iv, tag_len } => {
                write!(f, "Aead {{ iv: {} bytes, tag_len: {tag_len} }}", iv.len())
            }
            ParameterSpec::None => f.write_str("None"),
        }
    }
}
