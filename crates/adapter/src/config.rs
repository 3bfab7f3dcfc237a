//! Configuration loading and validation for the command-line front end.
//!
//! All values are read from `CIPHER_ADAPTER_*` environment variables at
//! startup. The process exits with a clear error message if any required
//! variable is missing or invalid.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{CipherSpec, Direction};
use serde::Deserialize;
use zeroize::Zeroizing;

/// Environment variable prefix; `CIPHER_ADAPTER_KEY_B64` sets `key_b64`.
pub const ENV_PREFIX: &str = "CIPHER_ADAPTER";

/// Validated front-end configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Cipher identifier, e.g. `AES-256-GCM` or `AES128/CBC/PKCS7`. **Required.**
    pub cipher: String,

    /// Padding scheme for ECB and CBC.
    #[serde(default = "default_padding")]
    pub padding: String,

    #[serde(default)]
    pub direction: Direction,

    /// Standard base64 key. **Required.**
    pub key_b64: String,

    /// Standard base64 IV or nonce. **Required** (may be empty for ECB).
    pub iv_b64: String,

    /// Standard base64 additional authenticated data (GCM and CCM only).
    #[serde(default)]
    pub aad_b64: Option<String>,

    /// File to read. **Required.**
    pub input_path: String,

    /// File to write. **Required.**
    pub output_path: String,

    /// Bytes handed to each `update` call.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_padding() -> String {
    "NONE".into()
}
fn default_chunk_size() -> usize {
    4096
}
fn default_log_level() -> String {
    "info".into()
}

/// Decoded cipher inputs derived from a [`Config`].
pub struct Job {
    pub spec: CipherSpec,
    pub direction: Direction,
    pub key: Zeroizing<Vec<u8>>,
    pub iv: Vec<u8>,
    pub aad: Option<Vec<u8>>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("spec", &self.spec)
            .field("direction", &self.direction)
            .field("key", &"[REDACTED]")
            .field("iv_len", &self.iv.len())
            .field("aad_len", &self.aad.as_ref().map(Vec::len))
            .finish()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("cipher", &self.cipher)
            .field("padding", &self.padding)
            .field("direction", &self.direction)
            .field("key_b64", &"[REDACTED]")
            .field("input_path", &self.input_path)
            .field("output_path", &self.output_path)
            .field("chunk_size", &self.chunk_size)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.cipher, "CIPHER")?;
        ensure_non_empty(&self.key_b64, "KEY_B64")?;
        ensure_non_empty(&self.input_path, "INPUT_PATH")?;
        ensure_non_empty(&self.output_path, "OUTPUT_PATH")?;

        if self.chunk_size == 0 {
            anyhow::bail!("CHUNK_SIZE must be > 0");
        }
        self.job().map(|_| ())
    }

    /// Parse the cipher and decode the base64 inputs.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown cipher or padding, undecodable
    /// base64, or a key whose length does not match the cipher.
    pub fn job(&self) -> Result<Job> {
        let spec = CipherSpec::parse(&self.cipher, &self.padding)
            .with_context(|| format!("invalid CIPHER/PADDING: {}/{}", self.cipher, self.padding))?;

        let key = Zeroizing::new(decode(&self.key_b64, "KEY_B64")?);
        if key.len() != spec.key_size.bytes() {
            anyhow::bail!(
                "KEY_B64 decodes to {} bytes but {} needs {}",
                key.len(),
                spec.name(),
                spec.key_size.bytes()
            );
        }
        let iv = decode(&self.iv_b64, "IV_B64")?;
        let aad = self
            .aad_b64
            .as_deref()
            .map(|aad| decode(aad, "AAD_B64"))
            .transpose()?;
        if aad.is_some() && !spec.mode.supports_aad() {
            anyhow::bail!("AAD_B64 is only valid for GCM and CCM, not {}", spec.mode);
        }

        Ok(Job {
            spec,
            direction: self.direction,
            key,
            iv,
            aad,
        })
    }
}

fn decode(value: &str, name: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value.trim())
        .with_context(|| format!("{name} is not valid base64"))
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Mode;

    fn valid() -> Config {
        Config {
            cipher: "AES-128-CBC".into(),
            padding: "PKCS7".into(),
            direction: Direction::Encrypt,
            key_b64: STANDARD.encode([7u8; 16]),
            iv_b64: STANDARD.encode([9u8; 16]),
            aad_b64: None,
            input_path: "/tmp/in.bin".into(),
            output_path: "/tmp/out.bin".into(),
            chunk_size: default_chunk_size(),
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_padding(), "NONE");
        assert_eq!(default_chunk_size(), 4096);
        assert_eq!(default_log_level(), "info");
        assert_eq!(Direction::default(), Direction::Encrypt);
    }

    #[test]
    fn valid_config_yields_job() {
        let cfg = valid();
        cfg.validate().unwrap();
        let job = cfg.job().unwrap();
        assert_eq!(job.spec.mode, Mode::Cbc);
        assert_eq!(job.key.len(), 16);
        assert!(format!("{job:?}").contains("REDACTED"));
    }

    #[test]
    fn validate_rejects_empty_input_path() {
        let cfg = Config {
            input_path: " ".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_chunk_size() {
        let cfg = Config {
            chunk_size: 0,
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_key_length_mismatch() {
        let cfg = Config {
            cipher: "AES-256-CBC".into(),
            ..valid()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("needs 32"));
    }

    #[test]
    fn validate_rejects_bad_base64_and_unknown_cipher() {
        let cfg = Config {
            iv_b64: "not base64!".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            cipher: "DES-56-CBC".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn aad_only_for_aead_modes() {
        let cfg = Config {
            aad_b64: Some(STANDARD.encode(b"hdr")),
            ..valid()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            cipher: "AES-128-GCM".into(),
            padding: "NONE".into(),
            iv_b64: STANDARD.encode([1u8; 12]),
            aad_b64: Some(STANDARD.encode(b"hdr")),
            ..valid()
        };
        assert_eq!(cfg.job().unwrap().aad.as_deref(), Some(&b"hdr"[..]));
    }
}
