//! Algorithm identifiers shared by the engine, the session layer, and
//! configuration.
//!
//! # Name format
//!
//! ```text
//! AES-<bits>-<MODE>            engine identifier, e.g. AES-256-GCM
//! AES<bits>/<MODE>[/<PADDING>] transformation form, e.g. AES128/CBC/PKCS7
//! ```
//!
//! Parsing is case-insensitive. Padding defaults to `NONE` when absent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CipherError;

/// Block size of every supported cipher family, in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Authentication tag length produced by GCM and CCM, in bytes.
pub const AEAD_TAG_LEN: usize = 16;

/// AES key size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySize {
    Aes128,
    Aes192,
    Aes256,
}

impl KeySize {
    /// Key length in bytes.
    pub fn bytes(self) -> usize {
        match self {
            KeySize::Aes128 => 16,
            KeySize::Aes192 => 24,
            KeySize::Aes256 => 32,
        }
    }

    /// Key length in bits.
    pub fn bits(self) -> usize {
        self.bytes() * 8
    }

    fn from_bits(bits: &str) -> Result<Self, CipherError> {
        match bits {
            "128" => Ok(KeySize::Aes128),
            "192" => Ok(KeySize::Aes192),
            "256" => Ok(KeySize::Aes256),
            other => Err(CipherError::UnsupportedParameter(format!(
                "unsupported AES key size: {other}"
            ))),
        }
    }
}

/// Cipher mode of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Ecb,
    Cbc,
    Cfb1,
    Cfb8,
    Ctr,
    Gcm,
    Ccm,
}

impl Mode {
    /// All supported modes, in declaration order.
    pub const ALL: [Mode; 7] = [
        Mode::Ecb,
        Mode::Cbc,
        Mode::Cfb1,
        Mode::Cfb8,
        Mode::Ctr,
        Mode::Gcm,
        Mode::Ccm,
    ];

    /// Upper-case name as used in cipher identifiers.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Ecb => "ECB",
            Mode::Cbc => "CBC",
            Mode::Cfb1 => "CFB1",
            Mode::Cfb8 => "CFB8",
            Mode::Ctr => "CTR",
            Mode::Gcm => "GCM",
            Mode::Ccm => "CCM",
        }
    }

    /// Only the AEAD modes accept additional authenticated data.
    pub fn supports_aad(self) -> bool {
        matches!(self, Mode::Gcm | Mode::Ccm)
    }

    /// Modes that apply the configured padding scheme.
    pub fn is_padded_block_mode(self) -> bool {
        matches!(self, Mode::Ecb | Mode::Cbc)
    }

    /// Required IV length in bytes. ECB takes none and ignores whatever is supplied.
    pub fn iv_len(self) -> usize {
        match self {
            Mode::Ecb => 0,
            Mode::Cbc | Mode::Cfb1 | Mode::Cfb8 | Mode::Ctr => BLOCK_SIZE,
            Mode::Gcm | Mode::Ccm => 12,
        }
    }
}

impl FromStr for Mode {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CipherError::UnsupportedParameter(format!("unsupported mode: {s}")))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Padding scheme applied by ECB and CBC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaddingScheme {
    #[default]
    None,
    Pkcs7,
    /// Identical to PKCS7 on a 16-byte block.
    Pkcs5,
    Iso10126_2,
    X9_23,
    Iso7816_4,
}

impl PaddingScheme {
    /// All supported schemes, in declaration order.
    pub const ALL: [PaddingScheme; 6] = [
        PaddingScheme::None,
        PaddingScheme::Pkcs7,
        PaddingScheme::Pkcs5,
        PaddingScheme::Iso10126_2,
        PaddingScheme::X9_23,
        PaddingScheme::Iso7816_4,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaddingScheme::None => "NONE",
            PaddingScheme::Pkcs7 => "PKCS7",
            PaddingScheme::Pkcs5 => "PKCS5",
            PaddingScheme::Iso10126_2 => "ISO10126_2",
            PaddingScheme::X9_23 => "X9_23",
            PaddingScheme::Iso7816_4 => "ISO7816_4",
        }
    }

    pub fn is_none(self) -> bool {
        self == PaddingScheme::None
    }
}

impl FromStr for PaddingScheme {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Accept the JCE spelling as well, e.g. `PKCS5Padding`, `NoPadding`.
        let s = s.strip_suffix("Padding").unwrap_or(s);
        if s.eq_ignore_ascii_case("no") {
            return Ok(PaddingScheme::None);
        }
        PaddingScheme::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                CipherError::UnsupportedParameter(format!("unsupported padding: {s}"))
            })
    }
}

impl fmt::Display for PaddingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a cipher operation. Wrap maps to encrypt, unwrap to decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Encrypt,
    Decrypt,
}

impl Direction {
    /// Direction used by key wrapping (`true`) or unwrapping (`false`).
    pub fn for_wrap(wrap: bool) -> Self {
        if wrap {
            Direction::Encrypt
        } else {
            Direction::Decrypt
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encrypt => f.write_str("encrypt"),
            Direction::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Fully resolved cipher configuration: key size, mode, and padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CipherSpec {
    pub key_size: KeySize,
    pub mode: Mode,
    pub padding: PaddingScheme,
}

impl CipherSpec {
    pub fn new(key_size: KeySize, mode: Mode, padding: PaddingScheme) -> Self {
        Self {
            key_size,
            mode,
            padding,
        }
    }

    /// Engine cipher identifier, e.g. `AES-128-CBC`. Padding is not part of it.
    pub fn name(&self) -> String {
        format!("AES-{}-{}", self.key_size.bits(), self.mode)
    }

    /// Parse a cipher identifier and a separate padding name.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::UnsupportedParameter`] if either part is unknown.
    pub fn parse(name: &str, padding: &str) -> Result<Self, CipherError> {
        let mut spec: CipherSpec = name.parse()?;
        spec.padding = padding.parse()?;
        Ok(spec)
    }
}

impl FromStr for CipherSpec {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported =
            || CipherError::UnsupportedParameter(format!("unsupported cipher name: {s}"));
        let s = s.trim();

        // `AES-128-CBC` or `AES128/CBC[/PADDING]`.
        let (family_bits, mode, padding) = if s.contains('/') {
            let parts: Vec<&str> = s.split('/').collect();
            match parts.as_slice() {
                [fb, mode] => (fb.to_string(), *mode, None),
                [fb, mode, padding] => (fb.to_string(), *mode, Some(*padding)),
                _ => return Err(unsupported()),
            }
        } else {
            let parts: Vec<&str> = s.split('-').collect();
            match parts.as_slice() {
                [family, bits, mode] => (format!("{family}{bits}"), *mode, None),
                _ => return Err(unsupported()),
            }
        };

        let bits = match (family_bits.get(..3), family_bits.get(3..)) {
            (Some(family), Some(bits)) if family.eq_ignore_ascii_case("AES") => bits,
            _ => return Err(unsupported()),
        };
        let key_size = KeySize::from_bits(bits)?;
        let mode = mode.parse()?;
        let padding = match padding {
            Some(p) => p.parse()?,
            None => PaddingScheme::None,
        };
        Ok(Self::new(key_size, mode, padding))
    }
}

impl fmt::Display for CipherSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AES{}/{}/{}", self.key_size.bits(), self.mode, self.padding)
    }
}

impl TryFrom<String> for CipherSpec {
    type Error = CipherError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CipherSpec> for String {
    fn from(spec: CipherSpec) -> Self {
        spec.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_engine_identifier() {
        let spec: CipherSpec = "AES-256-GCM".parse().unwrap();
        assert_eq!(spec.key_size, KeySize::Aes256);
        assert_eq!(spec.mode, Mode::Gcm);
        assert_eq!(spec.padding, PaddingScheme::None);
        assert_eq!(spec.name(), "AES-256-GCM");
    }

    #[test]
    fn parses_transformation_form() {
        let spec: CipherSpec = "aes192/cfb8/iso7816_4".parse().unwrap();
        assert_eq!(spec.key_size, KeySize::Aes192);
        assert_eq!(spec.mode, Mode::Cfb8);
        assert_eq!(spec.padding, PaddingScheme::Iso7816_4);
        assert_eq!(spec.to_string(), "AES192/CFB8/ISO7816_4");
    }

    #[test]
    fn parse_with_separate_padding() {
        let spec = CipherSpec::parse("AES-128-CBC", "PKCS5Padding").unwrap();
        assert_eq!(spec.padding, PaddingScheme::Pkcs5);
        let spec = CipherSpec::parse("AES-128-CBC", "NoPadding").unwrap();
        assert!(spec.padding.is_none());
    }

    #[test]
    fn rejects_unknown_names() {
        for bad in ["DES-128-CBC", "AES-512-CBC", "AES-128-XTS", "AES128", "AES/CBC/PKCS7/X"] {
            let err = bad.parse::<CipherSpec>().unwrap_err();
            assert_eq!(err.kind(), "unsupported_parameter", "{bad}");
        }
        assert!("ZERO".parse::<PaddingScheme>().is_err());
    }

    #[test]
    fn mode_properties() {
        assert!(Mode::Gcm.supports_aad());
        assert!(Mode::Ccm.supports_aad());
        assert!(!Mode::Ctr.supports_aad());
        assert!(Mode::Cbc.is_padded_block_mode());
        assert!(!Mode::Cfb8.is_padded_block_mode());
        assert_eq!(Mode::Ecb.iv_len(), 0);
        assert_eq!(Mode::Cfb1.iv_len(), 16);
        assert_eq!(Mode::Gcm.iv_len(), 12);
    }

    #[test]
    fn direction_for_wrap() {
        assert_eq!(Direction::for_wrap(true), Direction::Encrypt);
        assert_eq!(Direction::for_wrap(false), Direction::Decrypt);
    }

    #[test]
    fn spec_serde_uses_string_form() {
        let spec = CipherSpec::new(KeySize::Aes128, Mode::Cbc, PaddingScheme::Pkcs7);
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, "\"AES128/CBC/PKCS7\"");
        let decoded: CipherSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, spec);
        assert!(serde_json::from_str::<CipherSpec>("\"AES-1-CBC\"").is_err());
    }
}
