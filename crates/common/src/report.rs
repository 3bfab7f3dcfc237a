//! Summary emitted by the command-line front end after a run.
//!
//! Serialised as a single JSON object on stdout so that wrapper scripts can
//! consume it without parsing log output.

use serde::{Deserialize, Serialize};

use crate::algorithm::{CipherSpec, Direction};

/// Outcome of streaming one input through a cipher session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReport {
    /// Cipher used, in transformation form (e.g. `AES256/GCM/NONE`).
    pub cipher: CipherSpec,
    /// Whether the run encrypted or decrypted.
    pub direction: Direction,
    /// Total bytes fed into the session.
    pub input_bytes: u64,
    /// Total bytes produced by the session.
    pub output_bytes: u64,
    /// Number of `update` calls issued before `finalize`.
    pub updates: u64,
}

/// Error summary emitted when a run fails after the session was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Stable error code, see [`crate::CipherError::kind`].
    pub code: String,
    /// Human-readable description. Never contains key or data bytes.
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::CipherError> for ErrorReport {
    fn from(err: &crate::CipherError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{KeySize, Mode, PaddingScheme};
    use crate::CipherError;

    #[test]
    fn operation_report_round_trip() {
        let report = OperationReport {
            cipher: CipherSpec::new(KeySize::Aes256, Mode::Gcm, PaddingScheme::None),
            direction: Direction::Encrypt,
            input_bytes: 20,
            output_bytes: 36,
            updates: 1,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"AES256/GCM/NONE\""));
        assert!(json.contains("\"encrypt\""));
        let decoded: OperationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.output_bytes, 36);
    }

    #[test]
    fn error_report_from_cipher_error() {
        let err = CipherError::AuthenticationFailure("tag mismatch".into());
        let report = ErrorReport::from(&err);
        assert_eq!(report.code, "authentication_failure");
        assert!(report.message.contains("tag mismatch"));
    }
}
