//! Common error types shared across crates.

use thiserror::Error;

/// Top-level error type for every cipher-session operation.
///
/// Variants map to the stable codes returned by [`CipherError::kind`]:
/// - [`CipherError::InvalidState`] → `invalid_state`
/// - [`CipherError::UnsupportedParameter`] → `unsupported_parameter`
/// - [`CipherError::UnsupportedOperation`] → `unsupported_operation`
/// - [`CipherError::InvalidKey`] → `invalid_key`
/// - [`CipherError::BadPadding`] → `bad_padding`
/// - [`CipherError::AuthenticationFailure`] → `authentication_failure`
/// - [`CipherError::IllegalBlockSize`] → `illegal_block_size`
/// - [`CipherError::EngineFailure`] → `engine_failure`
/// - [`CipherError::ShortBuffer`] → `short_buffer`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// A call was issued outside the allowed phase order (e.g. AAD after data).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The parameter object (or a value inside it) is not supported.
    #[error("unsupported parameter: {0}")]
    UnsupportedParameter(String),

    /// The operation is not available for this cipher or key type.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Key material is missing, unencodable, or rejected by its algorithm.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Padding check failed while decrypting.
    #[error("bad padding: {0}")]
    BadPadding(String),

    /// Authentication tag verification failed while decrypting.
    #[error("authentication failure: {0}")]
    AuthenticationFailure(String),

    /// Input length is not valid for the mode (misaligned block data, or
    /// ciphertext shorter than the tag).
    #[error("illegal block size: {0}")]
    IllegalBlockSize(String),

    /// Opaque failure reported by the native engine. Never retried.
    #[error("engine failure: {0}")]
    EngineFailure(String),

    /// The caller-supplied output buffer cannot hold the worst-case output.
    #[error("output buffer too short: need {needed} bytes, have {available}")]
    ShortBuffer { needed: usize, available: usize },
}

impl CipherError {
    /// Stable snake_case code for structured logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            CipherError::InvalidState(_) => "invalid_state",
            CipherError::UnsupportedParameter(_) => "unsupported_parameter",
            CipherError::UnsupportedOperation(_) => "unsupported_operation",
            CipherError::InvalidKey(_) => "invalid_key",
            CipherError::BadPadding(_) => "bad_padding",
            CipherError::AuthenticationFailure(_) => "authentication_failure",
            CipherError::IllegalBlockSize(_) => "illegal_block_size",
            CipherError::EngineFailure(_) => "engine_failure",
            CipherError::ShortBuffer { .. } => "short_buffer",
        }
    }

    /// Returns `true` for decrypt-side padding or tag check failures.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            CipherError::BadPadding(_) | CipherError::AuthenticationFailure(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(CipherError::InvalidState("x".into()).kind(), "invalid_state");
        assert_eq!(
            CipherError::UnsupportedOperation("x".into()).kind(),
            "unsupported_operation"
        );
        assert_eq!(CipherError::BadPadding("x".into()).kind(), "bad_padding");
        assert_eq!(
            CipherError::IllegalBlockSize("x".into()).kind(),
            "illegal_block_size"
        );
        assert_eq!(
            CipherError::ShortBuffer {
                needed: 32,
                available: 16
            }
            .kind(),
            "short_buffer"
        );
    }

    #[test]
    fn integrity_failures() {
        assert!(CipherError::BadPadding("x".into()).is_integrity_failure());
        assert!(CipherError::AuthenticationFailure("x".into()).is_integrity_failure());
        assert!(!CipherError::EngineFailure("x".into()).is_integrity_failure());
        assert!(!CipherError::IllegalBlockSize("x".into()).is_integrity_failure());
    }

    #[test]
    fn display_includes_message() {
        let e = CipherError::InvalidState("AAD after data".into());
        assert!(e.to_string().contains("AAD after data"));
        let e = CipherError::ShortBuffer {
            needed: 48,
            available: 16,
        };
        assert!(e.to_string().contains("48"));
    }
}
