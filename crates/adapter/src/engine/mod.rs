//! Boundary to the native transform engine.
//!
//! The session layer never touches cipher internals. It drives an engine
//! through the six calls of [`NativeEngine`], identifying each per-operation
//! context by an opaque [`ContextHandle`]. All calls are synchronous and
//! bounded; there is no cancellation.
//!
//! # Bootstrap
//!
//! [`bootstrap`] is the explicit, process-wide step that makes the engine
//! callable. The composition root (the binary's `main`) invokes it once; the
//! self-test it runs is cached for the lifetime of the process.

pub mod soft;

use std::fmt;
use std::sync::{Arc, OnceLock};

use common::{CipherError, Direction, PaddingScheme};
use thiserror::Error;
use tracing::{error, info};

pub use soft::SoftEngine;

/// Opaque identifier of one native cipher context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(u64);

impl ContextHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Errors reported by a native engine.
///
/// Integrity failures are kept distinguishable from opaque failures so the
/// session layer can surface them verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Tag verification failed while opening an AEAD message.
    #[error("authentication tag mismatch")]
    AuthenticationFailure,

    /// The final block did not carry valid padding.
    #[error("bad padding in final block")]
    BadPadding,

    /// Input length is not valid for the mode: misaligned block data, or
    /// ciphertext shorter than the tag.
    #[error("illegal block size: {0}")]
    IllegalBlockSize(String),

    /// The handle does not name a live context.
    #[error("unknown context handle {0}")]
    UnknownContext(ContextHandle),

    /// Any other engine-side failure.
    #[error("{0}")]
    Failure(String),
}

impl From<EngineError> for CipherError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::AuthenticationFailure => CipherError::AuthenticationFailure(err.to_string()),
            EngineError::BadPadding => CipherError::BadPadding(err.to_string()),
            EngineError::IllegalBlockSize(msg) => CipherError::IllegalBlockSize(msg),
            EngineError::UnknownContext(_) | EngineError::Failure(_) => {
                CipherError::EngineFailure(err.to_string())
            }
        }
    }
}

/// The operations a session consumes from a native crypto engine.
///
/// Implementations must be safe to share between threads; a single context,
/// however, is only ever driven by one session at a time.
#[cfg_attr(test, mockall::automock)]
pub trait NativeEngine: Send + Sync {
    /// Allocate a context for `cipher` (e.g. `AES-128-CBC`) with `padding`.
    fn create_context(
        &self,
        cipher: &str,
        padding: PaddingScheme,
    ) -> Result<ContextHandle, EngineError>;

    /// Install key and IV. `length_hint` carries the total message length
    /// for constructions that need it up front (CCM).
    fn configure(
        &self,
        handle: ContextHandle,
        key: &[u8],
        iv: &[u8],
        direction: Direction,
        length_hint: Option<usize>,
    ) -> Result<(), EngineError>;

    /// Absorb additional authenticated data. Must precede any transform.
    fn absorb_aad(&self, handle: ContextHandle, aad: &[u8]) -> Result<(), EngineError>;

    /// Transform a chunk, returning whatever output is ready.
    fn transform(&self, handle: ContextHandle, input: &[u8]) -> Result<Vec<u8>, EngineError>;

    /// Transform trailing input and complete the operation (padding, tags).
    fn finalize_transform(
        &self,
        handle: ContextHandle,
        input: &[u8],
    ) -> Result<Vec<u8>, EngineError>;

    /// Free the context. Unknown handles are ignored.
    fn destroy_context(&self, handle: ContextHandle);
}

static SELF_TEST: OnceLock<Result<(), String>> = OnceLock::new();

/// Make the software engine callable.
///
/// Runs the known-answer self-test on first use in this process and caches
/// its outcome; later calls only hand out a fresh engine.
///
/// # Errors
///
/// Returns [`CipherError::EngineFailure`] if the self-test failed.
pub fn bootstrap() -> Result<Arc<SoftEngine>, CipherError> {
    let outcome = SELF_TEST.get_or_init(|| {
        let result = soft::self_test();
        match &result {
            Ok(()) => info!("native engine self-test passed"),
            Err(e) => error!(error = %e, "native engine self-test failed"),
        }
        result
    });
    outcome.clone().map_err(CipherError::EngineFailure)?;
    Ok(Arc::new(SoftEngine::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_verbatim() {
        assert!(matches!(
            CipherError::from(EngineError::AuthenticationFailure),
            CipherError::AuthenticationFailure(_)
        ));
        assert!(matches!(
            CipherError::from(EngineError::BadPadding),
            CipherError::BadPadding(_)
        ));
        assert_eq!(
            CipherError::from(EngineError::IllegalBlockSize("short".into())),
            CipherError::IllegalBlockSize("short".into())
        );
        let err = CipherError::from(EngineError::UnknownContext(ContextHandle::new(7)));
        assert_eq!(err.kind(), "engine_failure");
        assert!(err.to_string().contains("ctx#7"));
        let err = CipherError::from(EngineError::Failure("boom".into()));
        assert_eq!(err, CipherError::EngineFailure("boom".into()));
    }

    #[test]
    fn bootstrap_is_repeatable() {
        let first = bootstrap().unwrap();
        let second = bootstrap().unwrap();
        assert_eq!(first.live_contexts(), 0);
        assert_eq!(second.live_contexts(), 0);
    }
}
