//! [`Reclaimer`]: exactly-once release of a native context.
//!
//! A reclaimer is created "armed" around a freshly allocated
//! [`ContextHandle`]. Release is a single atomic swap of the armed flag, so
//! the explicit path ([`Reclaimer::release`]) and the automatic path
//! (`Drop`) can both run, in any order and from any thread, and the engine's
//! `destroy_context` is still called at most once.
//!
//! Sessions always release explicitly. The `Drop` path is a leak detector:
//! when it is the one that actually frees the context, it logs a warning.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::{ContextHandle, NativeEngine};

/// Owns one native context and frees it exactly once.
pub struct Reclaimer {
    engine: Arc<dyn NativeEngine>,
    handle: ContextHandle,
    armed: AtomicBool,
}

impl Reclaimer {
    /// Take ownership of `handle`, which must have been allocated by `engine`.
    pub fn new(engine: Arc<dyn NativeEngine>, handle: ContextHandle) -> Self {
        Self {
            engine,
            handle,
            armed: AtomicBool::new(true),
        }
    }

    pub fn handle(&self) -> ContextHandle {
        self.handle
    }

    /// Returns `true` until the context has been released.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Free the context. Returns `true` only for the call that actually freed it.
    pub fn release(&self) -> bool {
        if self.armed.swap(false, Ordering::AcqRel) {
            self.engine.destroy_context(self.handle);
            debug!(handle = %self.handle, "native context released");
            true
        } else {
            false
        }
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        if self.release() {
            warn!(
                handle = %self.handle,
                "native context reclaimed without an explicit close"
            );
        }
    }
}

impl fmt::Debug for Reclaimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reclaimer")
            .field("handle", &self.handle)
            .field("armed", &self.is_armed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockNativeEngine, SoftEngine};
    use common::PaddingScheme;

    #[test]
    fn explicit_then_automatic_frees_once() {
        let engine = Arc::new(SoftEngine::new());
        let handle = engine.create_context("AES-128-CBC", PaddingScheme::Pkcs7).unwrap();
        let reclaimer = Reclaimer::new(engine.clone(), handle);

        assert!(reclaimer.release());
        assert!(!reclaimer.release());
        assert!(!reclaimer.is_armed());
        drop(reclaimer);

        assert_eq!(engine.contexts_destroyed(), 1);
        assert_eq!(engine.live_contexts(), 0);
    }

    #[test]
    fn drop_alone_frees() {
        let engine = Arc::new(SoftEngine::new());
        let handle = engine.create_context("AES-256-GCM", PaddingScheme::None).unwrap();
        drop(Reclaimer::new(engine.clone(), handle));
        assert_eq!(engine.contexts_destroyed(), 1);
    }

    #[test]
    fn concurrent_release_frees_once() {
        let mut mock = MockNativeEngine::new();
        mock.expect_destroy_context()
            .withf(|h| h.raw() == 5)
            .times(1)
            .return_const(());

        let reclaimer = Arc::new(Reclaimer::new(Arc::new(mock), ContextHandle::new(5)));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&reclaimer);
                std::thread::spawn(move || r.release())
            })
            .collect();
        let winners = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|freed| *freed)
            .count();

        assert_eq!(winners, 1);
        // The final drop must not free again; the mock panics on a second call.
        drop(reclaimer);
    }
}
