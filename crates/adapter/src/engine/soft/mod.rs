//! In-process [`NativeEngine`] built on the RustCrypto AES primitives.
//!
//! Contexts live in a handle table. The table lock covers lookup, insert
//! and remove only; each context carries its own lock, held while it
//! transforms. A context removed mid-transform is freed when that transform
//! returns.
//!
//! Each context moves from `Created` to a configured transform on
//! `configure`, and back to `Created` after `finalize_transform`, mirroring
//! a native library where a finished context must be re-keyed before reuse.
//!
//! The counters exposed by [`SoftEngine::contexts_created`] and
//! [`SoftEngine::contexts_destroyed`] exist so callers can verify that every
//! context is released exactly once.

mod aead;
mod block;
mod padding;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use common::{CipherSpec, Direction, Mode, PaddingScheme};
use hex_literal::hex;
use tracing::trace;

use self::aead::AeadTransform;
use self::block::BlockTransform;
use super::{ContextHandle, EngineError, NativeEngine};

struct SoftContext {
    spec: CipherSpec,
    state: ContextState,
}

enum ContextState {
    Created,
    Block(BlockTransform),
    Aead(AeadTransform),
}

/// Software implementation of the native engine interface.
#[derive(Default)]
pub struct SoftEngine {
    contexts: Mutex<HashMap<ContextHandle, Arc<Mutex<SoftContext>>>>,
    next_handle: AtomicU64,
    created: AtomicU64,
    destroyed: AtomicU64,
}

impl SoftEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total contexts ever allocated by this engine.
    pub fn contexts_created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    /// Total contexts freed by this engine. Unknown-handle destroys are not counted.
    pub fn contexts_destroyed(&self) -> u64 {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Contexts currently allocated.
    pub fn live_contexts(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<ContextHandle, Arc<Mutex<SoftContext>>>> {
        // A panic while holding the lock cannot leave a context half-written
        // in a way that matters to other handles.
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_context<T>(
        &self,
        handle: ContextHandle,
        f: impl FnOnce(&mut SoftContext) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let entry = self
            .table()
            .get(&handle)
            .cloned()
            .ok_or(EngineError::UnknownContext(handle))?;
        let mut ctx = entry.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut ctx)
    }
}

impl std::fmt::Debug for SoftEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftEngine")
            .field("created", &self.contexts_created())
            .field("destroyed", &self.contexts_destroyed())
            .finish()
    }
}

fn not_configured(handle: ContextHandle) -> EngineError {
    EngineError::Failure(format!("{handle} is not configured"))
}

impl NativeEngine for SoftEngine {
    fn create_context(
        &self,
        cipher: &str,
        padding: PaddingScheme,
    ) -> Result<ContextHandle, EngineError> {
        let mut spec: CipherSpec = cipher
            .parse()
            .map_err(|_| EngineError::Failure(format!("unknown cipher: {cipher}")))?;
        spec.padding = padding;

        let handle = ContextHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.table().insert(
            handle,
            Arc::new(Mutex::new(SoftContext {
                spec,
                state: ContextState::Created,
            })),
        );
        self.created.fetch_add(1, Ordering::SeqCst);
        trace!(%handle, cipher, "context created");
        Ok(handle)
    }

    fn configure(
        &self,
        handle: ContextHandle,
        key: &[u8],
        iv: &[u8],
        direction: Direction,
        length_hint: Option<usize>,
    ) -> Result<(), EngineError> {
        self.with_context(handle, |ctx| {
            if key.len() != ctx.spec.key_size.bytes() {
                return Err(EngineError::Failure(format!(
                    "{} requires a {}-byte key, got {}",
                    ctx.spec.name(),
                    ctx.spec.key_size.bytes(),
                    key.len()
                )));
            }
            ctx.state = match ctx.spec.mode {
                Mode::Gcm | Mode::Ccm => ContextState::Aead(AeadTransform::new(
                    ctx.spec.mode,
                    key,
                    iv,
                    direction,
                    length_hint,
                )?),
                mode => ContextState::Block(BlockTransform::new(
                    mode,
                    ctx.spec.padding,
                    key,
                    iv,
                    direction,
                )?),
            };
            Ok(())
        })
    }

    fn absorb_aad(&self, handle: ContextHandle, aad: &[u8]) -> Result<(), EngineError> {
        self.with_context(handle, |ctx| match &mut ctx.state {
            ContextState::Aead(t) => t.absorb_aad(aad),
            ContextState::Block(_) => Err(EngineError::Failure(format!(
                "{} does not accept AAD",
                ctx.spec.name()
            ))),
            ContextState::Created => Err(not_configured(handle)),
        })
    }

    fn transform(&self, handle: ContextHandle, input: &[u8]) -> Result<Vec<u8>, EngineError> {
        self.with_context(handle, |ctx| match &mut ctx.state {
            ContextState::Block(t) => t.update(input),
            ContextState::Aead(t) => t.update(input),
            ContextState::Created => Err(not_configured(handle)),
        })
    }

    fn finalize_transform(
        &self,
        handle: ContextHandle,
        input: &[u8],
    ) -> Result<Vec<u8>, EngineError> {
        self.with_context(handle, |ctx| {
            let result = match &mut ctx.state {
                ContextState::Block(t) => t.finalize(input),
                ContextState::Aead(t) => t.finalize(input),
                ContextState::Created => return Err(not_configured(handle)),
            };
            ctx.state = ContextState::Created;
            result
        })
    }

    fn destroy_context(&self, handle: ContextHandle) {
        if self.table().remove(&handle).is_some() {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            trace!(%handle, "context destroyed");
        }
    }
}

/// FIPS-197 Appendix C.1 known-answer test, run through the public interface.
pub(super) fn self_test() -> Result<(), String> {
    const KEY: [u8; 16] = hex!("000102030405060708090a0b0c0d0e0f");
    const PLAIN: [u8; 16] = hex!("00112233445566778899aabbccddeeff");
    const CIPHER: [u8; 16] = hex!("69c4e0d86a7b0430d8cdb78070b4c55a");

    let engine = SoftEngine::new();
    let handle = engine
        .create_context("AES-128-ECB", PaddingScheme::None)
        .map_err(|e| e.to_string())?;
    let outcome = engine
        .configure(handle, &KEY, &[], Direction::Encrypt, None)
        .and_then(|()| engine.finalize_transform(handle, &PLAIN));
    engine.destroy_context(handle);

    match outcome {
        Ok(out) if out == CIPHER => Ok(()),
        Ok(_) => Err("AES-128 known-answer mismatch".into()),
        Err(e) => Err(e.to_string()),
    }
}
