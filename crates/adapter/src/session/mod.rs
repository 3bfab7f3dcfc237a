//! [`CipherSession`]: the cipher engine adapter.
//!
//! A session validates call order through an explicit [`Phase`] tag,
//! computes output sizes, and drives a [`NativeEngine`] through one native
//! context that it owns exclusively.
//!
//! # Context ownership
//!
//! The native context lives in a [`ContextSlot`]:
//!
//! - `Empty`: nothing allocated (before `initialize`, after `close`).
//! - `Provisional`: CCM only. The engine cannot be configured until the
//!   message length is known, so AAD is buffered here and the context is
//!   created on the first `update`/`finalize`, with that call's input length
//!   as the length hint.
//! - `Live`: a configured context guarded by a [`Reclaimer`].
//!
//! Every path that replaces a live context (`initialize`, `close`) releases
//! it explicitly. Dropping a session without `close` still frees the context
//! through the reclaimer, which logs a leak warning.
//!
//! # Fail fast
//!
//! Phase, parameter, key and buffer checks all run before any engine call.
//! Engine errors are propagated verbatim.

mod params;
mod phase;
mod sizing;

use std::fmt;
use std::sync::Arc;

use common::{CipherError, CipherSpec, Direction, Mode, AEAD_TAG_LEN, BLOCK_SIZE};
use tracing::{debug, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::engine::{ContextHandle, EngineError, NativeEngine};
use crate::key::{EncodableKey, KeyKind, SecretKey};
use crate::reclaim::Reclaimer;

pub use params::ParameterSpec;
pub use phase::{Event, Phase};
pub use sizing::{output_bound, output_size};

/// AAD buffered for a CCM session whose context does not exist yet.
struct PendingCcm {
    aad: Zeroizing<Vec<u8>>,
}

enum ContextSlot {
    Empty,
    Provisional(PendingCcm),
    Live(Reclaimer),
}

impl ContextSlot {
    /// Release a live context, if any, and leave the slot empty.
    fn clear(&mut self) {
        if let ContextSlot::Live(reclaimer) = std::mem::replace(self, ContextSlot::Empty) {
            reclaimer.release();
        }
    }
}

/// One symmetric cipher operation driven against a native engine.
///
/// Not internally synchronised: callers serialise operations on a session.
pub struct CipherSession {
    engine: Arc<dyn NativeEngine>,
    id: Uuid,
    spec: Option<CipherSpec>,
    direction: Direction,
    key: Zeroizing<Vec<u8>>,
    iv: Vec<u8>,
    slot: ContextSlot,
    phase: Phase,
    accumulated_input: usize,
    accumulated_output: usize,
}

impl CipherSession {
    /// An uninitialised session bound to `engine`.
    pub fn new(engine: Arc<dyn NativeEngine>) -> Self {
        Self {
            engine,
            id: Uuid::new_v4(),
            spec: None,
            direction: Direction::default(),
            key: Zeroizing::new(Vec::new()),
            iv: Vec::new(),
            slot: ContextSlot::Empty,
            phase: Phase::Uninitialized,
            accumulated_input: 0,
            accumulated_output: 0,
        }
    }

    /// Create a session and initialise it in one step.
    pub fn start(
        engine: Arc<dyn NativeEngine>,
        direction: Direction,
        key: &[u8],
        params: &ParameterSpec,
        spec: CipherSpec,
    ) -> Result<Self, CipherError> {
        let mut session = Self::new(engine);
        session.initialize(direction, key, params, spec)?;
        Ok(session)
    }

    /// Begin a new operation, replacing any previous key, IV and cipher.
    ///
    /// Allowed from every phase. Any context held by an earlier operation
    /// is released first. For CCM no context is created here.
    ///
    /// # Errors
    ///
    /// - [`CipherError::InvalidKey`] if `key` does not match `spec.key_size`.
    /// - [`CipherError::UnsupportedParameter`] if `params` is not usable
    ///   with `spec.mode`.
    /// - [`CipherError::EngineFailure`] if the engine rejects the context.
    pub fn initialize(
        &mut self,
        direction: Direction,
        key: &[u8],
        params: &ParameterSpec,
        spec: CipherSpec,
    ) -> Result<(), CipherError> {
        if key.len() != spec.key_size.bytes() {
            return Err(CipherError::InvalidKey(format!(
                "{} requires a {}-byte key, got {}",
                spec.name(),
                spec.key_size.bytes(),
                key.len()
            )));
        }
        let iv = params.resolve_iv(spec.mode)?.to_vec();
        let next = self.phase.advance(Event::Initialize)?;

        self.slot.clear();
        self.spec = Some(spec);
        self.direction = direction;
        self.key = Zeroizing::new(key.to_vec());
        self.iv = iv;
        self.accumulated_input = 0;
        self.accumulated_output = 0;
        self.phase = Phase::Uninitialized;

        self.slot = if spec.mode == Mode::Ccm {
            ContextSlot::Provisional(PendingCcm {
                aad: Zeroizing::new(Vec::new()),
            })
        } else {
            match self.open_context(None) {
                Ok(reclaimer) => ContextSlot::Live(reclaimer),
                Err(e) => {
                    self.forget_operation();
                    return Err(e);
                }
            }
        };
        self.enter(next);
        Ok(())
    }

    /// Supply additional authenticated data. GCM and CCM only; may be
    /// called repeatedly until the first data call.
    ///
    /// # Errors
    ///
    /// - [`CipherError::UnsupportedOperation`] for non-AEAD modes, in any phase.
    /// - [`CipherError::InvalidState`] after data or outside an operation.
    pub fn update_aad(&mut self, aad: &[u8]) -> Result<(), CipherError> {
        let spec = self.require_spec()?;
        if !spec.mode.supports_aad() {
            return Err(CipherError::UnsupportedOperation(format!(
                "{} does not accept additional authenticated data",
                spec.name()
            )));
        }
        let next = self.phase.advance(Event::UpdateAad)?;

        let live = match &mut self.slot {
            ContextSlot::Provisional(pending) => {
                pending.aad.extend_from_slice(aad);
                None
            }
            ContextSlot::Live(reclaimer) => Some(reclaimer.handle()),
            ContextSlot::Empty => return Err(no_context()),
        };
        if let Some(handle) = live {
            self.engine
                .absorb_aad(handle, aad)
                .map_err(|e| self.engine_failure("absorb_aad", e))?;
        }
        self.enter(next);
        Ok(())
    }

    /// Transform a chunk, returning whatever output is ready (possibly none).
    ///
    /// An empty chunk is not a data-bearing call: it leaves the phase, the
    /// AAD window and any pending CCM length untouched.
    pub fn update(&mut self, input: &[u8]) -> Result<Vec<u8>, CipherError> {
        let next = self.phase.advance(Event::Update)?;
        if input.is_empty() {
            return Ok(Vec::new());
        }
        let handle = self.ensure_live(input.len())?;

        let output = self
            .engine
            .transform(handle, input)
            .map_err(|e| self.engine_failure("transform", e))?;
        self.accumulated_input += input.len();
        self.accumulated_output += output.len();
        self.enter(next);
        Ok(output)
    }

    /// Transform trailing input and complete the operation.
    ///
    /// On encrypt this applies padding or produces the tag; on decrypt it
    /// removes padding or verifies the tag. The session is `FINALIZED`
    /// afterwards even if the engine reported a failure, since the
    /// operation cannot be resumed.
    ///
    /// # Errors
    ///
    /// [`CipherError::BadPadding`] and [`CipherError::AuthenticationFailure`]
    /// on integrity failures, [`CipherError::EngineFailure`] otherwise.
    pub fn finalize(&mut self, input: &[u8]) -> Result<Vec<u8>, CipherError> {
        let next = self.phase.advance(Event::Finalize)?;
        let handle = self.ensure_live(input.len())?;

        let result = self.engine.finalize_transform(handle, input);
        self.accumulated_input += input.len();
        self.enter(next);

        let output = result.map_err(|e| self.engine_failure("finalize_transform", e))?;
        self.accumulated_output += output.len();
        Ok(output)
    }

    /// [`update`](Self::update) into a caller buffer; returns bytes written.
    ///
    /// # Errors
    ///
    /// [`CipherError::ShortBuffer`] if `output` is smaller than
    /// [`output_bound`], checked before the engine is called.
    pub fn update_into(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CipherError> {
        self.phase.advance(Event::Update)?;
        if input.is_empty() {
            return Ok(0);
        }
        self.check_capacity(input.len(), output.len())?;
        let produced = self.update(input)?;
        copy_out(&produced, output)
    }

    /// [`finalize`](Self::finalize) into a caller buffer; returns bytes written.
    pub fn finalize_into(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, CipherError> {
        self.phase.advance(Event::Finalize)?;
        self.check_capacity(input.len(), output.len())?;
        let produced = self.finalize(input)?;
        copy_out(&produced, output)
    }

    /// Encrypt the raw encoding of `key`. The session must be initialised
    /// for encryption.
    ///
    /// # Errors
    ///
    /// [`CipherError::InvalidKey`] if the key has no encoding or the engine
    /// rejects it.
    pub fn wrap(&mut self, key: &dyn EncodableKey) -> Result<Vec<u8>, CipherError> {
        self.require_direction(Direction::Encrypt, "wrap")?;
        let encoded = key
            .encoded()
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| {
                CipherError::InvalidKey(format!(
                    "{} key has no encodable representation",
                    key.algorithm()
                ))
            })?;
        self.finalize(encoded).map_err(rejected_as_invalid_key)
    }

    /// Decrypt `wrapped` and rebuild it as a secret key for `algorithm`.
    ///
    /// # Errors
    ///
    /// - [`CipherError::UnsupportedOperation`] for public or private keys.
    /// - [`CipherError::InvalidKey`] on padding, tag or block-length failure,
    ///   or if the recovered bytes are not valid for `algorithm`.
    pub fn unwrap(
        &mut self,
        wrapped: &[u8],
        algorithm: &str,
        kind: KeyKind,
    ) -> Result<SecretKey, CipherError> {
        if kind.is_asymmetric() {
            return Err(CipherError::UnsupportedOperation(format!(
                "unwrapping {kind:?} keys is not supported"
            )));
        }
        self.require_direction(Direction::Decrypt, "unwrap")?;
        let material = self.finalize(wrapped).map_err(rejected_as_invalid_key)?;
        SecretKey::new(algorithm, material)
    }

    /// Output size estimate for `input_len` more bytes; see [`output_size`].
    pub fn compute_output_size(&self, input_len: usize) -> Result<usize, CipherError> {
        Ok(output_size(&self.require_spec()?, input_len))
    }

    pub fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    /// The IV in use, or `None` before `initialize` and for ECB.
    pub fn current_iv(&self) -> Option<&[u8]> {
        if self.spec.is_none() || self.iv.is_empty() {
            None
        } else {
            Some(&self.iv)
        }
    }

    /// Tag length appended by AEAD encryption; 0 for other modes.
    pub fn tag_len(&self) -> usize {
        match self.spec {
            Some(spec) if spec.mode.supports_aad() => AEAD_TAG_LEN,
            _ => 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn spec(&self) -> Option<CipherSpec> {
        self.spec
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn accumulated_input(&self) -> usize {
        self.accumulated_input
    }

    pub fn accumulated_output(&self) -> usize {
        self.accumulated_output
    }

    /// Release the native context and zero the key. Idempotent.
    pub fn close(&mut self) {
        self.slot.clear();
        let had_operation = self.phase != Phase::Uninitialized || self.spec.is_some();
        self.forget_operation();
        if had_operation {
            self.enter(Phase::Uninitialized);
            debug!(session = %self.id, "session closed");
        }
    }

    fn forget_operation(&mut self) {
        self.spec = None;
        self.iv.clear();
        self.key = Zeroizing::new(Vec::new());
    }

    fn require_spec(&self) -> Result<CipherSpec, CipherError> {
        self.spec
            .ok_or_else(|| CipherError::InvalidState("session has not been initialized".into()))
    }

    fn require_direction(&self, wanted: Direction, op: &str) -> Result<(), CipherError> {
        self.require_spec()?;
        if self.direction != wanted {
            return Err(CipherError::InvalidState(format!(
                "{op} requires a session initialized to {wanted}, not {}",
                self.direction
            )));
        }
        Ok(())
    }

    fn check_capacity(&self, input_len: usize, available: usize) -> Result<(), CipherError> {
        let spec = self.require_spec()?;
        let pending = self.accumulated_input.saturating_sub(self.accumulated_output);
        let needed = output_bound(&spec, self.direction, pending, input_len);
        if available < needed {
            return Err(CipherError::ShortBuffer { needed, available });
        }
        Ok(())
    }

    /// Create and configure a context for the current key and IV.
    fn open_context(&self, length_hint: Option<usize>) -> Result<Reclaimer, CipherError> {
        let spec = self.require_spec()?;
        let handle = self
            .engine
            .create_context(&spec.name(), spec.padding)
            .map_err(|e| self.engine_failure("create_context", e))?;
        let reclaimer = Reclaimer::new(Arc::clone(&self.engine), handle);

        if let Err(e) =
            self.engine
                .configure(handle, &self.key, &self.iv, self.direction, length_hint)
        {
            reclaimer.release();
            return Err(self.engine_failure("configure", e));
        }
        Ok(reclaimer)
    }

    /// The live context handle, completing a provisional CCM session first.
    fn ensure_live(&mut self, length_hint: usize) -> Result<ContextHandle, CipherError> {
        let pending = match &self.slot {
            ContextSlot::Live(reclaimer) => return Ok(reclaimer.handle()),
            ContextSlot::Provisional(pending) => pending,
            ContextSlot::Empty => return Err(no_context()),
        };

        let reclaimer = self.open_context(Some(length_hint))?;
        if !pending.aad.is_empty() {
            if let Err(e) = self.engine.absorb_aad(reclaimer.handle(), &pending.aad) {
                reclaimer.release();
                return Err(self.engine_failure("absorb_aad", e));
            }
        }
        let handle = reclaimer.handle();
        debug!(session = %self.id, %handle, length_hint, "deferred CCM context configured");
        self.slot = ContextSlot::Live(reclaimer);
        Ok(handle)
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        debug!(
            session = %self.id,
            cipher = %self.cipher_label(),
            phase = %phase,
            "phase transition"
        );
    }

    fn engine_failure(&self, op: &'static str, err: EngineError) -> CipherError {
        let err = CipherError::from(err);
        warn!(
            session = %self.id,
            cipher = %self.cipher_label(),
            op,
            error = err.kind(),
            "engine call failed"
        );
        err
    }

    fn cipher_label(&self) -> String {
        self.spec
            .map(|spec| spec.to_string())
            .unwrap_or_else(|| "-".into())
    }
}

impl fmt::Debug for CipherSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSession")
            .field("id", &self.id)
            .field("spec", &self.spec)
            .field("direction", &self.direction)
            .field("phase", &self.phase)
            .field("key", &"[REDACTED]")
            .field("accumulated_input", &self.accumulated_input)
            .field("accumulated_output", &self.accumulated_output)
            .finish()
    }
}

fn no_context() -> CipherError {
    CipherError::InvalidState("session holds no native context".into())
}

fn copy_out(produced: &[u8], output: &mut [u8]) -> Result<usize, CipherError> {
    let available = output.len();
    let target = output
        .get_mut(..produced.len())
        .ok_or(CipherError::ShortBuffer {
            needed: produced.len(),
            available,
        })?;
    target.copy_from_slice(produced);
    Ok(produced.len())
}

/// Padding, tag and block-length failures while wrapping or unwrapping
/// mean the key blob itself is unusable.
fn rejected_as_invalid_key(err: CipherError) -> CipherError {
    if err.is_integrity_failure() || matches!(err, CipherError::IllegalBlockSize(_)) {
        CipherError::InvalidKey(format!("wrapped key rejected: {err}"))
    } else {
        err
    }
}
