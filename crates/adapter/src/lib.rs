//! Symmetric cipher engine adapter.
//!
//! [`CipherSession`] is the state machine callers drive: `initialize`,
//! optional AAD, any number of `update` calls, then one `finalize`. It talks
//! to a [`NativeEngine`] through an opaque per-operation context that is
//! released exactly once by a [`Reclaimer`].
//!
//! Call [`engine::bootstrap`] once per process before creating sessions.

pub mod config;
pub mod engine;
pub mod key;
pub mod reclaim;
pub mod session;
pub mod telemetry;

pub use engine::{bootstrap, ContextHandle, EngineError, NativeEngine, SoftEngine};
pub use key::{EncodableKey, KeyKind, SecretKey};
pub use reclaim::Reclaimer;
pub use session::{CipherSession, ParameterSpec, Phase};
