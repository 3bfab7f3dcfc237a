//! Structured logging setup for the command-line front end.
//!
//! # Telemetry invariants
//!
//! - **No key material** (key, IV, AAD or data bytes) may appear in any log
//!   field. Sessions log their id, cipher and phase only.
//! - Log level is configurable via `CIPHER_ADAPTER_LOG_LEVEL` (default:
//!   `info`) and overridden by `RUST_LOG` when set.
//! - Logs go to stderr so stdout carries only the JSON run report.

pub mod init;

pub use init::init_telemetry;
