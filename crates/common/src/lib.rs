//! Algorithm identifiers, errors, and report types shared across `cipher-adapter` crates.

pub mod algorithm;
pub mod error;
pub mod report;

pub use algorithm::{CipherSpec, Direction, KeySize, Mode, PaddingScheme, AEAD_TAG_LEN, BLOCK_SIZE};
pub use error::CipherError;
pub use report::{ErrorReport, OperationReport};
