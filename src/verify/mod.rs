//! Output Verification Module
//!
//! - [`manifest`]: The persisted list of declared outputs
//! - [`verifier`]: Collection, submission and the verification pass

pub mod manifest;
pub mod verifier;

pub use manifest::{Manifest, ManifestRow, MANIFEST_FILE};
pub use verifier::{verify, Outcome, TerminalVerifier, FAILURE_MARKER, SUCCESS_MARKER};
