//! Error taxonomy for the patchbay core.
//!
//! Nothing in here is fatal to the process: invalid edits and unknown type
//! names fail the single call that produced them, persistence faults leave
//! the document untouched, and render faults are handled inside the graph
//! runtime without ever surfacing as an error value.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    /// Registry miss during module construction. Fatal only to the single
    /// `add_module` call that requested the type.
    #[error("module type not found: {0}")]
    UnknownModuleType(String),

    /// A connection edit that violates a document invariant. The document is
    /// left unchanged and no listener event fires.
    #[error("invalid connection: {0}")]
    InvalidConnection(&'static str),

    #[error("audio device error: {0}")]
    Device(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed patch file: {0}")]
    Malformed(#[from] serde_json::Error),
}
