//! Bridge error types

use crate::bridge::NativeHandle;
use crate::runtime::{ObjectId, RuntimeError};

/// Errors surfaced by bridge operations
///
/// Contract violations (attaching twice, asking an unattached object for its
/// self-reference, using a finalized object) are bugs in the calling code and
/// panic instead of appearing here.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("runtime object {0} has no native object attached")]
    NotAttached(ObjectId),

    #[error("runtime object {0} is already attached to a native object")]
    AlreadyAttached(ObjectId),

    #[error("{0} does not resolve to a live native object")]
    StaleHandle(NativeHandle),

    #[error("native object is not a `{expected}`")]
    TypeMismatch { expected: &'static str },

    #[error("runtime object {object} is a `{found}`, expected `{expected}`")]
    ClassMismatch {
        object: ObjectId,
        expected: &'static str,
        found: String,
    },

    #[error("native constructor failed: {0}")]
    Construct(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("a process-wide bridge is already installed")]
    AlreadyInstalled,
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
