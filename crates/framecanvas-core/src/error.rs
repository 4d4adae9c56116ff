//! Error types for engine operations.

use crate::objects::ObjectId;
use thiserror::Error;

/// Engine errors.
///
/// None of these are fatal: the host-facing [`Engine`](crate::Engine) methods
/// catch them at the handler boundary, log them and leave the scene as it was.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Malformed snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("Unknown object: {0}")]
    UnknownObject(ObjectId),
    #[error("Object is not a frame: {0}")]
    NotAFrame(ObjectId),
    #[error("Operation requires a single selected object")]
    MultiSelection,
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("Channel error: {0}")]
    Channel(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
