use super::hooks::HookPoint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("capability {0} is already registered")]
    DuplicateCapability(String),

    #[error("capability {capability} declares event {event}, which is already registered")]
    DuplicateEvent { capability: String, event: String },

    #[error("editor is not initialized")]
    NotInitialized,

    #[error("{point} hook failed in capability {capability}: {reason}")]
    HookFailed {
        point: HookPoint,
        capability: String,
        reason: String,
    },

    #[error("timed out waiting for capability {0} to mount")]
    LookupTimeout(String),

    #[error("invalid hotkey combination: {0}")]
    InvalidHotkey(String),

    #[error("editor handle is detached")]
    Detached,

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
