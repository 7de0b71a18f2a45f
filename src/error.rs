use thiserror::Error;

/// Problems with an explosion config document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config document must be a JSON object")]
    NotAnObject,
    #[error("config document has no \"objects\" map")]
    MissingObjects,
    #[error("entry {name:?}: {field} {reason}")]
    InvalidEntry {
        name: String,
        field: &'static str,
        reason: &'static str,
    },
}

/// Reasons an edited pose could not be written back into the config.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SyncError {
    #[error("scene is not loaded")]
    SceneNotLoaded,
    #[error("node is not part of the scene")]
    UnknownNode,
    #[error("node has no explosion entry")]
    NotAnimated,
    #[error("layer distance must be positive, got {0}")]
    InvalidLayerDistance(f32),
    #[error("local progress is zero, the edit cannot be reconstructed")]
    NoProgress,
}
