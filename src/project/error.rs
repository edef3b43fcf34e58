use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "Syntax error in .bazelproject: the number of section headers doesn't match the number of section bodies ({headers} != {bodies}; headers: {})",
        .names.join(",")
    )]
    Syntax {
        headers: usize,
        bodies: usize,
        names: Vec<String>,
    },

    #[error("Failed to serialize workspace descriptor: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Path does not exist: {path}")]
    PathNotFound { path: String },

    #[error("Failed to watch {path}: {reason}")]
    Watch { path: String, reason: String },
}
