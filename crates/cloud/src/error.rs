/// Errors from storage targets.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid storage config: {0}")]
    InvalidConfig(String),

    #[error("Invalid artifact path '{0}'")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The object store rejected or failed the request.
    #[error("Object storage error: {0}")]
    Remote(String),
}

impl StorageError {
    /// Whether retrying the same request can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ),
            Self::Remote(_) => true,
            Self::NotFound(_) | Self::InvalidConfig(_) | Self::InvalidPath(_) => false,
        }
    }
}
