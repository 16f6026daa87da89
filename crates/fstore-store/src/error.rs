use fstore_types::TypeError;

/// Errors from name index, blob store, and coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested name or digest is not present.
    #[error("not found: {0}")]
    NotFound(String),

    /// A file with this name already exists.
    #[error("already exists: {0}")]
    Conflict(String),

    /// The caller supplied an unusable request (empty name, nothing to store).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A persisted key or value could not be decoded.
    #[error("corrupt entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Failure reported by the storage engine.
    #[error("storage engine error: {0}")]
    Engine(#[from] sled::Error),

    /// I/O error outside the storage engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend failure that is neither an engine nor an I/O error.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Coarse classification of a [`StoreError`] for transport-level mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    Io,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Corrupt { .. } | Self::Engine(_) | Self::Io(_) | Self::Backend(_) => {
                ErrorKind::Io
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn corrupt(key: impl Into<String>, err: TypeError) -> Self {
        Self::Corrupt {
            key: key.into(),
            reason: err.to_string(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(StoreError::NotFound("a".into()).kind(), ErrorKind::NotFound);
        assert_eq!(StoreError::Conflict("a".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            StoreError::InvalidInput("a".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(StoreError::Backend("x".into()).kind(), ErrorKind::Io);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(StoreError::from(io).kind(), ErrorKind::Io);
    }

    #[test]
    fn corrupt_keeps_reason() {
        let err = StoreError::corrupt("names/a", TypeError::InvalidHex("q".into()));
        assert!(err.to_string().contains("names/a"));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
