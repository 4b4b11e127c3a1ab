use thiserror::Error;

/// Errors from repository operations (used by trait definitions in workdesk-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors raised by the ephemeral session store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionStoreError {
    /// The session id is already present.
    #[error("session already exists")]
    AlreadyExists,

    /// A live session already holds the work order's index entry.
    #[error("work order {0} already has an active session")]
    WorkOrderInSession(i64),

    /// Absent or expired.
    #[error("session not found")]
    NotFound,

    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Rejections produced by the session guard.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("work order {0} already has an active chat session")]
    Conflict(i64),

    #[error("{0}")]
    Unauthorized(String),

    /// Session absent or expired; the client must start a new chat.
    #[error("chat session not found or has expired")]
    Expired,

    #[error("work order {0} not found")]
    WorkOrderNotFound(i64),

    #[error("you do not have access to work order {0}")]
    Forbidden(i64),

    #[error("session storage failure: {0}")]
    Storage(String),
}

impl From<SessionStoreError> for SessionError {
    fn from(e: SessionStoreError) -> Self {
        match e {
            SessionStoreError::NotFound => SessionError::Expired,
            SessionStoreError::WorkOrderInSession(id) => SessionError::Conflict(id),
            other => SessionError::Storage(other.to_string()),
        }
    }
}

/// Errors from the blob store.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found")]
    NotFound,

    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    #[error("signed link is invalid")]
    InvalidSignature,

    #[error("signed link has expired")]
    Expired,

    #[error("blob storage I/O error: {0}")]
    Io(String),
}

/// Errors from entity writes and reads (work orders, estimates, messages).
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(String),

    /// The operation was cancelled (timeout or disconnect) and rolled back.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<RepositoryError> for ResourceError {
    fn from(e: RepositoryError) -> Self {
        ResourceError::Storage(e.to_string())
    }
}

impl From<BlobError> for ResourceError {
    fn from(e: BlobError) -> Self {
        ResourceError::Storage(e.to_string())
    }
}

/// Errors from chat operations: either a guard rejection or a failed write/read.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_store_not_found_maps_to_expired() {
        let err: SessionError = SessionStoreError::NotFound.into();
        assert!(matches!(err, SessionError::Expired));
    }

    #[test]
    fn test_store_index_conflict_maps_to_conflict() {
        let err: SessionError = SessionStoreError::WorkOrderInSession(5).into();
        assert!(matches!(err, SessionError::Conflict(5)));
    }

    #[test]
    fn test_blob_error_becomes_storage_failure() {
        let err: ResourceError = BlobError::Io("disk full".to_string()).into();
        assert!(matches!(err, ResourceError::Storage(ref m) if m.contains("disk full")));
    }
}
