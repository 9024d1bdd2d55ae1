//! Error types for the pocket engine.

use thiserror::Error;

/// Errors raised by a [`crate::storage::StorageAdapter`] implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("tag not found: {0}")]
    TagNotFound(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// All possible errors from the data engine, sync engine, and version gate.
///
/// Item/tag-not-found conditions surface through [`StorageError`] (see
/// `Storage` below) rather than duplicate variants here, since the Storage
/// Adapter is the only layer that knows whether a row exists.
#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(
        "version mismatch: server speaks datastore v{server_datastore}/protocol v{server_protocol}, \
this client expects datastore v{client_datastore}/protocol v{client_protocol} — please update"
    )]
    VersionMismatch {
        client_datastore: u32,
        client_protocol: u32,
        server_datastore: u32,
        server_protocol: u32,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::VersionMismatch {
            client_datastore: 1,
            client_protocol: 1,
            server_datastore: 2,
            server_protocol: 1,
        };
        assert!(err.to_string().contains("please update"));

        let err = Error::ServerError {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.to_string(), "server error 500: boom");
    }

    #[test]
    fn storage_error_wraps_into_engine_error() {
        let storage_err = StorageError::ItemNotFound("x".into());
        let err: Error = storage_err.into();
        assert!(matches!(err, Error::Storage(StorageError::ItemNotFound(_))));
    }
}
