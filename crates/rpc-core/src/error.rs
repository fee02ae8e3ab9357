//! Core error types.

use thiserror::Error;

/// Error type for registry and handle-table operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// No function registered under this dotted name
    #[error("Function not found: {0}")]
    NotFound(String),

    /// A second binding for an already registered name
    #[error("Function already registered: {0}")]
    DuplicateFunction(String),

    /// Empty segment, whitespace, or a dot inside a function's own name
    #[error("Invalid function name: {0}")]
    InvalidName(String),

    /// Deferred handle never issued, or already expired
    #[error("Unknown handle: {0}")]
    UnknownHandle(String),
}

/// Result type alias using RpcError.
pub type RpcResult<T> = Result<T, RpcError>;
