//! IPC transport for the rpcd dispatcher.
//!
//! This crate provides:
//! - Unix domain socket server
//! - NDJSON request/response framing
//! - Built-in functions for deferred handles

mod error;
mod server;

pub use error::{IpcError, IpcResult};
pub use rpc_protocol_types::{HandleSnapshot, Request, Response, Status};
pub use server::{
    respond, RpcClient, RpcServer, HANDLE_CANCEL, HANDLE_POLL, HANDLE_WAIT, LIST_FUNCTIONS,
    RESERVED_PREFIX,
};
