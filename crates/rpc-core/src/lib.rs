//! Function registry and request dispatch for rpcd.
//!
//! This crate provides:
//! - Dotted-name registry built once at startup
//! - Dispatcher with inline and deferred invocation
//! - Deferred-handle table with cancellation and expiry
//! - Token policies

mod auth;
mod callable;
mod deferred;
mod dispatcher;
mod error;
mod registry;

pub use auth::{StaticTokens, TokenPolicy};
pub use callable::{callable, sync_callable, Args, CallFuture, Callable};
pub use deferred::{CancelOutcome, HandleTable, CANCELLED_DETAILS};
pub use dispatcher::{
    DispatchOptions, Dispatcher, DEFAULT_MAX_CONCURRENT_DEFERRED, TIMEOUT_DETAILS,
};
pub use error::{RpcError, RpcResult};
pub use registry::{Namespace, Registry, RegistryBuilder};
pub use rpc_protocol_types::{
    DeferredTicket, HandleSnapshot, HandleState, Request, RequestHeaders, Response, Status,
};
