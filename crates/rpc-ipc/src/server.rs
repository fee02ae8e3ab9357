//! IPC server and client.
//!
//! Requests and responses travel as NDJSON over a Unix domain socket: one
//! [`Request`] per line in, one [`Response`] per line out, answered in order
//! per connection. Connections are served concurrently.
//!
//! ## Built-in functions
//!
//! Names under `rpc.` are answered by the adapter itself, after the same
//! token check the dispatcher applies:
//!
//! - `rpc.functions` lists the registered names
//! - `rpc.handle.poll` returns a [`HandleSnapshot`] for the named argument `handle`
//! - `rpc.handle.wait` blocks until `handle` finishes and returns its response
//! - `rpc.handle.cancel` cancels `handle` and reports the outcome

use crate::{IpcError, IpcResult};
use rpc_core::{Dispatcher, RpcError};
use rpc_protocol_types::{HandleSnapshot, Request, Response, Status};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Prefix reserved for functions implemented by the adapter.
pub const RESERVED_PREFIX: &str = "rpc.";
pub const LIST_FUNCTIONS: &str = "rpc.functions";
pub const HANDLE_POLL: &str = "rpc.handle.poll";
pub const HANDLE_WAIT: &str = "rpc.handle.wait";
pub const HANDLE_CANCEL: &str = "rpc.handle.cancel";

/// IPC server that listens on a Unix domain socket.
pub struct RpcServer {
    socket_path: String,
    dispatcher: Dispatcher,
    shutdown_tx: broadcast::Sender<()>,
}

impl RpcServer {
    /// Create a new IPC server.
    pub fn new(socket_path: &str, dispatcher: Dispatcher) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self::with_shutdown_sender(socket_path, dispatcher, shutdown_tx)
    }

    /// Create a server that stops when `shutdown_tx` fires.
    ///
    /// Lets registered functions hold the sender before the server exists.
    pub fn with_shutdown_sender(
        socket_path: &str,
        dispatcher: Dispatcher,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            socket_path: socket_path.to_string(),
            dispatcher,
            shutdown_tx,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Get a shutdown receiver.
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Get a shutdown sender (for functions that need to trigger shutdown).
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Trigger shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Start the server and listen for connections until shutdown.
    pub async fn run(&self) -> IpcResult<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        // Remove existing socket file
        let socket_path = Path::new(&self.socket_path);
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }

        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path, "IPC server listening");

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _)) => {
                            let dispatcher = self.dispatcher.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, dispatcher).await {
                                    error!(error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Accept error");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("IPC server shutting down");
                    break;
                }
            }
        }

        // Cleanup socket file
        let _ = std::fs::remove_file(&self.socket_path);

        Ok(())
    }
}

/// Handle a single client connection.
async fn handle_connection(stream: UnixStream, dispatcher: Dispatcher) -> IpcResult<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    debug!("Client connected");

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            debug!("Client disconnected");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!(request = %trimmed, "Received request");

        let response = match Request::from_json(trimmed) {
            Ok(request) => respond(&dispatcher, request).await,
            Err(e) => {
                warn!(error = %e, "Failed to parse request");
                Response::error(Status::BadRequest, Some(format!("Parse error: {}", e)))
            }
        };

        write_response(&mut writer, &response).await?;
    }

    Ok(())
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> IpcResult<()> {
    let response_json = response.to_json()?;
    debug!(response = %response_json, "Sending response");

    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Route a request to the adapter built-ins or the dispatcher.
pub async fn respond(dispatcher: &Dispatcher, request: Request) -> Response {
    if request.function.starts_with(RESERVED_PREFIX) {
        handle_builtin(dispatcher, request).await
    } else {
        dispatcher.dispatch(request).await
    }
}

async fn handle_builtin(dispatcher: &Dispatcher, request: Request) -> Response {
    let id = request.id.clone();

    if !dispatcher.is_authorized(&request.headers) {
        warn!(request_id = %id, function = %request.function, "Rejected built-in: token check failed");
        return Response::error(Status::Unauthorized, None).with_id(id);
    }

    let response = match request.function.as_str() {
        LIST_FUNCTIONS => Response::ok(json!(dispatcher.registry().names())),
        HANDLE_POLL | HANDLE_WAIT | HANDLE_CANCEL => match handle_arg(&request) {
            Some(handle) => handle_op(dispatcher, &request.function, &handle).await,
            None => Response::error(Status::BadRequest, Some("handle is required".to_string())),
        },
        other => Response::error(Status::NotFound, Some(other.to_string())),
    };

    response.with_id(id)
}

async fn handle_op(dispatcher: &Dispatcher, function: &str, handle: &str) -> Response {
    let handles = dispatcher.handles();
    let outcome = match function {
        HANDLE_POLL => handles.poll(handle).map(|snapshot| to_result(&snapshot)),
        HANDLE_WAIT => handles.wait(handle).await.map(|response| to_result(&response)),
        _ => handles
            .cancel(handle)
            .map(|outcome| Response::ok(json!({ "outcome": outcome.as_str() }))),
    };

    match outcome {
        Ok(response) => response,
        Err(RpcError::UnknownHandle(handle)) => Response::error(Status::NotFound, Some(handle)),
        Err(e) => Response::error(Status::InternalError, Some(e.to_string())),
    }
}

/// The `handle` named argument, or the first positional argument.
fn handle_arg(request: &Request) -> Option<String> {
    request
        .named
        .get("handle")
        .or_else(|| request.positional.first())
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn to_result<T: Serialize>(value: &T) -> Response {
    match serde_json::to_value(value) {
        Ok(value) => Response::ok(value),
        Err(e) => Response::error(Status::InternalError, Some(e.to_string())),
    }
}

/// IPC client for connecting to the daemon.
pub struct RpcClient {
    socket_path: String,
    token: Option<String>,
}

impl RpcClient {
    /// Create a new IPC client.
    pub fn new(socket_path: &str) -> Self {
        Self {
            socket_path: socket_path.to_string(),
            token: None,
        }
    }

    /// Attach `token` to every request that does not carry one.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Send a request and wait for response.
    pub async fn call(&self, mut request: Request) -> IpcResult<Response> {
        if request.headers.token.is_none() {
            request.headers.token = self.token.clone();
        }

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| IpcError::Socket(format!("Failed to connect: {}", e)))?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        // Send request
        let request_json = request.to_json()?;
        writer.write_all(request_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        // Read response
        let mut line = String::new();
        reader.read_line(&mut line).await?;

        if line.is_empty() {
            return Err(IpcError::ConnectionClosed);
        }

        let response = Response::from_json(line.trim())?;
        Ok(response)
    }

    /// Call `function` with positional arguments.
    pub async fn call_function(&self, function: &str, positional: Vec<Value>) -> IpcResult<Response> {
        self.call(new_request(function)?.with_positional(positional))
            .await
    }

    /// Names registered on the server.
    pub async fn list_functions(&self) -> IpcResult<Vec<String>> {
        let response = self.call(new_request(LIST_FUNCTIONS)?).await?;
        decode(response)
    }

    pub async fn poll_handle(&self, handle: &str) -> IpcResult<HandleSnapshot> {
        let response = self.call(handle_request(HANDLE_POLL, handle)?).await?;
        decode(response)
    }

    /// Block until `handle` finishes and return the call's response.
    pub async fn wait_handle(&self, handle: &str) -> IpcResult<Response> {
        let response = self.call(handle_request(HANDLE_WAIT, handle)?).await?;
        decode(response)
    }

    /// Cancel `handle`; returns `not_started`, `suppressed` or `already_finished`.
    pub async fn cancel_handle(&self, handle: &str) -> IpcResult<String> {
        let response = self.call(handle_request(HANDLE_CANCEL, handle)?).await?;
        let value: Value = decode(response)?;
        value
            .get("outcome")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| IpcError::Protocol("cancel response has no outcome".to_string()))
    }

    /// Check if the daemon is running.
    ///
    /// Any well-formed reply counts, including `UNAUTHORIZED`.
    pub async fn is_daemon_running(&self) -> bool {
        match new_request(LIST_FUNCTIONS) {
            Ok(request) => self.call(request).await.is_ok(),
            Err(_) => false,
        }
    }
}

fn new_request(function: &str) -> IpcResult<Request> {
    Request::new(function).map_err(|e| IpcError::Protocol(e.to_string()))
}

fn handle_request(function: &str, handle: &str) -> IpcResult<Request> {
    Ok(new_request(function)?.with_named_arg("handle", json!(handle)))
}

fn decode<T: serde::de::DeserializeOwned>(response: Response) -> IpcResult<T> {
    if !response.is_success() {
        return Err(IpcError::Protocol(format!(
            "{}: {}",
            response.status,
            response.details.unwrap_or_default()
        )));
    }
    let value = response.result.unwrap_or(Value::Null);
    Ok(serde_json::from_value(value)?)
}
