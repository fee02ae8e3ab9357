//! Request dispatch.
//!
//! The dispatcher never lets a failure escape as anything other than a
//! [`Response`]: token rejection, malformed envelopes, unresolved names,
//! callable errors, panics and timeouts all map onto a status.

use crate::auth::TokenPolicy;
use crate::callable::{Args, Callable};
use crate::deferred::HandleTable;
use crate::registry::Registry;
use futures_util::FutureExt;
use rpc_protocol_types::{DeferredTicket, Request, RequestHeaders, Response, Status};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

/// Upper bound on deferred calls running at the same time.
pub const DEFAULT_MAX_CONCURRENT_DEFERRED: usize = 64;

/// Details of the response produced when a call exceeds its timeout.
pub const TIMEOUT_DETAILS: &str = "timeout";

/// Per-call options supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Overrides the dispatcher's default timeout for this call.
    pub timeout: Option<Duration>,
}

impl DispatchOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Routes requests to registered callables. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    token_policy: Option<Arc<dyn TokenPolicy>>,
    handles: HandleTable,
    default_timeout: Option<Duration>,
    deferred_permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
            token_policy: None,
            handles: HandleTable::default(),
            default_timeout: None,
            deferred_permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_DEFERRED)),
        }
    }

    /// Require every request's token to pass `policy`.
    pub fn with_token_policy(mut self, policy: impl TokenPolicy + 'static) -> Self {
        self.token_policy = Some(Arc::new(policy));
        self
    }

    /// Timeout applied when the caller does not supply one.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// How long finished deferred handles stay readable.
    pub fn with_handle_ttl(mut self, ttl: Duration) -> Self {
        self.handles = HandleTable::new(ttl);
        self
    }

    pub fn with_max_concurrent_deferred(mut self, limit: usize) -> Self {
        self.deferred_permits = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Deferred handles issued by this dispatcher.
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Whether `headers` pass the configured token policy (always true without one).
    pub fn is_authorized(&self, headers: &RequestHeaders) -> bool {
        match &self.token_policy {
            Some(policy) => policy.validate(headers.token.as_deref()),
            None => true,
        }
    }

    /// Dispatch with default options.
    pub async fn dispatch(&self, request: Request) -> Response {
        self.dispatch_with(request, DispatchOptions::default()).await
    }

    pub async fn dispatch_with(&self, request: Request, options: DispatchOptions) -> Response {
        let Request {
            id,
            headers,
            function,
            positional,
            named,
        } = request;

        debug!(
            request_id = %id,
            function = %function,
            deferred = headers.deferred,
            "Dispatching request"
        );

        if !self.is_authorized(&headers) {
            warn!(request_id = %id, function = %function, "Rejected request: token check failed");
            return Response::error(Status::Unauthorized, None).with_id(id);
        }

        if function.trim().is_empty() {
            warn!(request_id = %id, "Rejected request: missing function name");
            return Response::error(
                Status::BadRequest,
                Some("function name is required".to_string()),
            )
            .with_id(id);
        }

        let callable = match self.registry.find(&function) {
            Ok(callable) => callable.clone(),
            Err(_) => {
                debug!(request_id = %id, function = %function, "Function not found");
                return Response::error(Status::NotFound, Some(function)).with_id(id);
            }
        };

        let args = Args::new(positional, named);
        let timeout = options.timeout.or(self.default_timeout);

        if headers.deferred {
            return self.defer(id, function, callable, args, timeout);
        }

        let response = invoke(&function, callable, args, timeout).await;
        debug!(request_id = %id, status = %response.status, "Request completed");
        response.with_id(id)
    }

    /// Queue the call and answer with a handle.
    fn defer(
        &self,
        id: String,
        function: String,
        callable: Callable,
        args: Args,
        timeout: Option<Duration>,
    ) -> Response {
        let (handle, slot) = self.handles.open(&id);
        let permits = self.deferred_permits.clone();
        let task_handle = handle.clone();

        tokio::spawn(async move {
            // The semaphore is never closed, so acquiring only waits.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };

            if !slot.begin() {
                debug!(handle = %task_handle, "Deferred call cancelled before start");
                return;
            }

            let response = invoke(&function, callable, args, timeout).await;
            let status = response.status;
            if slot.publish(response) {
                debug!(handle = %task_handle, status = %status, "Deferred call finished");
            } else {
                debug!(handle = %task_handle, "Deferred result discarded after cancellation");
            }
        });

        debug!(request_id = %id, handle = %handle, "Request deferred");
        Response::ok(DeferredTicket::new(handle).to_value()).with_id(id)
    }
}

/// Run `callable`, converting errors, panics and timeouts into responses.
async fn invoke(
    function: &str,
    callable: Callable,
    args: Args,
    timeout: Option<Duration>,
) -> Response {
    let call = AssertUnwindSafe(async move { callable(args).await }).catch_unwind();

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(function = %function, timeout_ms = limit.as_millis() as u64, "Function timed out");
                return Response::error(Status::InternalError, Some(TIMEOUT_DETAILS.to_string()));
            }
        },
        None => call.await,
    };

    match outcome {
        Ok(Ok(value)) => Response::ok(value),
        Ok(Err(err)) => {
            warn!(function = %function, error = %err, "Function failed");
            Response::error(Status::InternalError, Some(format!("{:#}", err)))
        }
        Err(panic) => {
            let message = panic_message(&*panic);
            error!(function = %function, panic = %message, "Function panicked");
            Response::error(Status::InternalError, Some(message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "function panicked".to_string()
    }
}
