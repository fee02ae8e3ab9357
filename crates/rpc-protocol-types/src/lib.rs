//! Pure RPC envelope types for rpcd.
//!
//! This crate contains only data types and serialization: no I/O, no async,
//! no transport. It defines the call contract shared by the dispatcher and
//! whatever adapter carries requests into it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Errors raised while building an envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The request does not name a function.
    #[error("function name is required")]
    EmptyFunction,

    /// A failure response that also carries a result.
    #[error("{0} response must not carry a result")]
    ResultOnFailure(Status),

    /// An `OK` response that carries failure details.
    #[error("OK response must not carry details")]
    DetailsOnSuccess,
}

/// Outcome tag carried by every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    /// Function name did not resolve.
    NotFound,
    /// Token check failed.
    Unauthorized,
    /// Malformed envelope, e.g. missing function name.
    BadRequest,
    /// The callable failed, panicked or timed out.
    InternalError,
}

impl Status {
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotFound => "NOT_FOUND",
            Status::Unauthorized => "UNAUTHORIZED",
            Status::BadRequest => "BAD_REQUEST",
            Status::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Numeric code for transports that signal failures with JSON-RPC style codes.
    pub fn error_code(self) -> Option<i32> {
        match self {
            Status::Ok => None,
            Status::NotFound => Some(error_codes::METHOD_NOT_FOUND),
            Status::Unauthorized => Some(error_codes::NOT_AUTHENTICATED),
            Status::BadRequest => Some(error_codes::INVALID_REQUEST),
            Status::InternalError => Some(error_codes::INTERNAL_ERROR),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeaders {
    /// Credential checked by the dispatcher's token policy, if one is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Queue the call and answer with a handle instead of awaiting it inline.
    #[serde(default)]
    pub deferred: bool,
}

/// RPC request message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub headers: RequestHeaders,
    /// Dotted name of the target callable, e.g. `one.two.three`.
    pub function: String,
    /// Positional arguments, order-significant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positional: Vec<Value>,
    /// Named arguments.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub named: Map<String, Value>,
}

impl Request {
    /// Create a new request with auto-generated ID.
    pub fn new(function: impl Into<String>) -> Result<Self, ProtocolError> {
        let function = function.into();
        if function.trim().is_empty() {
            return Err(ProtocolError::EmptyFunction);
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            headers: RequestHeaders::default(),
            function,
            positional: Vec::new(),
            named: Map::new(),
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Replace the positional arguments.
    pub fn with_positional(mut self, positional: Vec<Value>) -> Self {
        self.positional = positional;
        self
    }

    /// Append one positional argument.
    pub fn with_arg(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    /// Replace the named arguments.
    pub fn with_named(mut self, named: Map<String, Value>) -> Self {
        self.named = named;
        self
    }

    /// Set one named argument, replacing any previous value under `name`.
    pub fn with_named_arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.insert(name.into(), value);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.headers.token = Some(token.into());
        self
    }

    /// Mark the request as deferred.
    pub fn deferred(mut self) -> Self {
        self.headers.deferred = true;
        self
    }

    /// Check the envelope invariants. Deserialized requests bypass [`Request::new`].
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.function.trim().is_empty() {
            return Err(ProtocolError::EmptyFunction);
        }
        Ok(())
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// RPC response message.
///
/// A response carries either a result (status `OK`) or a failure status with
/// optional details, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireResponse")]
pub struct Response {
    /// Request ID for correlation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub status: Status,
    /// Human-readable explanation (non-OK only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Return value of the callable (OK only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Unchecked wire form of [`Response`].
#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    id: String,
    status: Status,
    #[serde(default)]
    details: Option<String>,
    #[serde(default, deserialize_with = "present_value")]
    result: Option<Value>,
}

impl TryFrom<WireResponse> for Response {
    type Error = ProtocolError;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        if wire.status.is_ok() && wire.details.is_some() {
            return Err(ProtocolError::DetailsOnSuccess);
        }
        if !wire.status.is_ok() && wire.result.is_some() {
            return Err(ProtocolError::ResultOnFailure(wire.status));
        }
        Ok(Self {
            id: wire.id,
            status: wire.status,
            details: wire.details,
            result: wire.result,
        })
    }
}

/// Keeps an explicit `"result": null` as `Some(Value::Null)`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Response {
    /// Create a successful response.
    pub fn ok(result: Value) -> Self {
        Self {
            id: String::new(),
            status: Status::Ok,
            details: None,
            result: Some(result),
        }
    }

    /// Create a failure response. [`Status::Ok`] is recorded as
    /// [`Status::InternalError`], since a success needs a result.
    pub fn error(status: Status, details: Option<String>) -> Self {
        let status = if status.is_ok() {
            Status::InternalError
        } else {
            status
        };
        Self {
            id: String::new(),
            status,
            details,
            result: None,
        }
    }

    /// Attach the correlation ID of the request being answered.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_ok()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Result payload of the immediate acknowledgement to a deferred request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredTicket {
    pub handle: String,
}

impl DeferredTicket {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "handle": self.handle })
    }

    /// Extract the ticket from an acknowledgement response.
    pub fn from_response(response: &Response) -> Option<Self> {
        if !response.is_success() {
            return None;
        }
        response
            .result
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Lifecycle of a deferred call. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandleState {
    Pending,
    Completed,
    Failed,
}

impl HandleState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, HandleState::Pending)
    }
}

/// Point-in-time view of a deferred call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleSnapshot {
    pub handle: String,
    pub state: HandleState,
    /// Terminal response; set exactly when `state` is terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
}

impl HandleSnapshot {
    pub fn pending(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            state: HandleState::Pending,
            response: None,
        }
    }

    /// Snapshot of a finished call; the state follows the response status.
    pub fn finished(handle: impl Into<String>, response: Response) -> Self {
        let state = if response.is_success() {
            HandleState::Completed
        } else {
            HandleState::Failed
        };
        Self {
            handle: handle.into(),
            state,
            response: Some(response),
        }
    }
}

// Standard error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const NOT_AUTHENTICATED: i32 = -32001;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = Request::new("one.two.three").unwrap();
        let json = request.to_json().unwrap();

        assert!(json.contains("\"function\":\"one.two.three\""));
        assert!(json.contains("\"id\":"));
        assert!(json.contains("\"deferred\":false"));
        assert!(!json.contains("\"positional\""));
        assert!(!json.contains("\"named\""));
        assert!(!json.contains("\"token\""));
    }

    #[test]
    fn test_request_rejects_empty_function() {
        assert_eq!(Request::new(""), Err(ProtocolError::EmptyFunction));
        assert_eq!(Request::new("   "), Err(ProtocolError::EmptyFunction));
    }

    #[test]
    fn test_request_builders() {
        let request = Request::new("math.add")
            .unwrap()
            .with_arg(json!(1))
            .with_arg(json!(2))
            .with_named_arg("round", json!(true))
            .with_token("secret")
            .deferred();

        assert_eq!(request.positional, vec![json!(1), json!(2)]);
        assert_eq!(request.named.get("round"), Some(&json!(true)));
        assert_eq!(request.headers.token.as_deref(), Some("secret"));
        assert!(request.headers.deferred);
    }

    #[test]
    fn test_request_deserialization_defaults() {
        let request = Request::from_json(r#"{"function":"a.b"}"#).unwrap();

        assert_eq!(request.function, "a.b");
        assert!(request.id.is_empty());
        assert!(!request.headers.deferred);
        assert!(request.headers.token.is_none());
        assert!(request.positional.is_empty());
        assert!(request.named.is_empty());
    }

    #[test]
    fn test_deserialized_empty_function_fails_validation() {
        let request = Request::from_json(r#"{"function":""}"#).unwrap();
        assert_eq!(request.validate(), Err(ProtocolError::EmptyFunction));
    }

    #[test]
    fn test_request_from_json_invalid() {
        assert!(Request::from_json("not json").is_err());
        // Missing function
        assert!(Request::from_json(r#"{"id":"123"}"#).is_err());
        // Positional must be an array
        assert!(Request::from_json(r#"{"function":"a","positional":{"x":1}}"#).is_err());
    }

    #[test]
    fn test_response_ok() {
        let response = Response::ok(json!("four")).with_id("123");
        let json = response.to_json().unwrap();

        assert!(json.contains("\"id\":\"123\""));
        assert!(json.contains("\"status\":\"OK\""));
        assert!(json.contains("\"result\":\"four\""));
        assert!(!json.contains("\"details\""));
    }

    #[test]
    fn test_response_error() {
        let response = Response::error(Status::NotFound, Some("missing.fn".into()));
        let json = response.to_json().unwrap();

        assert!(json.contains("\"status\":\"NOT_FOUND\""));
        assert!(json.contains("\"details\":\"missing.fn\""));
        assert!(!json.contains("\"result\""));
        assert!(!response.is_success());
    }

    #[test]
    fn test_response_roundtrip_keeps_exactly_one_side() {
        let ok = Response::from_json(&Response::ok(json!({"k": 1})).to_json().unwrap()).unwrap();
        assert!(ok.result.is_some());
        assert!(ok.details.is_none());

        let err = Response::from_json(
            &Response::error(Status::InternalError, Some("x".into()))
                .to_json()
                .unwrap(),
        )
        .unwrap();
        assert!(err.result.is_none());
        assert_eq!(err.details.as_deref(), Some("x"));
    }

    #[test]
    fn test_failure_with_result_is_rejected() {
        let err = Response::from_json(r#"{"status":"NOT_FOUND","details":"x","result":1}"#)
            .unwrap_err();
        assert!(err.to_string().contains("must not carry a result"));

        assert!(Response::from_json(r#"{"status":"INTERNAL_ERROR","result":null}"#).is_err());
    }

    #[test]
    fn test_success_with_details_is_rejected() {
        let err = Response::from_json(r#"{"status":"OK","details":"d"}"#).unwrap_err();
        assert!(err.to_string().contains("must not carry details"));

        assert!(Response::from_json(r#"{"status":"OK","result":1,"details":"d"}"#).is_err());
    }

    #[test]
    fn test_error_never_builds_a_success() {
        let response = Response::error(Status::Ok, Some("oops".into()));
        assert_eq!(response.status, Status::InternalError);
        assert!(response.result.is_none());

        let parsed = Response::from_json(&response.to_json().unwrap()).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_null_result_survives_roundtrip() {
        let response = Response::ok(Value::Null);
        let parsed = Response::from_json(&response.to_json().unwrap()).unwrap();

        assert_eq!(parsed.result, Some(Value::Null));
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_error_without_details() {
        let parsed = Response::from_json(
            &Response::error(Status::Unauthorized, None)
                .to_json()
                .unwrap(),
        )
        .unwrap();

        assert_eq!(parsed.status, Status::Unauthorized);
        assert!(parsed.details.is_none());
        assert!(parsed.result.is_none());
    }

    #[test]
    fn test_all_statuses_serialize() {
        let statuses = vec![
            (Status::Ok, "OK"),
            (Status::NotFound, "NOT_FOUND"),
            (Status::Unauthorized, "UNAUTHORIZED"),
            (Status::BadRequest, "BAD_REQUEST"),
            (Status::InternalError, "INTERNAL_ERROR"),
        ];

        for (status, expected) in statuses {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", expected));
            assert_eq!(status.to_string(), expected);
        }
    }

    #[test]
    fn test_status_error_codes() {
        assert_eq!(Status::Ok.error_code(), None);
        assert_eq!(Status::NotFound.error_code(), Some(-32601));
        assert_eq!(Status::BadRequest.error_code(), Some(-32600));
        assert_eq!(Status::InternalError.error_code(), Some(-32603));
        assert_eq!(Status::Unauthorized.error_code(), Some(-32001));
    }

    #[test]
    fn test_deferred_ticket_from_response() {
        let ack = Response::ok(DeferredTicket::new("h-1").to_value());
        assert_eq!(
            DeferredTicket::from_response(&ack),
            Some(DeferredTicket::new("h-1"))
        );

        let failure = Response::error(Status::NotFound, None);
        assert!(DeferredTicket::from_response(&failure).is_none());
    }

    #[test]
    fn test_handle_snapshot_state_follows_status() {
        let done = HandleSnapshot::finished("h", Response::ok(json!(1)));
        assert_eq!(done.state, HandleState::Completed);

        let failed = HandleSnapshot::finished(
            "h",
            Response::error(Status::InternalError, Some("boom".into())),
        );
        assert_eq!(failed.state, HandleState::Failed);
        assert!(failed.state.is_terminal());

        let pending = HandleSnapshot::pending("h");
        assert!(!pending.state.is_terminal());
        let json = serde_json::to_string(&pending).unwrap();
        assert!(json.contains("\"state\":\"PENDING\""));
        assert!(!json.contains("\"response\""));
    }

    #[test]
    fn test_request_id_uniqueness() {
        let req1 = Request::new("a").unwrap();
        let req2 = Request::new("a").unwrap();

        assert_ne!(req1.id, req2.id);
        assert!(!req1.id.is_empty());
    }
}
