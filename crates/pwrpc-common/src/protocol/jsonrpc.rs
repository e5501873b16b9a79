//! JSON-RPC 2.0 Response Types
//!
//! This module implements the JSON-RPC 2.0 response surface of the daemon.
//!
//! # JSON-RPC 2.0 Compliance
//!
//! - JSON-RPC version: "2.0"
//! - Response format: `{"jsonrpc": "2.0", "result": ..., "id": ...}` or
//!   `{"jsonrpc": "2.0", "error": {...}, "id": ...}`
//! - Error format: `{"code": ..., "message": "..."}`
//!
//! # Error Codes
//!
//! Standard JSON-RPC 2.0 error codes plus one implementation-defined code:
//! - `-32600`: Invalid Request
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//! - `-32400`: Too many connections (admission rejection)
//!
//! # Example
//!
//! ```
//! use pwrpc_common::protocol::jsonrpc::{JsonRpcError, JsonRpcResponse};
//! use serde_json::json;
//!
//! let ok = JsonRpcResponse::success(1, json!({"result": {}}));
//! let err = JsonRpcResponse::error(Some(1), JsonRpcError::method_not_found());
//! assert_eq!(
//!     serde_json::to_string(&err).unwrap(),
//!     r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found."},"id":1}"#
//! );
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

// Standard JSON-RPC 2.0 error codes
/// The JSON sent is not a valid Request object
pub const INVALID_REQUEST: i32 = -32600;
/// The method does not exist / is not available
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameter(s)
pub const INVALID_PARAMS: i32 = -32602;
/// Internal JSON-RPC error
pub const INTERNAL_ERROR: i32 = -32603;
/// Implementation-defined: the client cap is exhausted
pub const TOO_MANY_CONNECTIONS: i32 = -32400;

/// JSON-RPC 2.0 response
///
/// Exactly one of `result` and `error` is present. `id` echoes the request
/// id; it is `null` only on admission rejections, where no request was
/// parsed at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Result value on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier (integer, or null for admission rejections)
    pub id: Option<i64>,
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    /// Error code (canonical codes are negative integers)
    pub code: i32,
    /// Short description of the error
    pub message: String,
}

impl JsonRpcError {
    /// Create an invalid request error (-32600)
    pub fn invalid_request() -> Self {
        Self {
            code: INVALID_REQUEST,
            message: "Invalid Request.".into(),
        }
    }

    /// Create a method not found error (-32601)
    pub fn method_not_found() -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: "Method not found.".into(),
        }
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params() -> Self {
        Self {
            code: INVALID_PARAMS,
            message: "Invalid params.".into(),
        }
    }

    /// Create an internal error (-32603)
    pub fn internal_error() -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: "Internal error.".into(),
        }
    }

    /// Create a too many connections error (-32400)
    ///
    /// Used when a new request is rejected at admission because the
    /// client cap is exhausted.
    pub fn too_many_connections() -> Self {
        Self {
            code: TOO_MANY_CONNECTIONS,
            message: "Too many connections".into(),
        }
    }

    /// Create an error with an explicit code and message.
    ///
    /// Handlers use this for codes outside the canonical set.
    pub fn with_message(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: i64, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id: Some(id),
        }
    }

    /// Create an error response
    ///
    /// `id` is `None` only for admission rejections.
    pub fn error(id: Option<i64>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}
