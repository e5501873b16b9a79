//! JSON-RPC 2.0 Codec
//!
//! Turns a raw request body into a response body. Two layers of failure
//! are kept apart:
//!
//! - **Structural failure** ([`ParseFailure`]): the body is not JSON, the
//!   outer value is neither object nor array, a batch element is not an
//!   object, or an envelope is unusable (wrong `jsonrpc` version, missing
//!   or non-integer `id`). The front-end answers these with a plain HTML
//!   400; no partial answer ever leaves this module.
//! - **JSON-RPC error**: everything else becomes an error envelope with
//!   the known `id` (`-32600` missing method, `-32601` unknown method,
//!   handler codes otherwise) inside an HTTP 200 answer.
//!
//! Notifications (requests without an `id`) are deliberately not
//! supported; they fail the whole node. An `id` of 0 is an ordinary id.
//!
//! Batches are processed in array order and answered in the same order,
//! elements joined with `", "`.

use crate::registry::{HandlerContext, Registry};
use pwrpc_common::protocol::{JsonRpcError, JsonRpcResponse};
use serde_json::Value;

/// Structural failure: the request cannot be answered with an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseFailure;

/// A complete response body plus the per-RPC outcome tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcAnswer {
    pub body: String,
    pub succeeded: u64,
    pub failed: u64,
}

enum NodeOutcome {
    Success(String),
    Error(String),
}

/// Process one request body. `raw` is the decoded body text.
pub fn parse_request(
    raw: &[u8],
    registry: &Registry,
    ctx: &HandlerContext,
) -> Result<RpcAnswer, ParseFailure> {
    let root: Value = serde_json::from_slice(raw).map_err(|_| ParseFailure)?;

    match &root {
        Value::Array(nodes) => {
            let mut parts = Vec::with_capacity(nodes.len());
            let mut succeeded = 0;
            let mut failed = 0;
            for node in nodes {
                if !node.is_object() {
                    return Err(ParseFailure);
                }
                match parse_one(node, registry, ctx)? {
                    NodeOutcome::Success(envelope) => {
                        succeeded += 1;
                        parts.push(envelope);
                    }
                    NodeOutcome::Error(envelope) => {
                        failed += 1;
                        parts.push(envelope);
                    }
                }
            }
            Ok(RpcAnswer {
                body: format!("[{}]", parts.join(", ")),
                succeeded,
                failed,
            })
        }
        Value::Object(_) => match parse_one(&root, registry, ctx)? {
            NodeOutcome::Success(body) => Ok(RpcAnswer {
                body,
                succeeded: 1,
                failed: 0,
            }),
            NodeOutcome::Error(body) => Ok(RpcAnswer {
                body,
                succeeded: 0,
                failed: 1,
            }),
        },
        _ => Err(ParseFailure),
    }
}

/// Process one request object into one envelope.
fn parse_one(
    node: &Value,
    registry: &Registry,
    ctx: &HandlerContext,
) -> Result<NodeOutcome, ParseFailure> {
    let obj = node.as_object().ok_or(ParseFailure)?;

    let version = obj
        .get("jsonrpc")
        .and_then(Value::as_str)
        .ok_or(ParseFailure)?;
    if version != "2.0" {
        return Err(ParseFailure);
    }

    // Notifications are not supported: an absent or non-integer id fails
    // the whole node.
    let id = obj.get("id").and_then(Value::as_i64).ok_or(ParseFailure)?;

    let Some(method) = obj.get("method").and_then(Value::as_str) else {
        return error_outcome(id, JsonRpcError::invalid_request());
    };

    let Some(handler) = registry.lookup(method) else {
        return error_outcome(id, JsonRpcError::method_not_found());
    };

    // May be absent; handlers validate their own shape.
    let params = obj.get("params");

    match handler(ctx, params) {
        Ok(result) => {
            let envelope = JsonRpcResponse::success(id, result);
            Ok(NodeOutcome::Success(encode(&envelope)?))
        }
        Err(error) => error_outcome(id, error),
    }
}

fn error_outcome(id: i64, error: JsonRpcError) -> Result<NodeOutcome, ParseFailure> {
    let envelope = JsonRpcResponse::error(Some(id), error);
    Ok(NodeOutcome::Error(encode(&envelope)?))
}

fn encode(envelope: &JsonRpcResponse) -> Result<String, ParseFailure> {
    serde_json::to_string(envelope).map_err(|_| ParseFailure)
}
