//! pwrpc Protocol Definitions
//!
//! This module defines the JSON-RPC 2.0 wire types used throughout the
//! daemon, along with the crate-wide error type.
//!
//! # Protocol Types
//!
//! - **[`JsonRpcResponse`]**: the response envelope (`result` or `error`)
//! - **[`JsonRpcError`]**: the error object with canonical codes and texts
//! - **[`PwrpcError`]**: internal error type with conversions from the
//!   usual failure sources
//!
//! Requests are not modelled as a struct: the codec inspects the raw JSON
//! tree field by field so that malformed envelopes can be classified the
//! way the wire contract requires (whole-node failure vs. an error
//! envelope with the known `id`).

pub mod error;
pub mod jsonrpc;

pub use error::{PwrpcError, Result};
pub use jsonrpc::{
    JsonRpcError, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, TOO_MANY_CONNECTIONS,
};
