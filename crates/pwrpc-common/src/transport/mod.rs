//! pwrpc Transport Layer
//!
//! HTTP-specific helpers for serving JSON-RPC over HTTP/1.1.
//!
//! # Components
//!
//! - **[`http`]**: response builders, MIME types, HTML failure pages, and
//!   form-urlencoded body decoding

pub mod http;

pub use http::{HttpReply, HyperRequest, HyperResponse};
