//! pwrpc Common Types and Transport Helpers
//!
//! This crate provides the JSON-RPC 2.0 protocol definitions and the HTTP
//! transport helpers shared by the pwrpc query daemon.
//!
//! # Overview
//!
//! pwrpc is a JSON-RPC 2.0 query endpoint embedded in a metrics-collection
//! host. Dashboards POST JSON-RPC requests over HTTP and receive answers
//! about the host's in-memory metric-name cache and the on-disk data
//! directory. This crate contains the pieces both the engine and any future
//! client share:
//!
//! - **Protocol Layer**: response envelopes, canonical error codes and
//!   messages
//! - **Transport Layer**: HTTP response builders, MIME types, HTML failure
//!   pages, form-urlencoded body decoding
//!
//! # Components
//!
//! - [`protocol`] - Core protocol types (response envelope, error object)
//! - [`transport`] - HTTP transport helpers

pub mod protocol;
pub mod transport;

pub use protocol::*;
