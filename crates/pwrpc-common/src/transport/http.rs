//! HTTP Transport Helpers
//!
//! This module provides the HTTP side of the wire contract: staged replies
//! with the right MIME type and connection disposition, the HTML bodies
//! served on structural failures, and the `application/x-www-form-urlencoded`
//! body decoder.
//!
//! # Wire contract
//!
//! - JSON-RPC answers are served as `application/json-rpc` with HTTP 200 and
//!   the connection kept alive.
//! - Structural failures (bad verb, empty body, undecodable or unparsable
//!   body) are served as `text/html` error pages with `Connection: close`.
//! - Admission rejections are served as a canonical JSON-RPC error body with
//!   HTTP 503 and `Connection: close`.

use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, StatusCode};
use http_body_util::Full;

use crate::protocol::{JsonRpcError, JsonRpcResponse};

/// MIME type of JSON-RPC answers
pub const MIMETYPE_JSONRPC: &str = "application/json-rpc";
/// MIME type of HTML failure pages
pub const MIMETYPE_TEXTHTML: &str = "text/html";

/// Generic failure page (bad verb, empty body)
pub const ERROR_PAGE: &str = "<html><body><h1>Some error occured</h1></body></html>";
/// Parse failure page (undecodable or unparsable body)
pub const PARSE_ERROR_PAGE: &str = "<html><body><h1>Parse error</h1></body></html>";
/// Internal failure page
pub const SERVER_ERROR_PAGE: &str =
    "<html><body>An internal server error has occured.</body></html>";

/// Type alias for Hyper incoming requests
pub type HyperRequest = Request<Incoming>;

/// Type alias for Hyper responses with full body
pub type HyperResponse = Response<Full<Bytes>>;

/// A staged HTTP reply: status, MIME type, body, and whether the
/// connection is closed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: StatusCode,
    pub mimetype: &'static str,
    pub body: String,
    pub close: bool,
}

impl HttpReply {
    /// A successful JSON-RPC answer: 200, `application/json-rpc`, keep-alive.
    pub fn json_answer(body: String) -> Self {
        Self {
            status: StatusCode::OK,
            mimetype: MIMETYPE_JSONRPC,
            body,
            close: false,
        }
    }

    /// An HTML failure page. Always closes the connection.
    pub fn html_error(status: StatusCode, page: &'static str) -> Self {
        Self {
            status,
            mimetype: MIMETYPE_TEXTHTML,
            body: page.to_string(),
            close: true,
        }
    }

    /// The admission-rejection reply: 503 with a canonical JSON-RPC error
    /// body and `id: null`, connection closed.
    pub fn busy() -> Self {
        let envelope = JsonRpcResponse::error(None, JsonRpcError::too_many_connections());
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            mimetype: MIMETYPE_JSONRPC,
            body: serde_json::to_string(&envelope).unwrap_or_default(),
            close: true,
        }
    }

    /// Render the staged reply as a hyper response.
    pub fn into_response(self) -> HyperResponse {
        let mut builder = Response::builder()
            .status(self.status)
            .header("Content-Type", self.mimetype);
        if self.close {
            builder = builder.header("Connection", "close");
        }
        // The builder only fails on invalid header values, and ours are
        // static strings.
        builder.body(Full::new(Bytes::from(self.body))).unwrap()
    }
}

/// Decode an `application/x-www-form-urlencoded` body in place.
///
/// `+` becomes a space and `%HH` becomes the byte it names. Returns `None`
/// when a `%` escape is truncated or not hexadecimal.
pub fn decode_www_form(input: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hi = hex_value(*input.get(i + 1)?)?;
                let lo = hex_value(*input.get(i + 2)?)?;
                out.push(hi << 4 | lo);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Some(out)
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
