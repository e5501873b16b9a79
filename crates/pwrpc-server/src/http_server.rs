//! HTTP Front-End
//!
//! Serves the JSON-RPC endpoint over HTTP/1.1 using hyper, one task per
//! connection. Only `POST` carries a request; everything else is a
//! structural failure. Admission is decided before anything else: when
//! the active client count has reached `MaxClients`, the request is
//! answered with a 503 busy body and the connection is closed.
//!
//! # Per-request lifecycle
//!
//! 1. Admission check against the client cap.
//! 2. Body accumulation (`Content-Type: application/x-www-form-urlencoded`
//!    bodies are percent-decoded afterwards).
//! 3. Codec dispatch; a JSON answer is served as 200 keep-alive, any
//!    structural failure as an HTML error page with `Connection: close`.
//!
//! The admitted-client slot is released exactly once per request, on
//! every path, by the drop guard.

use http_body_util::BodyExt;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::codec;
use crate::counters::{ClientGuard, Counters};
use crate::handlers::perfwatcher_registry;
use crate::registry::{HandlerContext, Registry};
use pwrpc_common::protocol::{PwrpcError, Result};
use pwrpc_common::transport::http::{
    decode_www_form, HttpReply, HyperRequest, HyperResponse, ERROR_PAGE, PARSE_ERROR_PAGE,
    SERVER_ERROR_PAGE,
};

/// Maximum request body size (10 MB)
///
/// In-flight body memory is bounded by `MaxClients` times this limit.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Declared body encoding, taken from the `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyEncoding {
    Plain,
    WwwFormUrlencoded,
}

/// The JSON-RPC HTTP endpoint.
pub struct HttpServer {
    registry: Registry,
    ctx: HandlerContext,
    counters: Arc<Counters>,
    max_clients: u32,
}

impl HttpServer {
    pub fn new(ctx: HandlerContext, counters: Arc<Counters>, max_clients: u32) -> Self {
        Self {
            registry: perfwatcher_registry(),
            ctx,
            counters,
            max_clients,
        }
    }

    /// Bind and serve forever.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| PwrpcError::Transport(format!("Failed to bind to {addr}: {e}")))?;
        info!(
            "JSON-RPC endpoint listening on {}",
            listener
                .local_addr()
                .map_err(|e| PwrpcError::Transport(e.to_string()))?
        );
        self.serve(listener).await
    }

    /// Serve connections accepted from an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let server = Arc::new(self);
        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| PwrpcError::Transport(format!("Failed to accept: {e}")))?;

            let io = TokioIo::new(stream);
            let server = Arc::clone(&server);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move {
                        Ok::<_, std::convert::Infallible>(server.handle_request(req).await)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Error serving connection: {}", err);
                }
            });
        }
    }

    async fn handle_request(&self, req: HyperRequest) -> HyperResponse {
        self.process(req).await.into_response()
    }

    /// Stage the reply for one request, updating the counters.
    async fn process(&self, req: HyperRequest) -> HttpReply {
        if req.method() != hyper::Method::POST {
            // The cap applies to every verb; only POST holds a slot.
            if self.counters.snapshot().active_clients >= self.max_clients {
                debug!("request rejected: client cap exhausted");
                self.counters.record_failure(1);
                return HttpReply::busy();
            }
            self.counters.record_new_connection();
            debug!(method = %req.method(), "request failed: unsupported verb");
            self.counters.record_failure(1);
            return HttpReply::html_error(StatusCode::BAD_REQUEST, ERROR_PAGE);
        }

        let Some(_client) = ClientGuard::admit(&self.counters, self.max_clients) else {
            debug!(
                max_clients = self.max_clients,
                "request rejected: client cap exhausted"
            );
            self.counters.record_failure(1);
            return HttpReply::busy();
        };
        self.counters.record_new_connection();

        let encoding = match req.headers().get(hyper::header::CONTENT_TYPE) {
            Some(v) if v.as_bytes() == b"application/x-www-form-urlencoded" => {
                BodyEncoding::WwwFormUrlencoded
            }
            _ => BodyEncoding::Plain,
        };

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                error!("Failed to read request body: {}", e);
                self.counters.record_failure(1);
                return HttpReply::html_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    SERVER_ERROR_PAGE,
                );
            }
        };

        if body.is_empty() {
            debug!("request failed: empty body");
            self.counters.record_failure(1);
            return HttpReply::html_error(StatusCode::BAD_REQUEST, ERROR_PAGE);
        }
        if body.len() > MAX_BODY_SIZE {
            debug!(len = body.len(), "request failed: body too large");
            self.counters.record_failure(1);
            return HttpReply::html_error(StatusCode::BAD_REQUEST, ERROR_PAGE);
        }

        let decoded = match encoding {
            BodyEncoding::Plain => body.to_vec(),
            BodyEncoding::WwwFormUrlencoded => match decode_www_form(&body) {
                Some(decoded) => decoded,
                None => {
                    debug!("request failed: could not decode form-urlencoded body");
                    self.counters.record_failure(1);
                    return HttpReply::html_error(StatusCode::BAD_REQUEST, PARSE_ERROR_PAGE);
                }
            },
        };

        match codec::parse_request(&decoded, &self.registry, &self.ctx) {
            Ok(answer) => {
                self.counters.record_success(answer.succeeded);
                self.counters.record_failure(answer.failed);
                HttpReply::json_answer(answer.body)
            }
            Err(_) => {
                debug!(len = decoded.len(), "request failed: parse error");
                self.counters.record_failure(1);
                HttpReply::html_error(StatusCode::BAD_REQUEST, PARSE_ERROR_PAGE)
            }
        }
    }
}
