//! Outbound forwarding to consensus nodes.
//!
//! # Responsibilities
//! - Send the signed request to `{destination}{suffix}`
//! - Enforce connect and per-call timeouts
//! - Relay the node's status and body, or translate the failure
//!
//! # Design Decisions
//! - No retries: node availability and idempotency are unknown here
//! - Dropping the handler future cancels the outbound call
//! - Diagnostics carry method, URI and upstream detail only

use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::config::UpstreamConfig;
use crate::http::error::GatewayError;
use crate::observability::metrics;
use crate::signing::SignedPayload;

/// What travels to the node.
#[derive(Debug, Clone)]
pub enum OutboundBody {
    /// `{"Payload","Signature"}` JSON body.
    Envelope(SignedPayload),
    /// Empty body, hex signature in `Authorization`.
    RawSignature(String),
}

impl OutboundBody {
    fn mode(&self) -> &'static str {
        match self {
            OutboundBody::Envelope(_) => "envelope",
            OutboundBody::RawSignature(_) => "raw",
        }
    }
}

/// A single forward; built per call and dropped after the relay.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub uri: String,
    pub body: OutboundBody,
    pub request_id: Option<HeaderValue>,
}

/// A node's successful answer, relayed verbatim.
#[derive(Debug)]
pub struct Relayed {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl IntoResponse for Relayed {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        if let Some(content_type) = self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

/// HTTP client for consensus nodes and their proxies.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    max_response_bytes: usize,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            timeout: Duration::from_secs(config.forward_timeout_secs),
            max_response_bytes: config.max_response_bytes,
        }
    }

    pub async fn forward(&self, req: ForwardRequest) -> Result<Relayed, GatewayError> {
        let start = Instant::now();
        let mode = req.body.mode();
        let failure = |detail: String, body: String| GatewayError::Upstream {
            method: req.method.to_string(),
            uri: req.uri.clone(),
            detail,
            body,
        };

        let uri: Uri = req.uri.parse().map_err(|e| {
            metrics::record_forward_failure("invalid_uri");
            failure(format!("invalid destination: {e}"), String::new())
        })?;

        let mut builder = Request::builder().method(req.method.clone()).uri(uri);
        if let Some(id) = &req.request_id {
            builder = builder.header("x-request-id", id.clone());
        }
        let outbound = match &req.body {
            OutboundBody::Envelope(payload) => {
                let json = serde_json::to_vec(payload)
                    .map_err(|e| failure(format!("encoding payload: {e}"), String::new()))?;
                builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json))
            }
            OutboundBody::RawSignature(signature) => builder
                .header(header::AUTHORIZATION, signature.as_str())
                .body(Body::empty()),
        }
        .map_err(|e| failure(e.to_string(), String::new()))?;

        tracing::debug!(method = %req.method, uri = %req.uri, mode, "Forwarding signed request");

        let response = match tokio::time::timeout(self.timeout, self.client.request(outbound)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                metrics::record_forward_failure("network");
                return Err(failure(e.to_string(), String::new()));
            }
            Err(_) => {
                metrics::record_forward_failure("timeout");
                return Err(failure(
                    format!("timed out after {}s", self.timeout.as_secs()),
                    String::new(),
                ));
            }
        };

        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let body = axum::body::to_bytes(Body::new(response.into_body()), self.max_response_bytes)
            .await
            .map_err(|e| {
                metrics::record_forward_failure("body");
                failure(format!("reading response: {e}"), String::new())
            })?;
        metrics::record_forward(mode, status.as_u16(), start);

        if !status.is_success() {
            metrics::record_forward_failure("status");
            return Err(failure(
                format!("status {}", status.as_u16()),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        Ok(Relayed {
            status,
            content_type,
            body,
        })
    }
}
