//! REST forwarding to the completions gateway.
//!
//! Non-realtime API traffic (chat completions, embeddings, model listing)
//! is handed to an injected [`CompletionsGateway`] so the relay core has no
//! compile-time dependency on how forwarding is implemented. The default
//! implementation forwards to the OpenAI-compatible Gemini REST endpoint
//! over HTTPS.

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use http_body_util::BodyExt;
use thiserror::Error;
use url::Url;

use crate::routes::COMPLETION_SUFFIXES;

/// A failure surfaced by the gateway collaborator. The carried status (500
/// when absent) becomes the response status and the message is forwarded
/// verbatim as a plain-text body.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub status: Option<StatusCode>,
    pub message: String,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn status_or_default(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Capability boundary for REST-style forwarding.
#[async_trait]
pub trait CompletionsGateway: Send + Sync {
    async fn handle(&self, request: Request) -> Result<Response, GatewayError>;
}

/// Forward a request through the configured gateway, mapping failures onto
/// the documented status + plain-text surface.
pub async fn forward(gateway: &dyn CompletionsGateway, request: Request) -> Response {
    match gateway.handle(request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(%err, "completions gateway failure");
            let status = err.status_or_default();
            (
                status,
                [(header::CONTENT_TYPE, "text/plain")],
                err.message,
            )
                .into_response()
        }
    }
}

/// Default gateway: forwards to an OpenAI-compatible completions endpoint.
pub struct HttpCompletionsGateway {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpCompletionsGateway {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn target_for(&self, path: &str) -> Option<String> {
        let suffix = COMPLETION_SUFFIXES
            .iter()
            .find(|suffix| path.ends_with(*suffix))?;
        Some(format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            suffix
        ))
    }
}

#[async_trait]
impl CompletionsGateway for HttpCompletionsGateway {
    async fn handle(&self, request: Request) -> Result<Response, GatewayError> {
        let (parts, body) = request.into_parts();

        let target = self.target_for(parts.uri.path()).ok_or_else(|| {
            GatewayError::with_status(
                StatusCode::NOT_FOUND,
                format!("no completions route for {}", parts.uri.path()),
            )
        })?;

        let body: Bytes = body
            .collect()
            .await
            .map_err(|err| GatewayError::new(format!("failed to read request body: {err}")))?
            .to_bytes();

        let mut outbound = self.client.request(parts.method, &target);
        for name in [header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT] {
            if let Some(value) = parts.headers.get(&name) {
                outbound = outbound.header(name.clone(), value.clone());
            }
        }

        let upstream = outbound
            .body(body)
            .send()
            .await
            .map_err(|err| GatewayError::new(format!("completions request failed: {err}")))?;

        let status = upstream.status();
        let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();

        let mut response = Response::builder().status(status);
        if let Some(content_type) = content_type {
            response = response.header(header::CONTENT_TYPE, content_type);
        }
        response
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|err| GatewayError::new(format!("failed to build response: {err}")))
    }
}
