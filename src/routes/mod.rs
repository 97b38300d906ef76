//! Request routing.
//!
//! Every inbound request flows through one fallback handler so the ordered
//! classification rules stay in a single place: WebSocket upgrades win over
//! everything, then the config echo, then the completions suffixes, and
//! finally the static document root.

use std::sync::Arc;

use axum::Router;
use axum::extract::{FromRequestParts, Request, State, WebSocketUpgrade};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Path suffixes forwarded to the completions gateway.
pub const COMPLETION_SUFFIXES: [&str; 3] = ["/chat/completions", "/embeddings", "/models"];

/// Fixed path of the configuration echo endpoint.
pub const CONFIG_PATH: &str = "/api/config";

/// Outcome of request classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// WebSocket upgrade into a relay session
    Relay,
    /// Configuration echo
    ConfigStatus,
    /// REST forwarding to the completions gateway
    Completions,
    /// Static document root
    StaticAsset,
}

/// Classify a request. Pure; rules are evaluated in order.
pub fn classify(path: &str, is_websocket_upgrade: bool) -> RouteKind {
    if is_websocket_upgrade {
        return RouteKind::Relay;
    }
    if path == CONFIG_PATH {
        return RouteKind::ConfigStatus;
    }
    if COMPLETION_SUFFIXES
        .iter()
        .any(|suffix| path.ends_with(suffix))
    {
        return RouteKind::Completions;
    }
    RouteKind::StaticAsset
}

/// Whether the request signals WebSocket upgrade intent.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let upgrade = is_websocket_upgrade(request.headers());
    match classify(request.uri().path(), upgrade) {
        RouteKind::Relay => {
            let uri = request.uri().clone();
            let (mut parts, _body) = request.into_parts();
            match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
                Ok(ws) => handlers::relay::handle(ws, uri, state),
                Err(rejection) => rejection.into_response(),
            }
        }
        RouteKind::ConfigStatus => handlers::config::config_status(&state.config),
        RouteKind::Completions => handlers::gateway::forward(state.gateway.as_ref(), request).await,
        RouteKind::StaticAsset => {
            handlers::assets::serve(&state.config, request.uri().path()).await
        }
    }
}
