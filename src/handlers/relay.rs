//! WebSocket upgrade handler for relay sessions.
//!
//! The client-side connection is always accepted; credential problems are
//! reported through a close frame on the upgraded socket (code 1008), never
//! by failing the HTTP handshake. When a credential resolves, the upstream
//! address is built before the upgrade completes and the session task takes
//! over.

use std::sync::Arc;

use axum::extract::ws::{self, CloseFrame, WebSocket, WebSocketUpgrade};
use axum::http::Uri;
use axum::response::Response;

use crate::core::relay::{self, RelayError, session, target};
use crate::state::AppState;

/// Turn an upgrade request into a relay session (or a 1008 rejection).
pub fn handle(ws: WebSocketUpgrade, uri: Uri, state: Arc<AppState>) -> Response {
    match relay::resolve(uri.query(), &state.config) {
        Ok(key) => {
            let target = target::build_target_url(
                &state.config.upstream_ws_url,
                uri.path(),
                uri.query(),
                &key,
            );
            tracing::info!(upstream = %target::redacted(&target), "relay upgrade accepted");
            let limits = state.config.relay_limits();
            ws.on_upgrade(move |socket| session::run(socket, target, limits))
        }
        Err(err) => {
            tracing::warn!(path = %uri.path(), %err, "relay upgrade rejected");
            ws.on_upgrade(move |socket| reject(socket, err))
        }
    }
}

/// Close the freshly upgraded socket with the credential-required code.
/// No upstream connection is attempted.
async fn reject(mut socket: WebSocket, err: RelayError) {
    let frame = CloseFrame {
        code: session::CLOSE_CREDENTIAL_REQUIRED,
        reason: err.to_string().into(),
    };
    let _ = socket.send(ws::Message::Close(Some(frame))).await;
}
