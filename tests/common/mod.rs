//! Shared test helpers: a scriptable mock upstream WebSocket server and an
//! app harness that serves the relay router on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use url::Url;

use gemini_relay::{AppState, ServerConfig, routes};

/// Events observed by the mock upstream, in the order they happened.
#[derive(Debug)]
pub enum UpstreamEvent {
    /// A WebSocket handshake completed; `uri` is the full request target
    /// (path + query) the relay used.
    Connected { uri: String },
    /// A data frame arrived from the relay.
    Frame(Message),
    /// The relay closed the connection.
    Closed(Option<(u16, String)>),
}

/// Scripted behavior for the mock upstream.
#[derive(Debug, Clone, Default)]
pub struct MockUpstreamOptions {
    /// Hold the WebSocket handshake for this long before accepting, to keep
    /// relay sessions in their connecting phase.
    pub accept_delay: Option<Duration>,
    /// Frames to send to the relay immediately after accepting.
    pub greeting: Vec<Message>,
    /// Close the connection with this code/reason after the greeting.
    pub close_with: Option<(u16, String)>,
}

/// Spawn a mock upstream WebSocket server on an ephemeral port.
pub async fn spawn_mock_upstream(
    options: MockUpstreamOptions,
) -> (SocketAddr, mpsc::UnboundedReceiver<UpstreamEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("mock upstream addr");
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _peer)) = listener.accept().await {
            let events = events_tx.clone();
            let options = options.clone();
            tokio::spawn(handle_upstream_connection(stream, options, events));
        }
    });

    (addr, events_rx)
}

async fn handle_upstream_connection(
    stream: TcpStream,
    options: MockUpstreamOptions,
    events: mpsc::UnboundedSender<UpstreamEvent>,
) {
    if let Some(delay) = options.accept_delay {
        tokio::time::sleep(delay).await;
    }

    let events_cb = events.clone();
    let callback =
        move |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let _ = events_cb.send(UpstreamEvent::Connected {
                uri: req.uri().to_string(),
            });
            Ok(response)
        };

    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };
    let (mut write, mut read) = ws.split();

    for frame in &options.greeting {
        if write.send(frame.clone()).await.is_err() {
            return;
        }
    }
    if let Some((code, reason)) = &options.close_with {
        let _ = write
            .send(Message::Close(Some(CloseFrame {
                code: (*code).into(),
                reason: reason.clone().into(),
            })))
            .await;
    }

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Close(frame)) => {
                let _ = events.send(UpstreamEvent::Closed(
                    frame.map(|f| (u16::from(f.code), f.reason.to_string())),
                ));
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(frame) => {
                let _ = events.send(UpstreamEvent::Frame(frame));
            }
            Err(_) => break,
        }
    }
}

/// A relay config pointed at the given mock upstream.
pub fn test_config(upstream: SocketAddr) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.upstream_ws_url = Url::parse(&format!("ws://{upstream}")).expect("upstream url");
    config.upstream_connect_timeout = Duration::from_secs(5);
    config
}

/// Serve the application router on an ephemeral port.
pub async fn spawn_app(config: ServerConfig) -> SocketAddr {
    let app = routes::build_router(Arc::new(AppState::new(config)));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind app");
    let addr = listener.local_addr().expect("app addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Connect a WebSocket client to the relay.
pub async fn connect_client(
    app: SocketAddr,
    path_and_query: &str,
) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>> {
    let (ws, _response) = tokio_tungstenite::connect_async(format!("ws://{app}{path_and_query}"))
        .await
        .expect("client connect");
    ws
}

/// Wait for the next event from the mock upstream, with a deadline.
pub async fn next_event(
    events: &mut mpsc::UnboundedReceiver<UpstreamEvent>,
) -> UpstreamEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for upstream event")
        .expect("upstream event channel closed")
}
