//! Per-connection relay session.
//!
//! A session owns exactly one client WebSocket and at most one upstream
//! WebSocket. The client side is accepted synchronously; the upstream
//! handshake runs on a helper task and reports back over a oneshot channel,
//! so the client never blocks on upstream readiness. A single `select!`
//! loop drives both directions, which makes the ordering guarantee
//! structural: pending frames are drained before any later client frame can
//! be forwarded.
//!
//! Lifecycle: `Connecting -> Open -> Closing -> Closed`. Closing either
//! endpoint forces the other closed with the peer's code and reason. There
//! is no retry or reconnect at any point; upstream failure is terminal for
//! the session.

use std::collections::VecDeque;
use std::time::Duration;

use axum::extract::ws::{self, CloseFrame, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::protocol;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};
use url::Url;
use uuid::Uuid;

use crate::core::relay::{RelayError, target};

/// Close code sent when no credential resolves for an upgrade request.
pub const CLOSE_CREDENTIAL_REQUIRED: u16 = 1008;

/// Close code sent when the upstream handshake fails or times out.
pub const CLOSE_UPSTREAM_FAILURE: u16 = 1011;

/// Close code sent when the pending-frame queue hits its cap.
pub const CLOSE_QUEUE_OVERFLOW: u16 = 1013;

const CLOSE_NORMAL: u16 = 1000;
const UPSTREAM_CLOSED_REASON: &str = "upstream closed";
const UPSTREAM_FAILURE_REASON: &str = "upstream connection failed";
const QUEUE_OVERFLOW_REASON: &str = "pending frame queue overflow";

type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type UpstreamSink = SplitSink<UpstreamStream, tungstenite::Message>;
type UpstreamSource = SplitStream<UpstreamStream>;
type ClientSink = SplitSink<WebSocket, ws::Message>;

/// Bounds on a relay session beyond the reference behavior: the upstream
/// handshake must complete within `connect_timeout`, and at most
/// `max_pending_frames` client frames may queue while it does.
#[derive(Debug, Clone, Copy)]
pub struct RelayLimits {
    pub connect_timeout: Duration,
    pub max_pending_frames: usize,
}

impl Default for RelayLimits {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_pending_frames: 512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Client accepted, upstream handshake in flight; client frames queue.
    Connecting,
    /// Both ends up; frames forward in both directions.
    Open,
    /// Client went away while the upstream handshake was still in flight;
    /// waiting for it to resolve so the close can be propagated.
    Closing,
    /// Terminal.
    Closed,
}

/// Client-side events after normalization, so text and binary frames share
/// one forwarding path.
enum ClientEvent {
    Frame(tungstenite::Message),
    Close(Option<(u16, String)>),
    Gone,
    Ignore,
}

/// Drive one relay session to completion.
///
/// Consumes the upgraded client socket and the fully resolved upstream
/// address (credential already injected, see
/// [`target::build_target_url`]).
pub async fn run(socket: WebSocket, target: Url, limits: RelayLimits) {
    let session_id = Uuid::new_v4();
    tracing::info!(%session_id, upstream = %target::redacted(&target), "relay session starting");

    let (mut client_sink, mut client_source) = socket.split();

    // One upstream connection attempt per session, bounded by the connect
    // timeout. The helper task reports the outcome over a oneshot channel.
    let (connect_tx, mut connect_rx) = oneshot::channel();
    {
        let connect_timeout = limits.connect_timeout;
        let target = target.clone();
        tokio::spawn(async move {
            let outcome =
                match tokio::time::timeout(connect_timeout, connect_async(target.as_str())).await {
                    Ok(Ok((stream, _response))) => Ok(stream),
                    Ok(Err(err)) => Err(RelayError::UpstreamConnect(err.to_string())),
                    Err(_) => Err(RelayError::UpstreamConnectTimeout(connect_timeout)),
                };
            let _ = connect_tx.send(outcome);
        });
    }

    let mut state = SessionState::Connecting;
    let mut pending: VecDeque<tungstenite::Message> = VecDeque::new();
    let mut client_close: Option<(u16, String)> = None;
    let mut client_done = false;
    let mut upstream_sink: Option<UpstreamSink> = None;
    let mut upstream_source: Option<UpstreamSource> = None;

    loop {
        tokio::select! {
            outcome = &mut connect_rx, if upstream_sink.is_none() && state != SessionState::Closed => {
                match outcome {
                    Ok(Ok(stream)) => {
                        let (mut sink, source) = stream.split();
                        if state == SessionState::Closing {
                            // Client already went away; propagate its close
                            // to the now-open upstream and stop.
                            let (code, reason) =
                                client_close.take().unwrap_or((CLOSE_NORMAL, String::new()));
                            let _ = sink.send(upstream_close(code, &reason)).await;
                            state = SessionState::Closed;
                            break;
                        }

                        tracing::debug!(
                            %session_id,
                            queued = pending.len(),
                            "upstream connected, draining pending frames"
                        );
                        let mut drain_failed = false;
                        while let Some(frame) = pending.pop_front() {
                            if sink.send(frame).await.is_err() {
                                drain_failed = true;
                                break;
                            }
                        }
                        if drain_failed {
                            tracing::warn!(%session_id, "upstream write failed while draining queue");
                            close_client(&mut client_sink, CLOSE_UPSTREAM_FAILURE, UPSTREAM_FAILURE_REASON).await;
                            state = SessionState::Closed;
                            break;
                        }
                        upstream_sink = Some(sink);
                        upstream_source = Some(source);
                        state = SessionState::Open;
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(%session_id, %err, "upstream connect failed");
                        close_client(&mut client_sink, CLOSE_UPSTREAM_FAILURE, UPSTREAM_FAILURE_REASON).await;
                        state = SessionState::Closed;
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(%session_id, "upstream connect task dropped");
                        close_client(&mut client_sink, CLOSE_UPSTREAM_FAILURE, UPSTREAM_FAILURE_REASON).await;
                        state = SessionState::Closed;
                        break;
                    }
                }
            }

            frame = client_source.next(), if !client_done => {
                let event = match frame {
                    Some(Ok(ws::Message::Text(text))) => {
                        ClientEvent::Frame(tungstenite::Message::Text(text.as_str().into()))
                    }
                    Some(Ok(ws::Message::Binary(data))) => {
                        ClientEvent::Frame(tungstenite::Message::Binary(data))
                    }
                    Some(Ok(ws::Message::Close(frame))) => {
                        ClientEvent::Close(frame.map(|f| (f.code, f.reason.to_string())))
                    }
                    // Ping/pong keepalives are answered per hop by the
                    // protocol layer and are not relayed.
                    Some(Ok(_)) => ClientEvent::Ignore,
                    Some(Err(err)) => {
                        tracing::debug!(%session_id, %err, "client read error");
                        ClientEvent::Gone
                    }
                    None => ClientEvent::Gone,
                };

                match event {
                    ClientEvent::Frame(frame) => match state {
                        SessionState::Connecting => {
                            if pending.len() >= limits.max_pending_frames {
                                let err = RelayError::QueueOverflow;
                                tracing::warn!(
                                    %session_id,
                                    limit = limits.max_pending_frames,
                                    %err,
                                    "closing session"
                                );
                                close_client(&mut client_sink, CLOSE_QUEUE_OVERFLOW, QUEUE_OVERFLOW_REASON).await;
                                state = SessionState::Closed;
                                break;
                            }
                            pending.push_back(frame);
                        }
                        SessionState::Open => {
                            if let Some(sink) = upstream_sink.as_mut()
                                && sink.send(frame).await.is_err()
                            {
                                tracing::warn!(%session_id, "upstream write failed");
                                close_client(&mut client_sink, CLOSE_UPSTREAM_FAILURE, UPSTREAM_FAILURE_REASON).await;
                                state = SessionState::Closed;
                                break;
                            }
                        }
                        // Late frames after a close are dropped.
                        SessionState::Closing | SessionState::Closed => {}
                    },
                    ClientEvent::Close(frame) => {
                        let (code, reason) = frame.unwrap_or((CLOSE_NORMAL, String::new()));
                        tracing::info!(%session_id, code, "client closed");
                        client_done = true;
                        match state {
                            SessionState::Open => {
                                if let Some(sink) = upstream_sink.as_mut() {
                                    let _ = sink.send(upstream_close(code, &reason)).await;
                                }
                                state = SessionState::Closed;
                                break;
                            }
                            SessionState::Connecting => {
                                // The upstream handshake is still in flight;
                                // remember the close so it can be forwarded
                                // once the attempt resolves.
                                client_close = Some((code, reason));
                                pending.clear();
                                state = SessionState::Closing;
                            }
                            SessionState::Closing | SessionState::Closed => {
                                state = SessionState::Closed;
                                break;
                            }
                        }
                    }
                    ClientEvent::Gone => {
                        client_done = true;
                        match state {
                            SessionState::Open => {
                                if let Some(sink) = upstream_sink.as_mut() {
                                    let _ = sink.send(upstream_close(CLOSE_NORMAL, "")).await;
                                }
                                state = SessionState::Closed;
                                break;
                            }
                            SessionState::Connecting => {
                                client_close = Some((CLOSE_NORMAL, String::new()));
                                pending.clear();
                                state = SessionState::Closing;
                            }
                            SessionState::Closing | SessionState::Closed => {}
                        }
                    }
                    ClientEvent::Ignore => {}
                }
            }

            frame = next_upstream_frame(&mut upstream_source), if upstream_source.is_some() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if client_sink.send(ws::Message::Text(text.as_str().into())).await.is_err() {
                            if let Some(sink) = upstream_sink.as_mut() {
                                let _ = sink.send(upstream_close(CLOSE_NORMAL, "")).await;
                            }
                            state = SessionState::Closed;
                            break;
                        }
                    }
                    Some(Ok(tungstenite::Message::Binary(data))) => {
                        if client_sink.send(ws::Message::Binary(data)).await.is_err() {
                            if let Some(sink) = upstream_sink.as_mut() {
                                let _ = sink.send(upstream_close(CLOSE_NORMAL, "")).await;
                            }
                            state = SessionState::Closed;
                            break;
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.to_string()))
                            .unwrap_or((CLOSE_NORMAL, String::new()));
                        let reason = if reason.is_empty() {
                            UPSTREAM_CLOSED_REASON.to_string()
                        } else {
                            reason
                        };
                        tracing::info!(%session_id, code, %reason, "upstream closed");
                        close_client(&mut client_sink, code, &reason).await;
                        state = SessionState::Closed;
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::warn!(%session_id, %err, "upstream read error");
                        close_client(&mut client_sink, CLOSE_UPSTREAM_FAILURE, UPSTREAM_FAILURE_REASON).await;
                        state = SessionState::Closed;
                        break;
                    }
                    None => {
                        tracing::debug!(%session_id, "upstream stream ended");
                        close_client(&mut client_sink, CLOSE_NORMAL, UPSTREAM_CLOSED_REASON).await;
                        state = SessionState::Closed;
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!(%session_id, ?state, "relay session finished");
}

/// Poll the upstream read half when present; otherwise park the arm.
async fn next_upstream_frame(
    source: &mut Option<UpstreamSource>,
) -> Option<Result<tungstenite::Message, tungstenite::Error>> {
    match source.as_mut() {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn close_client(sink: &mut ClientSink, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_owned().into(),
    };
    let _ = sink.send(ws::Message::Close(Some(frame))).await;
}

fn upstream_close(code: u16, reason: &str) -> tungstenite::Message {
    tungstenite::Message::Close(Some(protocol::CloseFrame {
        code: CloseCode::from(code),
        reason: reason.to_owned().into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let limits = RelayLimits::default();
        assert_eq!(limits.connect_timeout, Duration::from_secs(10));
        assert_eq!(limits.max_pending_frames, 512);
    }

    #[test]
    fn close_codes_are_distinct() {
        assert_ne!(CLOSE_CREDENTIAL_REQUIRED, CLOSE_UPSTREAM_FAILURE);
        assert_ne!(CLOSE_CREDENTIAL_REQUIRED, CLOSE_QUEUE_OVERFLOW);
        assert_ne!(CLOSE_UPSTREAM_FAILURE, CLOSE_QUEUE_OVERFLOW);
    }

    #[test]
    fn upstream_close_round_trips_the_code() {
        let msg = upstream_close(1011, "bye");
        match msg {
            tungstenite::Message::Close(Some(frame)) => {
                assert_eq!(u16::from(frame.code), 1011);
                assert_eq!(frame.reason.as_str(), "bye");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}
