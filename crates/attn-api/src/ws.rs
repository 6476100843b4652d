//! Live meeting WebSocket.
//!
//! A connection subscribes to one meeting. Hub messages are forwarded by a
//! writer task that also sends heartbeat pings; inbound `frame` messages are
//! fed to the pipeline.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use attn_hub::Outbound;
use attn_models::{ClientMessage, MeetingId, ParticipantAction, SubscriberId, WsMessage};

use crate::error::ApiResult;
use crate::handlers::frames::{build_frame, parse_meeting_id};
use crate::metrics;
use crate::state::AppState;

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

/// GET /ws/meetings/:meeting_id
pub async fn ws_meeting(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> ApiResult<Response> {
    let meeting_id = parse_meeting_id(&meeting_id)?;

    let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(count);
    metrics::record_ws_connection();

    Ok(ws.on_upgrade(move |socket| async move {
        handle_socket(socket, state, meeting_id).await;
        let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    }))
}

async fn handle_socket(socket: WebSocket, state: AppState, meeting_id: MeetingId) {
    let subscriber_id = SubscriberId::new();
    let hub_rx = state.hub.subscribe(meeting_id.clone(), subscriber_id.clone());

    info!(
        meeting_id = %meeting_id,
        subscriber_id = %subscriber_id,
        "WebSocket subscriber joined"
    );
    state.hub.broadcast(
        &meeting_id,
        WsMessage::participant_update(
            meeting_id.clone(),
            ParticipantAction::Joined,
            subscriber_id.clone(),
        ),
    );

    let (sink, stream) = socket.split();
    let mut send_task = tokio::spawn(forward_outbound(sink, hub_rx, state.config.ws_heartbeat));
    let mut recv_task = tokio::spawn(read_inbound(stream, state.clone(), meeting_id.clone()));

    // Whichever side finishes first ends the connection
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.unsubscribe(&subscriber_id);
    state.hub.broadcast(
        &meeting_id,
        WsMessage::participant_update(
            meeting_id.clone(),
            ParticipantAction::Left,
            subscriber_id.clone(),
        ),
    );
    info!(
        meeting_id = %meeting_id,
        subscriber_id = %subscriber_id,
        "WebSocket subscriber left"
    );
}

/// Forward hub messages to the socket and keep it alive with pings.
async fn forward_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut hub_rx: mpsc::Receiver<Outbound>,
    heartbeat: Duration,
) {
    let mut ticker = tokio::time::interval(heartbeat);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            outbound = hub_rx.recv() => {
                // Hub dropped us, e.g. replaced by a newer subscription
                let Some(message) = outbound else { break };

                let json = match serde_json::to_string(message.as_ref()) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize hub message");
                        continue;
                    }
                };
                if sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
                metrics::record_ws_message_sent(message.message_type().as_str());
            }
            _ = ticker.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

async fn read_inbound(mut stream: SplitStream<WebSocket>, state: AppState, meeting_id: MeetingId) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                metrics::record_ws_message_received();
                handle_client_text(&state, &meeting_id, &text);
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {
                metrics::record_ws_message_malformed();
                debug!(meeting_id = %meeting_id, "Ignoring binary WebSocket message");
            }
            // Ping/pong are answered by axum
            Ok(_) => {}
            Err(e) => {
                debug!(meeting_id = %meeting_id, error = %e, "WebSocket read failed");
                break;
            }
        }
    }
}

/// Handle one text message from a client. Malformed input is logged and dropped.
fn handle_client_text(state: &AppState, meeting_id: &MeetingId, text: &str) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            metrics::record_ws_message_malformed();
            warn!(meeting_id = %meeting_id, error = %e, "Malformed WebSocket message dropped");
            return;
        }
    };

    match message {
        ClientMessage::Frame {
            frame_data,
            timestamp_ms,
        } => match build_frame(meeting_id.clone(), &frame_data, timestamp_ms) {
            Ok(frame) => {
                let accepted = state.pool.submit(frame);
                metrics::record_frame_ingested("ws", accepted);
            }
            Err(e) => {
                metrics::record_ws_message_malformed();
                warn!(meeting_id = %meeting_id, error = %e, "Undecodable frame dropped");
            }
        },
        ClientMessage::Ping => {}
    }
}
