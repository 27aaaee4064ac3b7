use crate::domain::{ParticipantId, Position};
use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::protocol::{
    ClientMessage, NoticeDto, ServerMessage, StateDto,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::rand_id;
use crate::use_cases::{Envelope, LobbyHandle, LobbyRegistry, SessionEvent, StateUpdate};

use axum::{
    Error, Json,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    InputClosed,
    StateClosed,
    NotificationsClosed,
    JoinRequired,
    JoinTimeout,
    ClosedBeforeJoin,
}

#[derive(Debug, serde::Deserialize)]
pub struct LobbyQuery {
    // The lobby id the client wants to join.
    #[serde(default)]
    lobby_id: Option<String>,
}

enum LoopControl {
    Continue,
    Disconnect,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_DISPLAY_NAME: &str = "Player";

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LobbyQuery>,
) -> impl IntoResponse {
    let lobby_id = query
        .lobby_id
        .unwrap_or_else(|| state.default_lobby_id.to_string());

    if state.lobby_registry.get_lobby(&lobby_id).await.is_none() {
        // Keep not-found responses consistent with the JSON error schema.
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "lobby not found".to_string(),
            }),
        )
            .into_response();
    }

    let lobby_registry = state.lobby_registry.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, lobby_id, lobby_registry))
}

async fn handle_socket(socket: WebSocket, lobby_id: String, lobby_registry: Arc<LobbyRegistry>) {
    // Separate connection id for correlating logs before/after a player_id exists.
    let conn_id = rand_id();
    let span = info_span!("conn", conn_id, player_id = tracing::field::Empty);
    serve_connection(socket, lobby_id, lobby_registry, span.clone())
        .instrument(span)
        .await
}

async fn serve_connection(
    mut socket: WebSocket,
    lobby_id: String,
    lobby_registry: Arc<LobbyRegistry>,
    span: Span,
) {
    // Register first so the lobby cannot be recycled under a half-open connection.
    let Some(lobby) = lobby_registry.register_connection(&lobby_id).await else {
        // The lobby can be removed between lookup and upgrade.
        warn!(lobby_id = %lobby_id, "lobby missing during connection registration");
        let _ = send_close_with_reason(&mut socket, close_code::POLICY, "lobby unavailable").await;
        return;
    };

    let mut ctx = match bootstrap_connection(&mut socket, &lobby).await {
        Ok(ctx) => ctx,
        Err(e) => {
            match e {
                NetError::ClosedBeforeJoin => info!("client disconnected before join handshake"),
                e => error!(error = ?e, "failed to bootstrap connection"),
            }
            lobby_registry.register_disconnect(&lobby_id).await;
            return;
        }
    };

    span.record("player_id", ctx.participant_id);
    info!(
        player_id = ctx.participant_id,
        lobby_id = %lobby.lobby_id,
        display_name = %ctx.display_name,
        "client connected"
    );

    // Main Client Loop
    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }

    if let Err(e) = disconnect_cleanup(&ctx, &lobby_registry).await {
        warn!(error = ?e, "error during disconnect cleanup");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    // Serialize message safely; log JSON errors instead of panicking
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

struct ConnCtx {
    pub participant_id: ParticipantId,
    // Name from Join; used when Ready arrives without one.
    pub display_name: String,
    pub lobby: LobbyHandle,
    pub input_tx: mpsc::Sender<SessionEvent>,
    pub state_rx: broadcast::Receiver<StateUpdate>,
    pub notify_rx: broadcast::Receiver<Envelope>,
    // Count lag recovery snapshots sent to this client.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,
    pub rejected: u32,

    pub last_input_full_log: Instant,
    pub last_state_lag_log: Instant,
    pub last_invalid_input_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

#[derive(Debug)]
struct JoinHandshake {
    display_name: String,
    bytes_in: u64,
    msgs_in: u64,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    lobby: &LobbyHandle,
) -> Result<ConnCtx, NetError> {
    // Subscribe to updates *before* doing anything else (awaits) to not miss packets.
    let state_rx = lobby.state_tx.subscribe();
    let notify_rx = lobby.notify_tx.subscribe();

    let join = match timeout(JOIN_HANDSHAKE_TIMEOUT, read_join_handshake(socket)).await {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };

    // Handshake & ID Assignment
    let participant_id = rand_id();
    lobby
        .input_tx
        .send(SessionEvent::Join { participant_id })
        .await
        .map_err(|_| NetError::InputClosed)?;

    let bytes_out = match send_welcome(socket, participant_id, lobby).await {
        Ok(bytes) => bytes,
        Err(e) => {
            // Compensate so the session does not keep a participant that never connected.
            let _ = lobby
                .input_tx
                .send(SessionEvent::Leave { participant_id })
                .await;
            return Err(e);
        }
    };

    let now = Instant::now()
        .checked_sub(LOG_THROTTLE)
        .unwrap_or_else(Instant::now);
    Ok(ConnCtx {
        participant_id,
        display_name: join.display_name,
        lobby: lobby.clone(),
        input_tx: lobby.input_tx.clone(),
        state_rx,
        notify_rx,
        lag_recovery_count: 0,

        msgs_in: join.msgs_in,
        msgs_out: 2,
        bytes_in: join.bytes_in,
        bytes_out: bytes_out as u64,

        invalid_json: 0,
        rejected: 0,

        last_input_full_log: now,
        last_state_lag_log: now,
        last_invalid_input_log: now,

        close_frame: None,
    })
}

// Tell the client "This is who you are", then give it the full state.
async fn send_welcome(
    socket: &mut WebSocket,
    participant_id: ParticipantId,
    lobby: &LobbyHandle,
) -> Result<usize, NetError> {
    let identity_msg = ServerMessage::Identity {
        player_id: participant_id.to_string(),
    };
    let mut bytes_out = send_message(socket, &identity_msg).await?;
    bytes_out += send_message(socket, &snapshot_message(lobby)).await?;
    Ok(bytes_out)
}

fn snapshot_message(lobby: &LobbyHandle) -> ServerMessage {
    ServerMessage::Snapshot {
        updates: lobby
            .replicas
            .snapshot()
            .into_iter()
            .map(StateDto::from)
            .collect(),
    }
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

async fn read_join_handshake(socket: &mut WebSocket) -> Result<JoinHandshake, NetError> {
    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        let message = incoming.map_err(NetError::Ws)?;
        match message {
            Message::Text(text) => {
                let bytes_in = text.len() as u64;
                let payload = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(payload)) => payload,
                    Ok(_) => {
                        let _ = send_close_with_reason(socket, close_code::POLICY, "join required")
                            .await;
                        return Err(NetError::JoinRequired);
                    }
                    Err(_) => {
                        let _ = send_close_with_reason(
                            socket,
                            close_code::POLICY,
                            "invalid join payload",
                        )
                        .await;
                        return Err(NetError::JoinRequired);
                    }
                };

                let display_name = payload
                    .display_name
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());

                return Ok(JoinHandshake {
                    display_name,
                    bytes_in,
                    msgs_in: 1,
                });
            }
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRequired);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

/// Maps a decoded client message onto a session event. `Err` carries the reason
/// the message was dropped.
fn to_session_event(
    participant_id: ParticipantId,
    message: ClientMessage,
    fallback_name: &str,
) -> Result<SessionEvent, &'static str> {
    let event = match message {
        ClientMessage::Join(_) => return Err("duplicate join"),
        ClientMessage::Ready(payload) => {
            let display_name = if payload.display_name.trim().is_empty() {
                fallback_name.to_string()
            } else {
                payload.display_name
            };
            SessionEvent::Ready {
                participant_id,
                display_name,
            }
        }
        ClientMessage::Move(payload) => {
            if !payload.x.is_finite() || !payload.y.is_finite() {
                return Err("non-finite position");
            }
            SessionEvent::Move {
                participant_id,
                position: Position::new(payload.x, payload.y),
            }
        }
        ClientMessage::SelectUpgrade(payload) => SessionEvent::SelectUpgrade {
            participant_id,
            index: payload.index,
        },
        ClientMessage::EnemyKilled(payload) => SessionEvent::EnemyKilled {
            participant_id,
            enemy_id: payload.enemy_id.parse().map_err(|_| "invalid enemy id")?,
        },
        ClientMessage::Hit(payload) => SessionEvent::PlayerHit {
            participant_id,
            enemy_id: match payload.enemy_id {
                Some(id) => Some(id.parse().map_err(|_| "invalid enemy id")?),
                None => None,
            },
        },
        ClientMessage::LeftBounds => SessionEvent::LeftBounds { participant_id },
        ClientMessage::ReturnedToBounds => SessionEvent::ReturnedToBounds { participant_id },
    };
    Ok(event)
}

// Positions are high-rate and droppable; everything else must reach the session.
async fn forward_event(
    participant_id: ParticipantId,
    input_tx: &mpsc::Sender<SessionEvent>,
    event: SessionEvent,
    last_input_full_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    if matches!(event, SessionEvent::Move { .. }) {
        return match input_tx.try_send(event) {
            Ok(()) => Ok(LoopControl::Continue),
            Err(mpsc::error::TrySendError::Full(_evt)) => {
                if should_log(last_input_full_log) {
                    warn!(player_id = participant_id, "input channel full; dropping position");
                }
                Ok(LoopControl::Continue)
            }
            Err(mpsc::error::TrySendError::Closed(_evt)) => Err(NetError::InputClosed),
        };
    }

    input_tx
        .send(event)
        .await
        .map_err(|_| NetError::InputClosed)?;
    Ok(LoopControl::Continue)
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let participant_id = ctx.participant_id;

    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        display_name,
        lobby,
        input_tx,
        state_rx,
        notify_rx,
        lag_recovery_count,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        rejected,
        last_input_full_log,
        last_state_lag_log,
        last_invalid_input_log,
        close_frame,
        ..
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    participant_id,
                    display_name,
                    input_tx,
                    msgs_in,
                    bytes_in,
                    invalid_json,
                    rejected,
                    last_input_full_log,
                    last_invalid_input_log,
                    close_frame,
                ).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing replicated state
            update = state_rx.recv() => {
                match update {
                    Ok(update) => {
                        let msg = ServerMessage::State(update.into());
                        let outcome = forward(socket, &msg, msgs_out, bytes_out).await;
                        matches!(outcome, LoopControl::Disconnect)
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(last_state_lag_log) {
                            warn!(missed = n, "state updates lagged; sending snapshot");
                        }
                        // Resync strategy: send every replicated value again.
                        *lag_recovery_count += 1;
                        let msg = snapshot_message(lobby);
                        let outcome = forward(socket, &msg, msgs_out, bytes_out).await;
                        debug!(
                            player_id = participant_id,
                            count = *lag_recovery_count,
                            "sent lag recovery snapshot"
                        );
                        matches!(outcome, LoopControl::Disconnect)
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::StateClosed);
                        true
                    }
                }
            }

            // Outgoing one-shot notifications addressed to this participant
            envelope = notify_rx.recv() => {
                match envelope {
                    Ok(envelope) if envelope.audience.includes(participant_id) => {
                        let msg = ServerMessage::Notice(NoticeDto::from(envelope.notification));
                        let outcome = forward(socket, &msg, msgs_out, bytes_out).await;
                        matches!(outcome, LoopControl::Disconnect)
                    }
                    Ok(_) => false,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Missed spawns and despawns are covered by the replicated enemy list.
                        warn!(
                            player_id = participant_id,
                            missed = n,
                            "notifications lagged; sending snapshot"
                        );
                        *lag_recovery_count += 1;
                        let msg = snapshot_message(lobby);
                        let outcome = forward(socket, &msg, msgs_out, bytes_out).await;
                        matches!(outcome, LoopControl::Disconnect)
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::NotificationsClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    participant_id: ParticipantId,
    display_name: &str,
    input_tx: &mpsc::Sender<SessionEvent>,
    msgs_in: &mut u64,
    bytes_in: &mut u64,
    invalid_json: &mut u32,
    rejected: &mut u32,
    last_input_full_log: &mut Instant,
    last_invalid_input_log: &mut Instant,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                *msgs_in += 1;
                *bytes_in += text.len() as u64;

                let message = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => message,
                    Err(parse_err) => {
                        *invalid_json += 1;
                        if should_log(last_invalid_input_log) {
                            warn!(
                                player_id = participant_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if *invalid_json > MAX_INVALID_JSON {
                            *close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }
                        return Ok(LoopControl::Continue);
                    }
                };

                match to_session_event(participant_id, message, display_name) {
                    Ok(event) => {
                        forward_event(participant_id, input_tx, event, last_input_full_log).await
                    }
                    Err(reason) => {
                        *rejected += 1;
                        if should_log(last_invalid_input_log) {
                            warn!(player_id = participant_id, reason, "client message dropped");
                        }
                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(player_id = participant_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(player_id = participant_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward(
    socket: &mut WebSocket,
    msg: &ServerMessage,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    match send_message(socket, msg).await {
        Ok(bytes) => {
            *msgs_out += 1;
            *bytes_out += bytes as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send message");
            LoopControl::Disconnect
        }
    }
}

async fn disconnect_cleanup(
    ctx: &ConnCtx,
    lobby_registry: &Arc<LobbyRegistry>,
) -> Result<(), NetError> {
    let participant_id = ctx.participant_id;
    // Remove the participant before the lobby may be recycled.
    let left = ctx
        .input_tx
        .send(SessionEvent::Leave { participant_id })
        .await
        .map_err(|_| NetError::InputClosed);

    lobby_registry.register_disconnect(&ctx.lobby.lobby_id).await;

    debug!(
        player_id = participant_id,
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_json = ctx.invalid_json,
        rejected = ctx.rejected,
        lag_recovery_count = ctx.lag_recovery_count,
        "connection stats"
    );
    info!(player_id = participant_id, "client disconnected");
    left
}
