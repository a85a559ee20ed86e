use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::TokenError;
use crate::error::{CommandError, LifecycleError, ServerError};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::race::engine::EngineCommand;
use crate::AppState;

pub async fn upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drives the `player:authenticate` → `race:join`/`race:command` data flow
/// of §2/§6 for one socket. Grounded in shape on the reference server's
/// `handle_websocket_connection` split-sink loop, generalized from a single
/// shared race to the connection registry's per-socket/per-race routing.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (socket_id, mut outbound_rx, kill) = state.connections.register();
    let mut player_id: Option<Uuid> = None;

    loop {
        tokio::select! {
            _ = kill.notified() => {
                debug!(%socket_id, "socket killed by registry");
                break;
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(message) => {
                        if send(&mut sink, &message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        state.connections.touch_keepalive(socket_id);
                        let outcome = handle_client_message(&state, socket_id, &mut player_id, &text).await;
                        match outcome {
                            Ok(Some(reply)) => {
                                if send(&mut sink, &reply).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(err) => {
                                if send(&mut sink, &ServerMessage::Error(err.to_frame())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        state.connections.touch_keepalive(socket_id);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%socket_id, %err, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    if let Some(player_id) = player_id {
        info!(%socket_id, %player_id, "socket disconnected");
    }
    state.connections.remove(socket_id);
}

async fn send(sink: &mut (impl futures_util::Sink<Message> + Unpin), message: &ServerMessage) -> Result<(), ()> {
    let Ok(text) = serde_json::to_string(message) else { return Err(()) };
    sink.send(Message::Text(text.into())).await.map_err(|_| ())
}

/// Handles one decoded client frame, returning a reply to send back on this
/// socket directly (`Ok(Some(..))`), nothing (`Ok(None)`), or an error to be
/// rendered as an `error` frame. `command:result{success=false}` is handled
/// inline rather than propagated, per §7's command-error-vs-generic-error
/// split.
async fn handle_client_message(
    state: &Arc<AppState>,
    socket_id: Uuid,
    player_id: &mut Option<Uuid>,
    text: &str,
) -> Result<Option<ServerMessage>, ServerError> {
    let message: ClientMessage =
        serde_json::from_str(text).map_err(|e| ServerError::AuthFailed(format!("malformed frame: {e}")))?;

    match message {
        ClientMessage::Authenticate { token } => {
            let resolved = state.auth.resolve(&token).map_err(|e| match e {
                TokenError::Expired => ServerError::AuthFailed("token expired".into()),
                TokenError::Invalid => ServerError::AuthFailed("invalid token".into()),
            })?;
            state.connections.authenticate(socket_id, resolved);
            *player_id = Some(resolved);
            Ok(Some(ServerMessage::Authenticated { player_id: resolved }))
        }
        ClientMessage::Join { race_id, car_id } => {
            let player_id = player_id.ok_or_else(|| ServerError::JoinFailed("not authenticated".into()))?;
            let handle = state.races.get(race_id).ok_or_else(|| ServerError::JoinFailed(format!("race not found: {race_id}")))?;
            let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
            handle
                .mailbox
                .send(EngineCommand::AddParticipant { player_id, car_id, reply: reply_tx })
                .await
                .map_err(|_| ServerError::JoinFailed("race engine unavailable".into()))?;
            reply_rx
                .await
                .map_err(|_| ServerError::JoinFailed("race engine did not reply".into()))?
                .map_err(|e| ServerError::JoinFailed(e.to_string()))?;
            if let Some(pool) = &state.db {
                if let Err(err) = crate::database::queries::add_participant(pool, race_id, player_id, car_id).await {
                    warn!(%err, "failed to persist race participant (engine still runs in-memory)");
                }
            }
            state.connections.join_race(socket_id, race_id);
            Ok(Some(ServerMessage::State { full_race_state: handle.state.borrow().clone() }))
        }
        ClientMessage::Leave { race_id } => {
            let player_id = player_id.ok_or_else(|| ServerError::LeaveFailed("not authenticated".into()))?;
            if let Some(handle) = state.races.get(race_id) {
                let _ = handle.mailbox.send(EngineCommand::RemoveParticipant { player_id }).await;
            }
            state.connections.leave_race(socket_id);
            Ok(None)
        }
        ClientMessage::Command { text } => {
            let player_id = player_id.ok_or_else(|| ServerError::AuthFailed("not authenticated".into()))?;
            let race_id = state
                .connections
                .race_for_socket(socket_id)
                .ok_or_else(|| ServerError::Lifecycle(LifecycleError::RaceNotFound("socket has not joined a race".into())))?;
            let handle = state
                .races
                .get(race_id)
                .ok_or_else(|| ServerError::Lifecycle(LifecycleError::RaceNotFound(race_id.to_string())))?;

            let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
            handle
                .mailbox
                .send(EngineCommand::SubmitCommand { player_id, text, reply: reply_tx })
                .await
                .map_err(|_| ServerError::Command(CommandError::CommandFailed("mailbox closed".into())))?;
            let outcome = reply_rx.await.map_err(|_| ServerError::Command(CommandError::CommandFailed("no reply".into())))?;

            match outcome {
                Ok(()) => Ok(Some(ServerMessage::CommandResult { success: true, message: None })),
                Err(ServerError::Command(command_err)) => {
                    Ok(Some(ServerMessage::CommandResult { success: false, message: Some(command_err.to_string()) }))
                }
                Err(other) => Err(other),
            }
        }
    }
}
