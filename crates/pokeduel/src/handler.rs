//! Per-connection handler: handshake, auth, and request routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Authenticate token → get the user's Identity
//!   3. Send HandshakeAck → register the connection's outbox
//!   4. Loop: inbound requests and outbound room events, side by side
//!
//! Replies are not written to the socket directly. They are pushed into
//! the connection's own outbox, the same channel room broadcasts use, so
//! the client sees everything in the order the room produced it.

use std::sync::Arc;

use pokeduel_protocol::{
    ClientMessage, Codec, ConnectionId, Envelope, ErrorKind, ProtocolError, RoomId,
    ServerMessage, UserId,
};
use pokeduel_room::{ConnectionSender, RoomError, Selection, resolve_team};
use pokeduel_services::{Backend, Identity};
use pokeduel_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::PokeduelError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// Drop guard that detaches a connection from its rooms when the handler
/// exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct ConnectionGuard<B: Backend, C: Codec> {
    connection: ConnectionId,
    state: Arc<ServerState<B, C>>,
}

impl<B: Backend, C: Codec> Drop for ConnectionGuard<B, C> {
    fn drop(&mut self) {
        let connection = self.connection;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.rooms.lock().await.detach_connection(connection);
        });
    }
}

/// Whether the message loop keeps going after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<B, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<B, C>>,
) -> Result<(), PokeduelError>
where
    B: Backend,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Handshake ---
    let identity = perform_handshake(&conn, &state).await?;
    tracing::info!(%conn_id, user_id = %identity.user_id, "player authenticated");

    let (tx, mut outbox) = mpsc::unbounded_channel();
    state.rooms.lock().await.register_connection(conn_id, tx.clone());
    let _guard = ConnectionGuard {
        connection: conn_id,
        state: Arc::clone(&state),
    };

    // --- Step 2: Message loop ---
    let mut seq: u64 = 1;
    let idle_timeout = state.config.idle_timeout;
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(tokio::time::Instant::now() + idle_timeout);

                let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                        reply_error(&tx, 400, ErrorKind::Protocol, format!("invalid message: {e}"));
                        continue;
                    }
                };

                match handle_request(&state, &identity, conn_id, &tx, envelope.message).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Close) => break,
                    Err(e) => {
                        tracing::debug!(%conn_id, user_id = %identity.user_id, error = %e, "request rejected");
                        reply_error(&tx, e.code(), e.kind(), e.to_string());
                    }
                }
            }

            Some(message) = outbox.recv() => {
                send_message(&conn, &state, &mut seq, message).await?;
            }

            () = &mut idle => {
                tracing::info!(%conn_id, "connection idle, dropping");
                break;
            }
        }
    }

    // Flush what is already queued, e.g. the reply to a `disconnect`.
    while let Ok(message) = outbox.try_recv() {
        if send_message(&conn, &state, &mut seq, message).await.is_err() {
            break;
        }
    }
    let _ = conn.close().await;

    // _guard drops here → the connection is detached from its rooms.
    Ok(())
}

/// Performs the initial handshake: receive Handshake, validate, auth,
/// send Ack.
async fn perform_handshake<B, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<B, C>>,
) -> Result<Identity, PokeduelError>
where
    B: Backend,
    C: Codec,
{
    let data = match tokio::time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(PokeduelError::Transport(e)),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            send_error(conn, state, 400, ErrorKind::Protocol, &format!("invalid handshake: {e}")).await?;
            return Err(e.into());
        }
    };

    let ClientMessage::Handshake { version, token } = envelope.message else {
        send_error(conn, state, 400, ErrorKind::Protocol, "expected handshake").await?;
        return Err(ProtocolError::InvalidMessage("first message must be handshake".into()).into());
    };

    if version != PROTOCOL_VERSION {
        let message = format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}");
        send_error(conn, state, 400, ErrorKind::Protocol, &message).await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let identity = match state.backend.authenticate(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            send_error(conn, state, 401, ErrorKind::Unauthorized, "unauthorized").await?;
            return Err(PokeduelError::Service(e));
        }
    };

    let ack = ServerMessage::HandshakeAck {
        user_id: identity.user_id.clone(),
        username: identity.username.clone(),
        server_time: state.elapsed_ms(),
    };
    let mut seq = 0;
    send_message(conn, state, &mut seq, ack).await?;

    Ok(identity)
}

/// Executes one request. Identity always comes from the authenticated
/// connection, never from the message.
async fn handle_request<B, C>(
    state: &Arc<ServerState<B, C>>,
    identity: &Identity,
    conn_id: ConnectionId,
    tx: &ConnectionSender,
    request: ClientMessage,
) -> Result<Flow, RoomError>
where
    B: Backend,
    C: Codec,
{
    let user = &identity.user_id;

    match request {
        ClientMessage::Handshake { .. } => {
            reply_error(tx, 400, ErrorKind::Protocol, "already authenticated".into());
        }

        ClientMessage::Heartbeat { client_time } => {
            reply(tx, ServerMessage::HeartbeatAck {
                client_time,
                server_time: state.elapsed_ms(),
            });
        }

        ClientMessage::CreateRoom => {
            let mut rooms = state.rooms.lock().await;
            let (room_id, room_code) = rooms.create_room(identity)?;
            reply(tx, ServerMessage::RoomCreated {
                room_id: room_id.clone(),
                room_code,
            });
            rooms.attach_connection(&room_id, user, conn_id)?;
        }

        ClientMessage::JoinByCode { room_code } => {
            let mut rooms = state.rooms.lock().await;
            let joined = rooms.join_by_code(&room_code, identity)?;
            reply(tx, ServerMessage::RoomJoined {
                room_id: joined.room_id.clone(),
                room_code: joined.room_code,
                player_count: joined.player_count,
                game_state: joined.game_state,
            });
            rooms.attach_connection(&joined.room_id, user, conn_id)?;
        }

        ClientMessage::JoinRoom { room_id } => {
            let mut rooms = state.rooms.lock().await;
            let snapshot = rooms.snapshot(&room_id)?;
            if !snapshot.players.iter().any(|p| &p.user_id == user) {
                return Err(RoomError::NotSeated(user.clone(), room_id));
            }
            reply(tx, ServerMessage::RoomJoined {
                room_id: room_id.clone(),
                room_code: snapshot.room_code,
                player_count: snapshot.player_count,
                game_state: snapshot.game_state,
            });
            rooms.attach_connection(&room_id, user, conn_id)?;
        }

        ClientMessage::LeaveRoom { room_id } => {
            state.rooms.lock().await.leave_room(&room_id, user)?;
            reply(tx, ServerMessage::PlayerLeft {
                room_id,
                user_id: user.clone(),
            });
        }

        ClientMessage::SubmitTeam { room_id, cards } => {
            // Catalog lookups happen before the lock is taken.
            let team = resolve_team(&state.backend, &cards).await?;
            let submission = state.rooms.lock().await.submit_team(&room_id, user, team)?;
            reply(tx, ServerMessage::TeamAccepted {
                room_id,
                accepted: true,
                both_teams_ready: submission.both_teams_ready,
            });
        }

        ClientMessage::SelectCard { room_id, card_id } => {
            let selection = state.rooms.lock().await.select_card(&room_id, user, card_id)?;
            if let Selection::Revealed { match_complete: true, .. } = selection {
                spawn_match_conclusion(Arc::clone(state), room_id);
            }
        }

        ClientMessage::GetRoom { room_id } => {
            let snapshot = state.rooms.lock().await.snapshot(&room_id)?;
            reply(tx, ServerMessage::RoomSnapshot(snapshot));
        }

        ClientMessage::GetRoomByCode { room_code } => {
            let snapshot = state.rooms.lock().await.snapshot_by_code(&room_code)?;
            reply(tx, ServerMessage::RoomSnapshot(snapshot));
        }

        ClientMessage::GetOpponentTeam { room_id } => {
            let view = state.rooms.lock().await.opponent_team(&room_id, user)?;
            reply(tx, ServerMessage::OpponentTeam {
                room_id,
                opponent: view.opponent,
                team: view.team,
            });
        }

        ClientMessage::FinalizeMatch { room_id } => {
            finalize_match(state, &room_id, user).await?;
        }

        ClientMessage::Disconnect { reason } => {
            tracing::info!(%conn_id, user_id = %user, %reason, "client disconnected");
            return Ok(Flow::Close);
        }
    }

    Ok(Flow::Continue)
}

/// After the last reveal: wait so clients can render round six, announce
/// the result, then persist it on behalf of the elected finalizer.
fn spawn_match_conclusion<B: Backend, C: Codec>(state: Arc<ServerState<B, C>>, room_id: RoomId) {
    tokio::spawn(async move {
        tokio::time::sleep(state.config.room.game_over_delay).await;

        let finalizer = {
            let mut rooms = state.rooms.lock().await;
            if let Err(e) = rooms.conclude_match(&room_id) {
                tracing::warn!(%room_id, error = %e, "could not conclude match");
                return;
            }
            rooms.finalizer(&room_id)
        };
        let Some(finalizer) = finalizer else {
            tracing::warn!(%room_id, "no finalizer seated, match not persisted");
            return;
        };

        match finalize_match(&state, &room_id, &finalizer).await {
            Ok(_) => {}
            // A client retry already got there first.
            Err(RoomError::AlreadyFinalized(_)) => {}
            Err(e) => {
                let error = ServerMessage::Error {
                    code: e.code(),
                    kind: e.kind(),
                    message: e.to_string(),
                };
                state.rooms.lock().await.send_to_user(&room_id, &finalizer, error);
            }
        }
    });
}

/// Persists a concluded match exactly once.
///
/// The room is claimed under the lock, the store is called without it,
/// and the answer is applied under the lock again. On success the
/// finalizer's stats are pushed right away and the opponent's after
/// `stats_refresh_delay`, once the store has applied both updates.
async fn finalize_match<B: Backend, C: Codec>(
    state: &Arc<ServerState<B, C>>,
    room_id: &RoomId,
    requester: &UserId,
) -> Result<(), RoomError> {
    let pending = state.rooms.lock().await.begin_finalization(room_id, requester)?;

    let finalizer = pending.finalizer;
    let opponent = if pending.record.player1.user_id == finalizer {
        pending.record.player2.user_id.clone()
    } else {
        pending.record.player1.user_id.clone()
    };

    let result = state.backend.record_match(pending.record).await;
    state.rooms.lock().await.complete_finalization(room_id, result)?;

    push_stats(state, room_id, &finalizer).await;

    let state = Arc::clone(state);
    let room_id = room_id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(state.config.room.stats_refresh_delay).await;
        push_stats(&state, &room_id, &opponent).await;
    });

    Ok(())
}

async fn push_stats<B: Backend, C: Codec>(state: &Arc<ServerState<B, C>>, room_id: &RoomId, user: &UserId) {
    match state.backend.user_stats(user).await {
        Ok(stats) => {
            state
                .rooms
                .lock()
                .await
                .send_to_user(room_id, user, ServerMessage::StatsUpdated { stats });
        }
        Err(e) => {
            tracing::warn!(%room_id, user_id = %user, error = %e, "stats refresh failed");
        }
    }
}

/// Queues a reply on the connection's own outbox.
fn reply(tx: &ConnectionSender, message: ServerMessage) {
    // The receiver lives as long as the handler, so this cannot fail
    // while anyone is listening.
    let _ = tx.send(message);
}

fn reply_error(tx: &ConnectionSender, code: u16, kind: ErrorKind, message: String) {
    reply(tx, ServerMessage::Error { code, kind, message });
}

/// Wraps a message in an envelope and writes it to the socket.
async fn send_message<B: Backend, C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<B, C>,
    seq: &mut u64,
    message: ServerMessage,
) -> Result<(), PokeduelError> {
    let envelope = Envelope::new(next_seq(seq), state.elapsed_ms(), message);
    let bytes = state.codec.encode(&envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Sends an error straight to the socket, for use before the outbox
/// exists.
async fn send_error<B: Backend, C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<B, C>,
    code: u16,
    kind: ErrorKind,
    message: &str,
) -> Result<(), PokeduelError> {
    let error = ServerMessage::Error {
        code,
        kind,
        message: message.to_string(),
    };
    let mut seq = 0;
    send_message(conn, state, &mut seq, error).await
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
