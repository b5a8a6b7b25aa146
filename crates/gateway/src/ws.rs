//! `GET /v1/sessions/:id/stream` — the per-session WebSocket connection
//! loop (C7). Grounded on `gateway/src/nodes/ws.rs`'s writer-task /
//! reader-loop split; the node hello/welcome handshake has no
//! counterpart here — a dialogue session is already established by
//! `POST /v1/sessions`, so the socket goes straight into the loop.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use rtd_domain::{InboundEvent, OutboundEvent};
use rtd_orchestrator::{spawn_turn, GeneratorSet};

use crate::http::session_not_found;
use crate::state::AppState;

/// spec.md's documented close code for "session not found" once a
/// WebSocket has already been upgraded (see `lib.rs`'s `router` doc and
/// SPEC_FULL.md §B on why both a pre-upgrade 404 and this code exist).
const CLOSE_SESSION_GONE: u16 = 4004;

pub async fn stream_session(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    if state.registry.get(&session_id).is_none() {
        return session_not_found(&session_id).into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: String) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let Some(session) = state.registry.get(&session_id) else {
        let frame = CloseFrame {
            code: CLOSE_SESSION_GONE,
            reason: "session closed before stream started".into(),
        };
        let _ = ws_sink.send(Message::Close(Some(frame))).await;
        return;
    };

    let (outbound_tx, mut outbound_rx) =
        mpsc::channel::<OutboundEvent>(state.turn_config.outbound_queue_capacity);

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            if send_event(&mut ws_sink, &event).await.is_err() {
                break;
            }
        }
    });

    tracing::info!(session_id = %session_id, "session stream connected");

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<InboundEvent>(&text) {
                Ok(event) => {
                    handle_inbound(&state, &session, &session_id, event, &outbound_tx).await
                }
                Err(e) => {
                    tracing::debug!(session_id = %session_id, error = %e, "ignoring unparseable inbound message");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    session.lock().cancel_current_turn();
    writer.abort();
    state.registry.close(&session_id);
    tracing::info!(session_id = %session_id, "session stream disconnected");
}

async fn handle_inbound(
    state: &AppState,
    session: &std::sync::Arc<parking_lot::Mutex<rtd_session::session::Session>>,
    session_id: &str,
    event: InboundEvent,
    outbound: &mpsc::Sender<OutboundEvent>,
) {
    match event {
        InboundEvent::UserText { text, control } => {
            let per_turn = control.unwrap_or_default();
            // Pending control from a prior `control_update` applies to
            // exactly this next turn (spec.md §4.7/§4.6 "merge"), then is
            // cleared regardless of whether it was used.
            let turn_control = {
                let mut s = session.lock();
                let effective = match s.pending_control.take() {
                    Some(pending) => rtd_session::merge(&pending, &per_turn),
                    None => per_turn,
                };
                // A fresh user_text interrupts whatever the session is
                // currently doing, same as an explicit `interrupt` —
                // spec.md §4.6's barge-in rule applies to new input too.
                s.cancel_current_turn();
                effective
            };
            signal_combined_cancel(&state.generators).await;
            spawn_turn(
                state.generators.clone(),
                session.clone(),
                text,
                turn_control,
                outbound.clone(),
                state.turn_config.clone(),
            );
        }
        InboundEvent::Interrupt {} => {
            session.lock().cancel_current_turn();
            signal_combined_cancel(&state.generators).await;
        }
        InboundEvent::ControlUpdate { control } => {
            session.lock().pending_control = Some(control);
        }
    }
    tracing::trace!(session_id = %session_id, "inbound event handled");
}

/// In combined mode, a cancelled turn task only reaches `cancel_response`
/// at its next poll of the cancel token — never while it is parked on
/// `events.next().await` (spec.md §4.6). Signal the shared transport
/// directly from the receive loop so an interrupt/barge-in against a
/// combined session that is idle-but-streaming still reaches it.
async fn signal_combined_cancel(generators: &GeneratorSet) {
    if let GeneratorSet::Combined { combined, .. } = generators {
        if let Err(e) = combined.cancel_response().await {
            tracing::warn!(error = %e, "combined generator cancel_response failed");
        }
    }
}

async fn send_event(
    sink: &mut (impl SinkExt<Message> + Unpin),
    event: &OutboundEvent,
) -> Result<(), ()> {
    let json = serde_json::to_string(event).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}
