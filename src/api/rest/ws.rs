use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use futures::SinkExt;
use futures::StreamExt;
use tracing::{info, warn};

use crate::engine::session::{greeting, render, Session, SessionTarget};
use crate::error::AppError;
use crate::state::AppState;

/// General audience: every status change.
pub async fn orders_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    upgrade(ws, state, SessionTarget::AllOrders)
}

/// `/ws/orders/partner` for the unassigned pool, `/ws/orders/user_<phone>`
/// for one customer.
pub async fn channel_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> Result<Response, AppError> {
    let target: SessionTarget = channel.parse()?;
    Ok(upgrade(ws, state, target))
}

fn upgrade(ws: WebSocketUpgrade, state: Arc<AppState>, target: SessionTarget) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, target))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, target: SessionTarget) {
    let (mut sender, mut receiver) = socket.split();
    let (mut session, mut events) = Session::connect(state.gateway.clone(), &target);
    session.open();

    let active = state
        .metrics
        .ws_sessions_active
        .with_label_values(&[target.channel()]);
    active.inc();

    let session_id = session.id();
    let sends_greeting = target.sends_greeting();

    let mut send_task = tokio::spawn(async move {
        if sends_greeting {
            match greeting() {
                Ok(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                Err(err) => warn!(error = %err, "failed to serialize ws greeting"),
            }
        }

        while let Some(event) = events.recv().await {
            let json = match render(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(
                        session_id = %session_id,
                        event = event.kind(),
                        error = %err,
                        "failed to serialize order event for ws"
                    );
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    session.close();
    active.dec();
    info!(session_id = %session_id, channel = target.channel(), "websocket client disconnected");
}
