//! Per-account fan-out of engine events to subscribed WebSocket clients.
//! Reworked from the teacher's combined-stream socket handler: same
//! receive-loop shape, but subscriptions are per-execution broadcast
//! receivers pulled straight from the engine instead of a string-keyed
//! stream table, and every subscribe is account-scoped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;

use flowrunner_types::{ExecutionId, ExecutionUpdateKind};

use crate::auth::AuthenticatedAccount;
use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const READ_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    Subscribe { execution_id: ExecutionId },
    Unsubscribe { execution_id: ExecutionId },
    Ping,
}

/// Reply to a client-initiated `{"type":"ping"}`. Shares the `ExecutionUpdate`
/// wire shape but has no execution to report against, so `execution_id` is
/// omitted rather than faked.
#[derive(Debug, Serialize)]
struct PongFrame {
    #[serde(rename = "type")]
    kind: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    AuthenticatedAccount(account): AuthenticatedAccount,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, account.id.clone()))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, account_id: flowrunner_types::AccountId) {
    let (tx, mut rx) = mpsc::channel::<Message>(64);
    let mut subscriptions: HashMap<ExecutionId, tokio::task::JoinHandle<()>> = HashMap::new();
    let mut deadline = Instant::now() + READ_DEADLINE;
    let mut ping_due = Instant::now() + PING_INTERVAL;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(ping_due) => {
                if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                ping_due = Instant::now() + PING_INTERVAL;
            }
            _ = tokio::time::sleep_until(deadline) => {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "idle".into(),
                    })))
                    .await;
                break;
            }
            forwarded = rx.recv() => {
                match forwarded {
                    Some(msg) => {
                        if socket.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => {}
                }
            }
            incoming = socket.recv() => {
                let Some(incoming) = incoming else { break };
                let Ok(incoming) = incoming else { break };
                deadline = Instant::now() + READ_DEADLINE;

                match incoming {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Subscribe { execution_id }) => {
                                subscribe(&state, &account_id, execution_id, &tx, &mut subscriptions).await;
                            }
                            Ok(ClientMessage::Unsubscribe { execution_id }) => {
                                if let Some(handle) = subscriptions.remove(&execution_id) {
                                    handle.abort();
                                }
                            }
                            Ok(ClientMessage::Ping) => {
                                let pong = PongFrame { kind: "pong", timestamp: chrono::Utc::now() };
                                if let Ok(json) = serde_json::to_string(&pong) {
                                    if socket.send(Message::Text(json.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(_) => {
                                let _ = socket
                                    .send(Message::Close(Some(CloseFrame {
                                        code: close_code::POLICY,
                                        reason: "malformed frame".into(),
                                    })))
                                    .await;
                                break;
                            }
                        }
                    }
                    Message::Ping(data) => {
                        let _ = socket.send(Message::Pong(data)).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    for (_, handle) in subscriptions.drain() {
        handle.abort();
    }
    tracing::debug!(account_id = %account_id, "websocket connection closed");
}

async fn subscribe(
    state: &Arc<AppState>,
    account_id: &flowrunner_types::AccountId,
    execution_id: ExecutionId,
    tx: &mpsc::Sender<Message>,
    subscriptions: &mut HashMap<ExecutionId, tokio::task::JoinHandle<()>>,
) {
    if subscriptions.contains_key(&execution_id) {
        return;
    }
    let Ok(mut receiver) = state.engine.subscribe(account_id, &execution_id).await else {
        // not owned, or no longer live: silently ignored per spec.
        return;
    };
    let tx = tx.clone();
    let handle = tokio::spawn(async move {
        while let Ok(update) = receiver.recv().await {
            let Ok(json) = serde_json::to_string(&update) else { continue };
            if tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            if update.kind == ExecutionUpdateKind::Complete {
                break;
            }
        }
    });
    subscriptions.insert(execution_id, handle);
}
