use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::app::AppState;
use crate::protocol::{ClientMessage, ServerMessage};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Identifier from an earlier connection, to pick up where it left off
    pub participant_id: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: participant_id={:?}",
        params.participant_id
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            Ok(())
        }
    }
}

/// One socket is one client session with its own controller
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let identity = match params.participant_id.as_deref() {
        Some(previous) => state.identity.resume(previous).await,
        None => state.identity.sign_in().await,
    };
    let participant_id = match identity {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Sign-in failed: {}", e);
            let error = ServerMessage::Error {
                code: e.code().to_string(),
                msg: e.user_message(),
            };
            let _ = send_message(&mut sender, &error).await;
            return;
        }
    };

    tracing::info!("WebSocket connected as {}", participant_id);

    let welcome = ServerMessage::Welcome {
        participant_id: participant_id.clone(),
    };
    if send_message(&mut sender, &welcome).await.is_err() {
        tracing::error!("Failed to send welcome message");
        return;
    }

    let controller = state.session(participant_id.clone());
    let mut updates = controller.watch();
    let (actions, actions_rx) = mpsc::channel(32);
    let session = tokio::spawn(controller.run(actions_rx));

    let initial = ServerMessage::Session {
        state: Box::new(updates.borrow_and_update().clone()),
    };
    if send_message(&mut sender, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let msg = ServerMessage::Session {
                    state: Box::new(updates.borrow_and_update().clone()),
                };
                if send_message(&mut sender, &msg).await.is_err() {
                    break;
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let action = client_msg.into_action(&state.config);
                                if actions.send(action).await.is_err() {
                                    tracing::error!("Session for {} stopped", participant_id);
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                let _ = send_message(&mut sender, &error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Closing the action channel ends the session loop and its subscription
    drop(actions);
    if let Err(e) = session.await {
        tracing::error!("Session task for {} failed: {}", participant_id, e);
    }

    tracing::info!("WebSocket connection closed for {}", participant_id);
}
