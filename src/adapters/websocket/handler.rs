//! WebSocket upgrade handler for operator dashboards.
//!
//! Handles the HTTP → WebSocket upgrade and the connection lifecycle:
//! 1. Verify the bearer token from the `token` query parameter
//! 2. Upgrade to WebSocket
//! 3. Register the operator's live channel (replacing any prior one)
//! 4. Forward hub messages and answer pings until disconnect
//! 5. Release the channel, unless a newer connection already replaced it

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::foundation::{Timestamp, UserId};

use super::{
    hub::FanoutHub,
    messages::{ClientMessage, ConnectedMessage, ServerMessage},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Verifies HS256 operator tokens; the `sub` claim is the user id.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn hs256(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        UserId::new(data.claims.sub).map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub hub: Arc<FanoutHub>,
    pub verifier: Arc<TokenVerifier>,
}

impl WebSocketState {
    pub fn new(hub: Arc<FanoutHub>, verifier: Arc<TokenVerifier>) -> Self {
        Self { hub, verifier }
    }
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: Option<String>,
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws?token=...`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<WebSocketState>,
) -> Response {
    let verified = params
        .token
        .as_deref()
        .ok_or(AuthError::MissingToken)
        .and_then(|token| state.verifier.verify(token));

    let user = match verified {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "rejected live channel");
            return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, user, state))
}

async fn handle_socket(socket: WebSocket, user: UserId, state: WebSocketState) {
    let (mut sender, mut receiver) = socket.split();
    let (client_id, mut rx) = state.hub.register(user.clone());

    let connected = ServerMessage::Connected(ConnectedMessage {
        user_id: user.to_string(),
        client_id: client_id.to_string(),
        timestamp: Timestamp::now().to_rfc3339(),
    });
    state.hub.send_to(&user, &connected);
    tracing::info!(user_id = %user, client_id = %client_id, "live channel connected");

    let mut send_task = {
        let user = user.clone();
        tokio::spawn(async move {
            while let Some(json) = rx.recv().await {
                if let Err(e) = sender.send(Message::Text(json.as_ref().clone())).await {
                    tracing::debug!(user_id = %user, "Send error, closing connection: {}", e);
                    break;
                }
            }
        })
    };

    let mut recv_task = {
        let hub = Arc::clone(&state.hub);
        let user = user.clone();
        tokio::spawn(async move {
            while let Some(result) = receiver.next().await {
                match result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Ping) => {
                            hub.send_to(&user, &ServerMessage::pong());
                        }
                        Err(_) => {
                            tracing::trace!(user_id = %user, "ignoring unknown client message");
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(user_id = %user, "Receive error: {}", e);
                        break;
                    }
                }
            }
        })
    };

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.release(&user, &client_id);
    tracing::info!(user_id = %user, client_id = %client_id, "live channel closed");
}

/// Create axum router for the WebSocket endpoint.
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route("/ws", get(ws_handler))
}
