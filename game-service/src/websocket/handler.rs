use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::{ConnectionId, Participant, ParticipantId};

use super::hub::ConnectionHub;
use crate::coordinator::{Broadcaster, ClientMessage, ConnectionContext, Coordinator, ServerMessage};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub hub: Arc<ConnectionHub>,
}

/// Identity handed over by whatever authenticated the caller. Connections
/// without one play as a guest bound to the connection.
#[derive(Debug, Default, Deserialize)]
pub struct IdentityParams {
    #[serde(alias = "participantId")]
    pub participant_id: Option<String>,
    #[serde(alias = "displayName")]
    pub display_name: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(identity): Query<IdentityParams>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: IdentityParams) {
    let connection_id = ConnectionId::new();
    let ctx = ConnectionContext::new(connection_id, resolve_participant(connection_id, identity));

    let (mut sender, mut receiver) = socket.split();
    let mut outbound = state.hub.register(connection_id);

    tracing::info!(
        connection_id = %connection_id,
        participant_id = %ctx.participant.id,
        "New WebSocket connection established"
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(kind = message.kind(), error = %e, "Failed to encode message");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_ctx = ctx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => handle_frame(&recv_state, &recv_ctx, &text).await,
                Message::Close(_) => {
                    tracing::info!(connection_id = %connection_id, "WebSocket connection closed by client");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    state.hub.unregister(connection_id);
    state.coordinator.disconnect(&ctx).await;

    tracing::info!(connection_id = %connection_id, "WebSocket connection terminated");
}

/// Dispatches one text frame. Frames that do not parse are answered on the
/// same connection and otherwise ignored.
async fn handle_frame(state: &AppState, ctx: &ConnectionContext, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_msg) => state.coordinator.handle(ctx, client_msg).await,
        Err(e) => {
            tracing::warn!(connection_id = %ctx.connection_id, error = %e, "Failed to parse client message");
            state.hub.send_to(
                ctx.connection_id,
                ServerMessage::Error {
                    reason: "invalid_message".to_string(),
                    message: "Invalid message format".to_string(),
                },
            );
        }
    }
}

fn resolve_participant(connection_id: ConnectionId, identity: IdentityParams) -> Participant {
    let display_name = identity
        .display_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    match identity.participant_id.map(ParticipantId::new) {
        Some(Ok(id)) => {
            let name = display_name.unwrap_or_else(|| id.to_string());
            Participant::new(id, name)
        }
        Some(Err(e)) => {
            tracing::warn!(connection_id = %connection_id, error = %e, "Rejected participant id, using guest");
            guest(connection_id, display_name)
        }
        None => guest(connection_id, display_name),
    }
}

fn guest(connection_id: ConnectionId, display_name: Option<String>) -> Participant {
    let id = ParticipantId::guest(&connection_id);
    let name = display_name.unwrap_or_else(|| {
        let short: String = connection_id.to_string().chars().take(6).collect();
        format!("Guest {}", short)
    });
    Participant::new(id, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalStore, TierChain};
    use shared::ExpiryConfig;

    fn app_state() -> AppState {
        let hub = Arc::new(ConnectionHub::new());
        let chain = TierChain::local_only(Arc::new(LocalStore::new()));
        let coordinator = Arc::new(Coordinator::from_tiers(
            &chain,
            &ExpiryConfig::default(),
            hub.clone(),
        ));
        AppState { coordinator, hub }
    }

    fn context(id: &str) -> ConnectionContext {
        let participant = Participant::new(ParticipantId::new(id).unwrap(), id);
        ConnectionContext::new(ConnectionId::new(), participant)
    }

    #[tokio::test]
    async fn test_malformed_frame_answers_invalid_message() {
        let state = app_state();
        let ctx = context("alice");
        let mut rx = state.hub.register(ctx.connection_id);

        handle_frame(&state, &ctx, "{not json").await;

        match rx.try_recv() {
            Ok(ServerMessage::Error { reason, .. }) => assert_eq!(reason, "invalid_message"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_valid_frame_reaches_coordinator() {
        let state = app_state();
        let ctx = context("alice");
        let mut rx = state.hub.register(ctx.connection_id);

        handle_frame(&state, &ctx, r#"{"type":"queue.join"}"#).await;

        assert!(matches!(rx.try_recv(), Ok(ServerMessage::QueueWaiting)));
    }

    #[test]
    fn test_explicit_identity_is_kept() {
        let participant = resolve_participant(
            ConnectionId::new(),
            IdentityParams {
                participant_id: Some("alice".to_string()),
                display_name: Some("  Alice ".to_string()),
            },
        );
        assert_eq!(participant.id.as_str(), "alice");
        assert_eq!(participant.display_name, "Alice");
    }

    #[test]
    fn test_missing_identity_becomes_guest() {
        let connection_id = ConnectionId::new();
        let participant = resolve_participant(connection_id, IdentityParams::default());
        assert_eq!(participant.id, ParticipantId::guest(&connection_id));
        assert!(participant.display_name.starts_with("Guest "));
    }

    #[test]
    fn test_blank_identity_becomes_guest() {
        let connection_id = ConnectionId::new();
        let participant = resolve_participant(
            connection_id,
            IdentityParams {
                participant_id: Some("   ".to_string()),
                display_name: None,
            },
        );
        assert_eq!(participant.id, ParticipantId::guest(&connection_id));
    }
}
