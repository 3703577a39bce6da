use serde::{Deserialize, Serialize};
use shared::{GameState, Players, SessionId, Winner};

/// Inbound frames, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    #[serde(rename = "queue.join")]
    QueueJoin,
    #[serde(rename = "queue.leave")]
    QueueLeave,
    #[serde(rename = "private.create")]
    PrivateCreate,
    #[serde(rename = "private.joinByCode")]
    PrivateJoinByCode { code: String },
    #[serde(rename = "move.submit")]
    MoveSubmit {
        #[serde(alias = "session_id")]
        session_id: SessionId,
        #[serde(alias = "cell_index")]
        cell_index: usize,
    },
    #[serde(rename = "session.leave")]
    SessionLeave {
        #[serde(alias = "session_id")]
        session_id: SessionId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    #[serde(rename = "queue.waiting")]
    QueueWaiting,
    #[serde(rename = "queue.left")]
    QueueLeft,
    #[serde(rename = "session.matched")]
    SessionMatched {
        session_id: SessionId,
        players: Players,
    },
    #[serde(rename = "session.state")]
    SessionState(GameState),
    #[serde(rename = "session.completed")]
    SessionCompleted {
        session_id: SessionId,
        winner: Winner,
    },
    #[serde(rename = "session.left")]
    SessionLeft { session_id: SessionId },
    #[serde(rename = "private.created")]
    PrivateCreated { code: String, session_id: SessionId },
    #[serde(rename = "move.rejected")]
    MoveRejected { reason: String, message: String },
    #[serde(rename = "error")]
    Error { reason: String, message: String },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::QueueWaiting => "queue.waiting",
            ServerMessage::QueueLeft => "queue.left",
            ServerMessage::SessionMatched { .. } => "session.matched",
            ServerMessage::SessionState(_) => "session.state",
            ServerMessage::SessionCompleted { .. } => "session.completed",
            ServerMessage::SessionLeft { .. } => "session.left",
            ServerMessage::PrivateCreated { .. } => "private.created",
            ServerMessage::MoveRejected { .. } => "move.rejected",
            ServerMessage::Error { .. } => "error",
        }
    }
}
