use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Result, ServiceError};

pub const BOARD_SIZE: usize = 9;

pub type Board = [Option<Mark>; BOARD_SIZE];

/// Opaque participant identifier handed over by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Participant ID must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    pub fn guest(connection_id: &ConnectionId) -> Self {
        Self(format!("guest:{}", connection_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(SessionId)
            .map_err(|e| ServiceError::Validation(format!("Invalid session ID: {}", e)))
    }

    /// Name of the broadcast group every participant of the session joins.
    pub fn group(&self) -> String {
        format!("session:{}", self.0)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one live transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
}

impl Participant {
    pub fn new(id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn other(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    X,
    O,
    #[serde(rename = "draw")]
    Draw,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::X => "X",
            Winner::O => "O",
            Winner::Draw => "draw",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "X" => Ok(Winner::X),
            "O" => Ok(Winner::O),
            "draw" => Ok(Winner::Draw),
            other => Err(ServiceError::Validation(format!("Unknown winner: {}", other))),
        }
    }

    pub fn mark(&self) -> Option<Mark> {
        match self {
            Winner::X => Some(Mark::X),
            Winner::O => Some(Mark::O),
            Winner::Draw => None,
        }
    }
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Winner::X,
            Mark::O => Winner::O,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    #[serde(rename = "X")]
    pub x: Participant,
    #[serde(rename = "O")]
    pub o: Participant,
}

impl Players {
    pub fn get(&self, mark: Mark) -> &Participant {
        match mark {
            Mark::X => &self.x,
            Mark::O => &self.o,
        }
    }

    pub fn mark_of(&self, participant_id: &ParticipantId) -> Option<Mark> {
        if &self.x.id == participant_id {
            Some(Mark::X)
        } else if &self.o.id == participant_id {
            Some(Mark::O)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub participant_id: ParticipantId,
    pub mark: Mark,
    pub cell_index: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub id: SessionId,
    pub board: Board,
    pub players: Players,
    pub current_turn: Mark,
    pub status: SessionStatus,
    pub winner: Option<Winner>,
    pub moves: Vec<MoveRecord>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl GameState {
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Participant credited with the win, `None` while active or on a draw.
    pub fn winning_participant(&self) -> Option<&Participant> {
        self.winner
            .and_then(|winner| winner.mark())
            .map(|mark| self.players.get(mark))
    }

    pub fn filled_cells(&self) -> usize {
        self.board.iter().filter(|cell| cell.is_some()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub participant_id: ParticipantId,
    pub connection_id: ConnectionId,
    pub display_name: String,
}

impl QueueEntry {
    pub fn new(participant: &Participant, connection_id: ConnectionId) -> Self {
        Self {
            participant_id: participant.id.clone(),
            connection_id,
            display_name: participant.display_name.clone(),
        }
    }

    pub fn participant(&self) -> Participant {
        Participant::new(self.participant_id.clone(), self.display_name.clone())
    }
}

/// Ephemeral result of a successful pairing. `first` plays X.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPair {
    pub session_id: SessionId,
    pub first: QueueEntry,
    pub second: QueueEntry,
}

/// Private invite code binding a session id to the connection that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRecord {
    pub session_id: SessionId,
    pub host: QueueEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub wins: i64,
}

/// A finished session as recorded in the game history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedGame {
    pub id: SessionId,
    pub x_participant_id: ParticipantId,
    pub o_participant_id: ParticipantId,
    pub winner: Option<Winner>,
    pub moves: Vec<MoveRecord>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl CompletedGame {
    pub fn from_state(state: &GameState) -> Self {
        Self {
            id: state.id,
            x_participant_id: state.players.x.id.clone(),
            o_participant_id: state.players.o.id.clone(),
            winner: state.winner,
            moves: state.moves.clone(),
            started_at: state.started_at,
            ended_at: state.ended_at.unwrap_or(state.started_at),
        }
    }

    pub fn involves(&self, participant_id: &ParticipantId) -> bool {
        &self.x_participant_id == participant_id || &self.o_participant_id == participant_id
    }
}
