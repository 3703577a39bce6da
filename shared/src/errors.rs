use thiserror::Error;

/// Rejections produced by the game engine when a move cannot be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("Session is not active")]
    InvalidState,

    #[error("Not your turn")]
    WrongTurn,

    #[error("Cell index {0} is out of range")]
    OutOfRange(usize),

    #[error("Cell {0} is already occupied")]
    CellOccupied(usize),
}

impl MoveError {
    pub fn reason(&self) -> &'static str {
        match self {
            MoveError::InvalidState => "invalid_state",
            MoveError::WrongTurn => "wrong_turn",
            MoveError::OutOfRange(_) => "out_of_range",
            MoveError::CellOccupied(_) => "cell_occupied",
        }
    }
}

/// A single failed attempt against one storage tier.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("{tier} unavailable: {message}")]
    Unavailable { tier: &'static str, message: String },

    #[error("{tier} returned corrupt data: {message}")]
    Corrupt { tier: &'static str, message: String },
}

impl StorageError {
    pub fn unavailable(tier: &'static str, message: impl Into<String>) -> Self {
        StorageError::Unavailable {
            tier,
            message: message.into(),
        }
    }

    pub fn corrupt(tier: &'static str, message: impl Into<String>) -> Self {
        StorageError::Corrupt {
            tier,
            message: message.into(),
        }
    }

    pub fn tier(&self) -> &'static str {
        match self {
            StorageError::Unavailable { tier, .. } | StorageError::Corrupt { tier, .. } => tier,
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::unavailable("postgres", err.to_string())
    }
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        StorageError::unavailable("redis", err.to_string())
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Participant {0} is not part of this session")]
    ParticipantNotInSession(String),

    #[error("Invalid or expired code: {0}")]
    InvalidCode(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Move rejected: {0}")]
    Move(#[from] MoveError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable code sent to the originating connection in rejection events.
    pub fn reason(&self) -> &'static str {
        match self {
            ServiceError::SessionNotFound(_) => "session_not_found",
            ServiceError::ParticipantNotInSession(_) => "participant_not_in_session",
            ServiceError::InvalidCode(_) => "invalid_code",
            ServiceError::Unauthorized => "unauthorized",
            ServiceError::Move(err) => err.reason(),
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Storage(_) => "storage_unavailable",
            ServiceError::Internal(_) => "internal_error",
        }
    }

    /// Caller errors are surfaced to the participant and never retried.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, ServiceError::Storage(_) | ServiceError::Internal(_))
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
