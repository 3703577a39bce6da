pub mod config;
pub mod errors;
pub mod telemetry;
pub mod types;

pub use config::{DatabaseConfig, ExpiryConfig, RedisConfig, ServiceConfig};
pub use errors::{MoveError, Result, ServiceError, StorageError, StorageResult};
pub use telemetry::{init_metrics, init_tracing, record_counter, record_degraded, record_timing};
pub use types::{
    Board, CompletedGame, ConnectionId, GameState, InviteRecord, LeaderboardRow, Mark,
    MatchedPair, MoveRecord, Participant, ParticipantId, Players, QueueEntry, SessionId,
    SessionStatus, Winner, BOARD_SIZE,
};
