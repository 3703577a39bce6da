
pub mod game_history;
pub mod leaderboard;
pub mod matchmaking;
pub mod session_store;

pub use game_history::GameHistory;
pub use leaderboard::LeaderboardAggregator;
pub use matchmaking::{JoinOutcome, Matchmaking, PrivateCode};
pub use session_store::SessionStore;
