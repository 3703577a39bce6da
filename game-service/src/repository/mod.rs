
pub mod games_repo;
pub mod leaderboard_repo;
pub mod participant_repo;

pub use games_repo::GamesRepository;
pub use leaderboard_repo::LeaderboardRepository;

pub(crate) const TIER: &str = "postgres";
