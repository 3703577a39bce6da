pub mod engine;

pub use engine::{apply_move, create_session, detect_outcome, MoveInput, Outcome};
