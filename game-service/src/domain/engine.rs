//! Pure tic-tac-toe state transitions. Nothing here touches storage or time
//! beyond stamping moves.

use chrono::Utc;
use shared::{
    Board, GameState, Mark, MoveError, MoveRecord, Participant, ParticipantId, Players,
    SessionId, SessionStatus, Winner, BOARD_SIZE,
};

const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// A move as submitted, before it is stamped and appended to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveInput {
    pub participant_id: ParticipantId,
    pub mark: Mark,
    pub cell_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub winner: Option<Mark>,
    pub is_draw: bool,
}

impl Outcome {
    pub fn is_final(&self) -> bool {
        self.winner.is_some() || self.is_draw
    }

    fn as_winner(&self) -> Option<Winner> {
        match (self.winner, self.is_draw) {
            (Some(mark), _) => Some(Winner::from(mark)),
            (None, true) => Some(Winner::Draw),
            (None, false) => None,
        }
    }
}

pub fn create_session(id: SessionId, x: Participant, o: Participant) -> GameState {
    GameState {
        id,
        board: [None; BOARD_SIZE],
        players: Players { x, o },
        current_turn: Mark::X,
        status: SessionStatus::Active,
        winner: None,
        moves: Vec::new(),
        started_at: Utc::now(),
        ended_at: None,
    }
}

pub fn detect_outcome(board: &Board) -> Outcome {
    let winner = WIN_LINES.iter().find_map(|[a, b, c]| match board[*a] {
        Some(mark) if board[*b] == Some(mark) && board[*c] == Some(mark) => Some(mark),
        _ => None,
    });

    Outcome {
        winner,
        is_draw: winner.is_none() && board.iter().all(Option::is_some),
    }
}

pub fn apply_move(state: &GameState, input: MoveInput) -> Result<GameState, MoveError> {
    if state.status != SessionStatus::Active {
        return Err(MoveError::InvalidState);
    }
    if input.mark != state.current_turn {
        return Err(MoveError::WrongTurn);
    }
    if input.cell_index >= BOARD_SIZE {
        return Err(MoveError::OutOfRange(input.cell_index));
    }
    if state.board[input.cell_index].is_some() {
        return Err(MoveError::CellOccupied(input.cell_index));
    }

    let now = Utc::now();
    let mut next = state.clone();
    next.board[input.cell_index] = Some(input.mark);
    next.moves.push(MoveRecord {
        participant_id: input.participant_id,
        mark: input.mark,
        cell_index: input.cell_index,
        timestamp: now,
    });

    let outcome = detect_outcome(&next.board);
    if outcome.is_final() {
        next.status = SessionStatus::Completed;
        next.winner = outcome.as_winner();
        next.ended_at = Some(now);
    } else {
        next.current_turn = input.mark.other();
    }

    Ok(next)
}
