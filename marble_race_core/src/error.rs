use crate::board::MarbleId;
use crate::card::Card;
use crate::state::{MatchId, PlayerId};
use thiserror::Error;

/// 规则引擎的统一错误类型
///
/// 结构性错误 (`InvalidMoveFormat`) 在任何修改之前就会被拒绝，调用方修正后可以重试。
/// `IllegalMove` 表示违反了棋盘规则；`Match` 层保证此时状态已经回滚。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("invalid move format: {0}")]
    InvalidMoveFormat(String),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("not your turn: {player}")]
    NotYourTurn { player: PlayerId },

    #[error("player limit reached")]
    PlayerLimitReached,

    #[error("player count must be between 2 and 6, got {0}")]
    InvalidPlayerCount(usize),

    #[error("player {0} is not seated in this match")]
    PlayerNotInMatch(PlayerId),

    #[error("match is not in progress")]
    MatchNotInProgress,

    #[error("match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("card not found in hand: {0}")]
    CardNotFound(Card),

    #[error("marble {0} is not in reserve")]
    MarbleNotInReserve(MarbleId),

    #[error("marble {0} is not on the track")]
    MarbleNotOnTrack(MarbleId),

    #[error("unknown marble: {0}")]
    UnknownMarble(MarbleId),
}

pub type GameResult<T> = Result<T, GameError>;

impl GameError {
    pub fn illegal(reason: impl Into<String>) -> Self {
        Self::IllegalMove(reason.into())
    }

    pub fn format(reason: impl Into<String>) -> Self {
        Self::InvalidMoveFormat(reason.into())
    }

    /// 棋盘层的任何失败在 `apply_move` 中都统一成一个 `IllegalMove`
    pub fn into_illegal(self) -> Self {
        match self {
            GameError::IllegalMove(_) => self,
            other => GameError::IllegalMove(other.to_string()),
        }
    }
}
