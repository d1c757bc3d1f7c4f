//! Error taxonomy for room operations.
//!
//! Caller errors answer the offending caller only; rule violations (a wrong
//! sum claim, a stale slot) are logged as game events or ignored. Nothing
//! here is fatal to a room, and a failure in one room never touches another.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room not found")]
    RoomNotFound,
    #[error("seat {0} is out of range")]
    SeatOutOfRange(usize),
    #[error("seat {0} is already claimed")]
    SeatTaken(usize),
    #[error("seat {0} is vacant")]
    SeatVacant(usize),
    #[error("seat {0} belongs to another player")]
    NotYourSeat(usize),
    #[error("caller holds no seat in this room")]
    NotSeated,
    #[error("not this player's turn")]
    NotYourTurn,
    #[error("caller is not the host")]
    NotHost,
    #[error("room is paused")]
    Paused,
    #[error("a roll is already pending")]
    RollPending,
    #[error("no roll awaiting confirmation")]
    NothingToConfirm,
}

impl RoomError {
    /// Stable wire code for error frames.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::SeatOutOfRange(_) => "SEAT_OUT_OF_RANGE",
            Self::SeatTaken(_) => "SEAT_TAKEN",
            Self::SeatVacant(_) => "SEAT_VACANT",
            Self::NotYourSeat(_) => "NOT_YOUR_SEAT",
            Self::NotSeated => "NOT_SEATED",
            Self::NotYourTurn => "NOT_YOUR_TURN",
            Self::NotHost => "NOT_HOST",
            Self::Paused => "PAUSED",
            Self::RollPending => "ROLL_PENDING",
            Self::NothingToConfirm => "NOTHING_TO_CONFIRM",
        }
    }
}
