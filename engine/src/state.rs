//! Per-room game state.
//!
//! One [`RoomState`] exists per room code and is exclusively owned by that
//! room. Border occupancy is a bitmask over the eight numbered slots
//! (3,4,5,6,8,9,10,11), one bit per slot, since a slot holds at most one
//! coin.

use std::collections::VecDeque;

use serde::Serialize;

use crate::rules::RequiredMove;

/// Minimum seats per room.
pub const MIN_PLAYERS: usize = 3;

/// Maximum seats per room.
pub const MAX_PLAYERS: usize = 6;

/// Coins each seat starts with.
pub const STARTING_COINS: u32 = 4;

/// Rolls per seat before the turn-limit termination check fires.
pub const MAX_ROLLS_PER_SEAT: u32 = 8;

/// Nickname cap for seat claims and renames.
pub const MAX_NICKNAME_LENGTH: usize = 24;

/// Event log cap; oldest entries are discarded.
pub const MAX_LOG_ENTRIES: usize = 160;

/// The eight numbered border slots.
pub const BORDER_NUMBERS: [u8; 8] = [3, 4, 5, 6, 8, 9, 10, 11];

/// Bit position of a border slot in the occupancy mask.
pub fn border_bit(slot: u8) -> Option<u8> {
    match slot {
        3 => Some(0),
        4 => Some(1),
        5 => Some(2),
        6 => Some(3),
        8 => Some(4),
        9 => Some(5),
        10 => Some(6),
        11 => Some(7),
        _ => None,
    }
}

/// Elimination reprieve status for a seat.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GraceStatus {
    #[default]
    Normal = 0,
    /// Hit 0 coins; gets one more chance on their next turn.
    Pending = 1,
    /// This is the last-chance turn; resolves at its end.
    Active = 2,
}

impl GraceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraceStatus::Normal => "normal",
            GraceStatus::Pending => "pending",
            GraceStatus::Active => "active",
        }
    }
}

impl TryFrom<u8> for GraceStatus {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GraceStatus::Normal),
            1 => Ok(GraceStatus::Pending),
            2 => Ok(GraceStatus::Active),
            _ => Err(()),
        }
    }
}

/// Where the current turn stands, derived from the pending roll/move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    AwaitingRoll,
    AwaitingConfirm,
    AwaitingAction,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnPhase::AwaitingRoll => "awaitingRoll",
            TurnPhase::AwaitingConfirm => "awaitingConfirm",
            TurnPhase::AwaitingAction => "awaitingAction",
        }
    }
}

/// Occupancy of one seat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seat {
    pub display_name: String,
    pub avatar: String,
    /// Transport identity of the occupant; never serialized to clients.
    pub connection_id: String,
}

/// Authoritative state of one room.
#[derive(Clone, Debug)]
pub struct RoomState {
    pub player_count: usize,
    pub coins: Vec<u32>,
    pub eliminated: Vec<bool>,
    pub rolls_taken: Vec<u32>,
    pub grace: Vec<GraceStatus>,
    pub current_turn: usize,
    pub center_pool: u32,
    pub border_mask: u8,
    /// Human-readable events, most recent first.
    pub event_log: VecDeque<String>,
    pub last_roll: Option<[u8; 2]>,
    pub required_move: Option<RequiredMove>,
    pub paused: bool,
    pub seats: Vec<Option<Seat>>,
    pub host_connection_id: String,
}

impl RoomState {
    /// Fresh room for `player_count` seats, clamped into [3, 6]. Rooms are
    /// created paused; the host unpauses with `start_game`.
    pub fn new(player_count: usize, host_connection_id: impl Into<String>) -> Self {
        let count = player_count.clamp(MIN_PLAYERS, MAX_PLAYERS);
        Self {
            player_count: count,
            coins: vec![STARTING_COINS; count],
            eliminated: vec![false; count],
            rolls_taken: vec![0; count],
            grace: vec![GraceStatus::Normal; count],
            current_turn: 0,
            center_pool: 0,
            border_mask: 0,
            event_log: VecDeque::new(),
            last_roll: None,
            required_move: None,
            paused: true,
            seats: vec![None; count],
            host_connection_id: host_connection_id.into(),
        }
    }

    pub fn phase(&self) -> TurnPhase {
        if self.required_move.is_some() {
            TurnPhase::AwaitingAction
        } else if self.last_roll.is_some() {
            TurnPhase::AwaitingConfirm
        } else {
            TurnPhase::AwaitingRoll
        }
    }

    /// Prepend an event, discarding the oldest past the cap.
    pub fn log(&mut self, line: impl Into<String>) {
        self.event_log.push_front(line.into());
        self.event_log.truncate(MAX_LOG_ENTRIES);
    }

    /// Display name for log lines; falls back to the seat number.
    pub fn seat_name(&self, seat: usize) -> String {
        self.seats
            .get(seat)
            .and_then(|s| s.as_ref())
            .map(|s| s.display_name.clone())
            .unwrap_or_else(|| format!("Seat {}", seat + 1))
    }

    pub fn seat_of_connection(&self, connection_id: &str) -> Option<usize> {
        self.seats.iter().position(|seat| {
            seat.as_ref()
                .is_some_and(|s| s.connection_id == connection_id)
        })
    }

    pub fn survivors(&self) -> Vec<usize> {
        (0..self.player_count)
            .filter(|&i| !self.eliminated[i])
            .collect()
    }

    pub fn border_occupied(&self, slot: u8) -> bool {
        border_bit(slot).is_some_and(|bit| self.border_mask & (1 << bit) != 0)
    }

    pub fn set_border(&mut self, slot: u8, occupied: bool) {
        if let Some(bit) = border_bit(slot) {
            if occupied {
                self.border_mask |= 1 << bit;
            } else {
                self.border_mask &= !(1 << bit);
            }
        }
    }

    pub fn occupied_borders(&self) -> Vec<u8> {
        BORDER_NUMBERS
            .iter()
            .copied()
            .filter(|&slot| self.border_occupied(slot))
            .collect()
    }

    /// Client-facing view of the room.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            player_count: self.player_count,
            coins: self.coins.clone(),
            eliminated: self.eliminated.clone(),
            rolls_taken: self.rolls_taken.clone(),
            grace: self.grace.iter().map(GraceStatus::as_str).collect(),
            current_turn: self.current_turn,
            center_pool: self.center_pool,
            border_slots: BORDER_NUMBERS
                .iter()
                .map(|&slot| BorderSlotView {
                    slot,
                    occupied: self.border_occupied(slot),
                })
                .collect(),
            log: self.event_log.iter().cloned().collect(),
            last_roll: self.last_roll,
            required_move: self.required_move.as_ref().map(RequiredMove::view),
            paused: self.paused,
            phase: self.phase().as_str(),
            seats: self
                .seats
                .iter()
                .map(|seat| {
                    seat.as_ref().map(|s| SeatView {
                        name: s.display_name.clone(),
                        avatar: s.avatar.clone(),
                    })
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct BorderSlotView {
    pub slot: u8,
    pub occupied: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SeatView {
    pub name: String,
    pub avatar: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RequiredMoveView {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u8>,
}

/// Full-state snapshot pushed to every participant after each mutation.
#[derive(Clone, Debug, Serialize)]
pub struct RoomSnapshot {
    #[serde(rename = "playerCount")]
    pub player_count: usize,
    pub coins: Vec<u32>,
    pub eliminated: Vec<bool>,
    #[serde(rename = "rollsTaken")]
    pub rolls_taken: Vec<u32>,
    pub grace: Vec<&'static str>,
    #[serde(rename = "currentTurn")]
    pub current_turn: usize,
    #[serde(rename = "centerPool")]
    pub center_pool: u32,
    #[serde(rename = "borderSlots")]
    pub border_slots: Vec<BorderSlotView>,
    pub log: Vec<String>,
    #[serde(rename = "lastRoll", skip_serializing_if = "Option::is_none")]
    pub last_roll: Option<[u8; 2]>,
    #[serde(rename = "requiredMove", skip_serializing_if = "Option::is_none")]
    pub required_move: Option<RequiredMoveView>,
    pub paused: bool,
    pub phase: &'static str,
    pub seats: Vec<Option<SeatView>>,
}
