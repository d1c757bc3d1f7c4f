//! Move rule table.
//!
//! Total → required move:
//! 3,4,5,6,8,9,10,11 = border slot: deposit when empty, withdraw when occupied
//! 7                 = deposit into the center vault
//! 2                 = collect every occupied border slot
//! 12                = collect the borders and drain the vault
//!
//! Derivation is separated from application so the required move can be
//! announced for confirmation before any coin moves, and replayed in tests.

use crate::state::{border_bit, RequiredMoveView};

/// The mandatory action implied by a confirmed dice total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequiredMove {
    /// Place one coin on an empty border slot.
    Deposit { slot: u8 },
    /// Pay one coin into the center vault.
    DepositCenter,
    /// Take the coin sitting on an occupied border slot.
    Withdraw { slot: u8 },
    /// Sweep every occupied border slot.
    CollectBorders,
    /// Sweep the borders and the entire vault.
    CollectAll,
}

impl RequiredMove {
    /// Moves that cost the acting player a coin.
    pub fn is_deposit(&self) -> bool {
        matches!(self, RequiredMove::Deposit { .. } | RequiredMove::DepositCenter)
    }

    pub fn view(&self) -> RequiredMoveView {
        match self {
            RequiredMove::Deposit { slot } => RequiredMoveView {
                kind: "deposit",
                slot: Some(*slot),
            },
            RequiredMove::DepositCenter => RequiredMoveView {
                kind: "depositCenter",
                slot: None,
            },
            RequiredMove::Withdraw { slot } => RequiredMoveView {
                kind: "withdraw",
                slot: Some(*slot),
            },
            RequiredMove::CollectBorders => RequiredMoveView {
                kind: "collectBorders",
                slot: None,
            },
            RequiredMove::CollectAll => RequiredMoveView {
                kind: "collectAll",
                slot: None,
            },
        }
    }

    /// Announcement line for the event log, keyed by move type.
    pub fn describe(&self, name: &str) -> String {
        match self {
            RequiredMove::Deposit { slot } => format!("{name} must place a coin on {slot}"),
            RequiredMove::DepositCenter => format!("{name} must pay a coin into the vault"),
            RequiredMove::Withdraw { slot } => format!("{name} takes the coin on {slot}"),
            RequiredMove::CollectBorders => format!("{name} sweeps the border coins"),
            RequiredMove::CollectAll => format!("{name} sweeps the board and empties the vault"),
        }
    }
}

/// Derive the mandatory move for a confirmed total against the current
/// border occupancy. Total over its input: any total outside the rule table
/// (impossible with two dice) maps to no move.
pub fn derive_required_move(total: u8, border_mask: u8) -> Option<RequiredMove> {
    match total {
        7 => Some(RequiredMove::DepositCenter),
        2 => Some(RequiredMove::CollectBorders),
        12 => Some(RequiredMove::CollectAll),
        slot => match border_bit(slot) {
            Some(bit) if border_mask & (1 << bit) != 0 => Some(RequiredMove::Withdraw { slot }),
            Some(_) => Some(RequiredMove::Deposit { slot }),
            None => None,
        },
    }
}
