//! Folletto's vault rules engine.
//!
//! This crate contains the deterministic per-room game logic: the room state
//! record, the dice resolver, the move rule table, the turn state machine
//! (roll → confirm → mandatory action → turn end) and the session/room
//! management operations. The transport layer lives in `folletto-server`;
//! nothing in this crate performs I/O or publishes anything.
//!
//! ## Determinism requirements
//! - Do not use wall-clock time inside the engine.
//! - Randomness only enters through a [`DiceRng`] owned by the caller; every
//!   intent handler is a plain state transition on [`RoomState`].
//! - Handlers return the discrete [`Signal`]s they emit; the caller decides
//!   how (and whether) to publish snapshots.
//!
//! ## Room lifecycle
//! Rooms are created paused. The host unpauses with `start_game`, players
//! take turns through the handlers in [`turn`], and a terminal state pauses
//! the room again until the host issues a reset.

pub mod dice;
pub mod error;
pub mod manager;
pub mod rules;
pub mod state;
pub mod turn;


pub use dice::DiceRng;
pub use error::RoomError;
pub use manager::{claim_seat, host_control, rename, start_game, HostAction, RoomStore};
pub use rules::{derive_required_move, RequiredMove};
pub use state::{
    GraceStatus, RoomSnapshot, RoomState, Seat, TurnPhase, BORDER_NUMBERS, MAX_LOG_ENTRIES,
    MAX_NICKNAME_LENGTH, MAX_PLAYERS, MAX_ROLLS_PER_SEAT, MIN_PLAYERS, STARTING_COINS,
};
pub use turn::{handle_action, handle_confirm, handle_roll, Signal};
