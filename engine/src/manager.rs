//! Session and room management.
//!
//! [`RoomStore`] is the only mutable shared resource: an explicit mapping
//! from room code to [`RoomState`]. Callers pass the room code and their
//! transport identity into every operation; nothing here resolves identity
//! on its own.

use std::collections::HashMap;

use tracing::info;

use crate::error::RoomError;
use crate::state::{RoomState, Seat, MAX_NICKNAME_LENGTH};

/// Host-only control actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostAction {
    Pause,
    Resume,
    Reset,
}

/// Owned mapping from room code to room state.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: HashMap<String, RoomState>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Room codes are matched case-insensitively.
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_ascii_uppercase()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rooms.contains_key(&Self::normalize_code(code))
    }

    /// Open a room under `code` with the creator as host. Player counts
    /// outside [3, 6] are clamped, never rejected.
    pub fn create(&mut self, code: &str, player_count: usize, host_connection_id: &str) {
        let code = Self::normalize_code(code);
        let mut state = RoomState::new(player_count, host_connection_id);
        state.log(format!(
            "room {code} opens with {} seats",
            state.player_count
        ));
        info!(room = %code, players = state.player_count, "room created");
        self.rooms.insert(code, state);
    }

    pub fn get(&self, code: &str) -> Result<&RoomState, RoomError> {
        self.rooms
            .get(&Self::normalize_code(code))
            .ok_or(RoomError::RoomNotFound)
    }

    pub fn get_mut(&mut self, code: &str) -> Result<&mut RoomState, RoomError> {
        self.rooms
            .get_mut(&Self::normalize_code(code))
            .ok_or(RoomError::RoomNotFound)
    }

    pub fn remove(&mut self, code: &str) -> Option<RoomState> {
        self.rooms.remove(&Self::normalize_code(code))
    }

    /// Vacate every seat bound to a disconnecting identity, across every
    /// room (an identity holds one seat in practice; the scan is defensive).
    /// Returns the codes of the rooms that changed.
    pub fn vacate_connection(&mut self, connection_id: &str) -> Vec<String> {
        let mut touched = Vec::new();
        for (code, state) in self.rooms.iter_mut() {
            let mut changed = false;
            for seat in 0..state.seats.len() {
                let held = state.seats[seat]
                    .as_ref()
                    .is_some_and(|s| s.connection_id == connection_id);
                if !held {
                    continue;
                }
                let name = state.seat_name(seat);
                state.seats[seat] = None;
                state.log(format!("{name} leaves the table"));
                changed = true;
            }
            if changed {
                touched.push(code.clone());
            }
        }
        touched
    }
}

fn normalize_nickname(nick: &str, seat: usize) -> String {
    let trimmed = nick.trim();
    if trimmed.is_empty() {
        return format!("Folletto {}", seat + 1);
    }
    trimmed.chars().take(MAX_NICKNAME_LENGTH).collect()
}

/// Claim a vacant seat. Re-claiming one's own seat is idempotent; a seat
/// held by another identity is never handed over.
pub fn claim_seat(
    state: &mut RoomState,
    seat: usize,
    nick: &str,
    avatar: &str,
    connection_id: &str,
) -> Result<(), RoomError> {
    if seat >= state.player_count {
        return Err(RoomError::SeatOutOfRange(seat));
    }
    match &state.seats[seat] {
        Some(existing) if existing.connection_id == connection_id => return Ok(()),
        Some(_) => return Err(RoomError::SeatTaken(seat)),
        None => {}
    }

    let name = normalize_nickname(nick, seat);
    state.seats[seat] = Some(Seat {
        display_name: name.clone(),
        avatar: avatar.to_string(),
        connection_id: connection_id.to_string(),
    });
    state.log(format!("{name} sits at seat {}", seat + 1));
    Ok(())
}

/// Rename an already-claimed seat; only its occupant may rename it.
pub fn rename(
    state: &mut RoomState,
    seat: usize,
    nick: &str,
    connection_id: &str,
) -> Result<(), RoomError> {
    if seat >= state.player_count {
        return Err(RoomError::SeatOutOfRange(seat));
    }
    let occupant = state.seats[seat]
        .as_mut()
        .ok_or(RoomError::SeatVacant(seat))?;
    if occupant.connection_id != connection_id {
        return Err(RoomError::NotYourSeat(seat));
    }

    let old = occupant.display_name.clone();
    let new = normalize_nickname(nick, seat);
    occupant.display_name = new.clone();
    state.log(format!("{old} is now called {new}"));
    Ok(())
}

/// Unpause the room; host only.
pub fn start_game(state: &mut RoomState, connection_id: &str) -> Result<(), RoomError> {
    if connection_id != state.host_connection_id {
        return Err(RoomError::NotHost);
    }
    state.paused = false;
    state.log("the game begins");
    Ok(())
}

/// Pause, resume or reset the room; host only. Reset reinitializes to a
/// fresh board for the same player count, preserving the host identity.
pub fn host_control(
    state: &mut RoomState,
    action: HostAction,
    connection_id: &str,
) -> Result<(), RoomError> {
    if connection_id != state.host_connection_id {
        return Err(RoomError::NotHost);
    }
    match action {
        HostAction::Pause => {
            state.paused = true;
            state.log("the host pauses the game");
        }
        HostAction::Resume => {
            state.paused = false;
            state.log("the host resumes the game");
        }
        HostAction::Reset => {
            let host = state.host_connection_id.clone();
            *state = RoomState::new(state.player_count, host);
            state.log("the host resets the board");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GraceStatus, MAX_PLAYERS, MIN_PLAYERS, STARTING_COINS};

    fn store_with_room(code: &str, players: usize) -> RoomStore {
        let mut store = RoomStore::new();
        store.create(code, players, "host-conn");
        store
    }

    #[test]
    fn codes_are_case_normalized() {
        let store = store_with_room("abcd", 4);
        assert!(store.get("ABCD").is_ok());
        assert!(store.get(" abcd ").is_ok());
        assert!(matches!(store.get("ZZZZ"), Err(RoomError::RoomNotFound)));
    }

    #[test]
    fn unknown_room_is_an_error() {
        let store = RoomStore::new();
        assert!(matches!(store.get("NOPE"), Err(RoomError::RoomNotFound)));
    }

    #[test]
    fn player_count_is_clamped_on_create() {
        let mut store = RoomStore::new();
        store.create("LOW", 1, "h");
        store.create("HIGH", 20, "h");
        assert_eq!(store.get("LOW").unwrap().player_count, MIN_PLAYERS);
        assert_eq!(store.get("HIGH").unwrap().player_count, MAX_PLAYERS);
    }

    #[test]
    fn claim_is_idempotent_for_the_same_identity() {
        let mut store = store_with_room("ROOM", 3);
        let state = store.get_mut("ROOM").unwrap();
        claim_seat(state, 0, "Anna", "imp", "conn-a").unwrap();
        assert_eq!(claim_seat(state, 0, "Anna", "imp", "conn-a"), Ok(()));
        assert_eq!(
            claim_seat(state, 0, "Bruno", "elf", "conn-b"),
            Err(RoomError::SeatTaken(0))
        );
        assert_eq!(
            claim_seat(state, 7, "Bruno", "elf", "conn-b"),
            Err(RoomError::SeatOutOfRange(7))
        );
    }

    #[test]
    fn nicknames_are_defaulted_and_capped() {
        let mut store = store_with_room("ROOM", 3);
        let state = store.get_mut("ROOM").unwrap();
        claim_seat(state, 0, "   ", "imp", "conn-a").unwrap();
        assert_eq!(state.seat_name(0), "Folletto 1");
        let long = "x".repeat(60);
        claim_seat(state, 1, &long, "elf", "conn-b").unwrap();
        assert_eq!(state.seat_name(1).len(), MAX_NICKNAME_LENGTH);
    }

    #[test]
    fn rename_requires_the_occupant() {
        let mut store = store_with_room("ROOM", 3);
        let state = store.get_mut("ROOM").unwrap();
        claim_seat(state, 0, "Anna", "imp", "conn-a").unwrap();
        assert_eq!(
            rename(state, 0, "Annika", "conn-b"),
            Err(RoomError::NotYourSeat(0))
        );
        assert_eq!(rename(state, 1, "Ghost", "conn-b"), Err(RoomError::SeatVacant(1)));
        rename(state, 0, "Annika", "conn-a").unwrap();
        assert_eq!(state.seat_name(0), "Annika");
        assert!(state.event_log[0].contains("Anna") && state.event_log[0].contains("Annika"));
    }

    #[test]
    fn host_controls_reject_other_callers() {
        let mut store = store_with_room("ROOM", 3);
        let state = store.get_mut("ROOM").unwrap();
        assert_eq!(start_game(state, "someone"), Err(RoomError::NotHost));
        assert_eq!(
            host_control(state, HostAction::Pause, "someone"),
            Err(RoomError::NotHost)
        );
        start_game(state, "host-conn").unwrap();
        assert!(!state.paused);
    }

    #[test]
    fn reset_yields_a_fresh_board_with_the_same_host() {
        let mut store = store_with_room("ROOM", 4);
        let state = store.get_mut("ROOM").unwrap();
        claim_seat(state, 2, "Anna", "imp", "conn-a").unwrap();
        start_game(state, "host-conn").unwrap();
        state.coins[2] = 0;
        state.eliminated[2] = true;
        state.grace[1] = GraceStatus::Pending;
        state.center_pool = 3;

        host_control(state, HostAction::Reset, "host-conn").unwrap();
        assert_eq!(state.player_count, 4);
        assert_eq!(state.host_connection_id, "host-conn");
        assert!(state.paused);
        assert_eq!(state.coins, vec![STARTING_COINS; 4]);
        assert_eq!(state.eliminated, vec![false; 4]);
        assert_eq!(state.grace, vec![GraceStatus::Normal; 4]);
        assert_eq!(state.center_pool, 0);
        assert!(state.seats.iter().all(Option::is_none));
    }

    #[test]
    fn disconnect_vacates_across_rooms() {
        let mut store = RoomStore::new();
        store.create("AAAA", 3, "h1");
        store.create("BBBB", 3, "h2");
        claim_seat(store.get_mut("AAAA").unwrap(), 0, "Anna", "imp", "conn-a").unwrap();
        claim_seat(store.get_mut("BBBB").unwrap(), 1, "Anna", "imp", "conn-a").unwrap();
        claim_seat(store.get_mut("BBBB").unwrap(), 2, "Bruno", "elf", "conn-b").unwrap();

        let mut touched = store.vacate_connection("conn-a");
        touched.sort();
        assert_eq!(touched, vec!["AAAA".to_string(), "BBBB".to_string()]);
        assert!(store.get("AAAA").unwrap().seats[0].is_none());
        assert!(store.get("BBBB").unwrap().seats[1].is_none());
        assert!(store.get("BBBB").unwrap().seats[2].is_some());
        assert!(store.vacate_connection("conn-a").is_empty());
    }
}
