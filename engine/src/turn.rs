//! Turn state machine.
//!
//! One full turn cycle per seat: roll → confirm → mandatory action → turn
//! end. Every handler is a plain state transition on [`RoomState`] that
//! returns the discrete signals it emitted; the caller broadcasts a fresh
//! snapshot after each successful mutation.

use crate::error::RoomError;
use crate::rules::{derive_required_move, RequiredMove};
use crate::state::{GraceStatus, RoomState, TurnPhase, MAX_ROLLS_PER_SEAT};

/// Discrete events a transition can emit beyond the snapshot itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Terminal state: winner seat indices (empty on a no-contest draw) and
    /// the final coin counts.
    GameOver { winners: Vec<usize>, coins: Vec<u32> },
}

/// A seat rolls the dice. Valid only while the room is unpaused, on that
/// seat's turn, with no roll or move already pending.
pub fn handle_roll(
    state: &mut RoomState,
    seat: usize,
    roll: [u8; 2],
) -> Result<Vec<Signal>, RoomError> {
    if state.paused {
        return Err(RoomError::Paused);
    }
    if seat != state.current_turn {
        return Err(RoomError::NotYourTurn);
    }
    if state.phase() != TurnPhase::AwaitingRoll {
        return Err(RoomError::RollPending);
    }

    state.last_roll = Some(roll);
    state.rolls_taken[seat] += 1;
    let name = state.seat_name(seat);
    state.log(format!("{name} rolls {} and {}", roll[0], roll[1]));
    Ok(Vec::new())
}

/// The roller claims the sum of their dice. A wrong claim is logged and the
/// turn stays in the confirm phase; a correct claim derives the required
/// move. A deposit required of a player holding no coins eliminates them on
/// the spot, skipping the action phase.
pub fn handle_confirm(
    state: &mut RoomState,
    seat: usize,
    claimed: u8,
) -> Result<Vec<Signal>, RoomError> {
    if state.paused {
        return Err(RoomError::Paused);
    }
    if seat != state.current_turn {
        return Err(RoomError::NotYourTurn);
    }
    if state.phase() != TurnPhase::AwaitingConfirm {
        return Err(RoomError::NothingToConfirm);
    }
    let roll = match state.last_roll {
        Some(roll) => roll,
        None => return Err(RoomError::NothingToConfirm),
    };

    let total = roll[0] + roll[1];
    let name = state.seat_name(seat);
    if claimed != total {
        state.log(format!(
            "{name} claims {claimed}, but the dice show {total}"
        ));
        return Ok(Vec::new());
    }

    let Some(required) = derive_required_move(total, state.border_mask) else {
        // Unreachable with two dice; close the turn rather than wedge it.
        return Ok(end_turn(state, seat));
    };

    if required.is_deposit() && state.coins[seat] == 0 {
        state.eliminated[seat] = true;
        state.log(format!("{name} cannot pay and is out of the game"));
        return Ok(end_turn(state, seat));
    }

    state.log(required.describe(&name));
    state.required_move = Some(required);
    Ok(Vec::new())
}

/// Execute the pending required move for the current seat. A call with no
/// pending move, or while the room is paused, is a no-op.
pub fn handle_action(state: &mut RoomState, seat: usize) -> Result<Vec<Signal>, RoomError> {
    if state.paused {
        return Ok(Vec::new());
    }
    if seat != state.current_turn {
        return Err(RoomError::NotYourTurn);
    }
    let Some(required) = state.required_move.clone() else {
        return Ok(Vec::new());
    };
    let was_deposit = required.is_deposit();

    let name = state.seat_name(seat);
    if was_deposit && state.coins[seat] == 0 {
        state.eliminated[seat] = true;
        state.log(format!("{name} cannot pay and is out of the game"));
        return Ok(end_turn(state, seat));
    }

    match required {
        RequiredMove::Deposit { slot } => {
            state.coins[seat] -= 1;
            state.set_border(slot, true);
            state.log(format!("{name} places a coin on {slot}"));
        }
        RequiredMove::DepositCenter => {
            state.coins[seat] -= 1;
            state.center_pool += 1;
            state.log(format!("{name} pays a coin into the vault"));
        }
        RequiredMove::Withdraw { slot } => {
            // Empty slot means the move went stale; nothing to take.
            if state.border_occupied(slot) {
                state.set_border(slot, false);
                state.coins[seat] += 1;
                clear_grace(state, seat);
                state.log(format!("{name} takes the coin on {slot}"));
            }
        }
        RequiredMove::CollectBorders => {
            let swept = sweep_borders(state, seat);
            state.log(format!("{name} sweeps {swept} border coins"));
        }
        RequiredMove::CollectAll => {
            let swept = sweep_borders(state, seat);
            let vault = state.center_pool;
            state.coins[seat] += vault;
            state.center_pool = 0;
            clear_grace(state, seat);
            state.log(format!(
                "{name} sweeps {swept} border coins and {vault} from the vault"
            ));
        }
    }

    // A deposit that spent the last coin grants the one-turn reprieve.
    if was_deposit && state.coins[seat] == 0 && state.grace[seat] == GraceStatus::Normal {
        state.grace[seat] = GraceStatus::Pending;
        state.log(format!("{name} is out of coins and gets one last chance"));
    }

    Ok(end_turn(state, seat))
}

fn sweep_borders(state: &mut RoomState, seat: usize) -> u32 {
    let slots = state.occupied_borders();
    for slot in &slots {
        state.set_border(*slot, false);
    }
    let swept = slots.len() as u32;
    state.coins[seat] += swept;
    clear_grace(state, seat);
    swept
}

fn clear_grace(state: &mut RoomState, seat: usize) {
    if state.coins[seat] > 0 && state.grace[seat] != GraceStatus::Normal {
        state.grace[seat] = GraceStatus::Normal;
    }
}

/// Shared turn-end procedure: grace expiry, termination check, turn advance
/// and grace promotion for the incoming player.
fn end_turn(state: &mut RoomState, seat: usize) -> Vec<Signal> {
    state.required_move = None;

    if !state.eliminated[seat] && state.grace[seat] == GraceStatus::Active {
        if state.coins[seat] == 0 {
            state.eliminated[seat] = true;
            let name = state.seat_name(seat);
            state.log(format!("{name}'s last chance is spent; they are out"));
        } else {
            state.grace[seat] = GraceStatus::Normal;
        }
    }

    if let Some(signal) = check_termination(state) {
        state.last_roll = None;
        return vec![signal];
    }

    let count = state.player_count;
    let mut next = seat;
    for step in 1..=count {
        let candidate = (seat + step) % count;
        if !state.eliminated[candidate] {
            next = candidate;
            break;
        }
    }
    state.current_turn = next;

    if state.grace[next] == GraceStatus::Pending {
        state.grace[next] = GraceStatus::Active;
        let name = state.seat_name(next);
        state.log(format!("this is {name}'s last-chance turn"));
    }

    state.last_roll = None;
    Vec::new()
}

/// Terminal conditions, evaluated at every turn end before advancing.
fn check_termination(state: &mut RoomState) -> Option<Signal> {
    let survivors = state.survivors();

    if survivors.len() <= 1 {
        match survivors.first() {
            Some(&winner) => {
                let name = state.seat_name(winner);
                state.log(format!("{name} wins the game"));
            }
            None => state.log("no one survives; the game is a draw"),
        }
        state.paused = true;
        return Some(Signal::GameOver {
            winners: survivors,
            coins: state.coins.clone(),
        });
    }

    let exhausted = survivors
        .iter()
        .all(|&s| state.rolls_taken[s] >= MAX_ROLLS_PER_SEAT);
    if !exhausted {
        return None;
    }

    let best = survivors
        .iter()
        .map(|&s| state.coins[s])
        .max()
        .unwrap_or(0);
    let winners: Vec<usize> = survivors
        .into_iter()
        .filter(|&s| state.coins[s] == best)
        .collect();
    let names: Vec<String> = winners.iter().map(|&s| state.seat_name(s)).collect();
    state.log(format!(
        "all rolls are spent; {} win with {best} coins",
        names.join(" and ")
    ));
    state.paused = true;
    Some(Signal::GameOver {
        winners,
        coins: state.coins.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RoomState;

    fn live_room(count: usize) -> RoomState {
        let mut state = RoomState::new(count, "host");
        state.paused = false;
        state
    }

    #[test]
    fn roll_rejected_while_paused() {
        let mut state = RoomState::new(3, "host");
        assert_eq!(handle_roll(&mut state, 0, [1, 2]), Err(RoomError::Paused));
        assert!(state.last_roll.is_none());
    }

    #[test]
    fn roll_rejected_out_of_turn() {
        let mut state = live_room(3);
        assert_eq!(handle_roll(&mut state, 1, [1, 2]), Err(RoomError::NotYourTurn));
    }

    #[test]
    fn second_roll_rejected_until_confirmed() {
        let mut state = live_room(3);
        handle_roll(&mut state, 0, [1, 2]).unwrap();
        assert_eq!(handle_roll(&mut state, 0, [3, 4]), Err(RoomError::RollPending));
        assert_eq!(state.last_roll, Some([1, 2]));
        assert_eq!(state.rolls_taken[0], 1);
    }

    #[test]
    fn wrong_sum_logs_mismatch_and_keeps_state() {
        let mut state = live_room(3);
        handle_roll(&mut state, 0, [3, 4]).unwrap();
        let before_coins = state.coins.clone();
        handle_confirm(&mut state, 0, 8).unwrap();
        assert_eq!(state.phase(), TurnPhase::AwaitingConfirm);
        assert_eq!(state.coins, before_coins);
        assert!(state.event_log[0].contains("claims 8"));
        // A correct claim afterwards still goes through.
        handle_confirm(&mut state, 0, 7).unwrap();
        assert_eq!(state.required_move, Some(RequiredMove::DepositCenter));
    }

    #[test]
    fn confirm_without_roll_is_an_error() {
        let mut state = live_room(3);
        assert_eq!(
            handle_confirm(&mut state, 0, 7),
            Err(RoomError::NothingToConfirm)
        );
    }

    #[test]
    fn action_without_pending_move_is_a_no_op() {
        let mut state = live_room(3);
        let before = state.coins.clone();
        assert_eq!(handle_action(&mut state, 0), Ok(Vec::new()));
        assert_eq!(state.coins, before);
        assert_eq!(state.current_turn, 0);
    }

    #[test]
    fn withdraw_of_stale_slot_still_ends_the_turn() {
        let mut state = live_room(3);
        state.required_move = Some(RequiredMove::Withdraw { slot: 9 });
        handle_action(&mut state, 0).unwrap();
        assert_eq!(state.coins[0], 4);
        assert_eq!(state.current_turn, 1);
        assert!(state.required_move.is_none());
    }

    #[test]
    fn deposit_fills_slot_and_advances() {
        let mut state = live_room(3);
        handle_roll(&mut state, 0, [4, 5]).unwrap();
        handle_confirm(&mut state, 0, 9).unwrap();
        assert_eq!(state.required_move, Some(RequiredMove::Deposit { slot: 9 }));
        handle_action(&mut state, 0).unwrap();
        assert_eq!(state.coins[0], 3);
        assert!(state.border_occupied(9));
        assert_eq!(state.current_turn, 1);
        assert!(state.last_roll.is_none());
    }

    #[test]
    fn withdraw_credits_the_player() {
        let mut state = live_room(3);
        state.set_border(6, true);
        handle_roll(&mut state, 0, [2, 4]).unwrap();
        handle_confirm(&mut state, 0, 6).unwrap();
        assert_eq!(state.required_move, Some(RequiredMove::Withdraw { slot: 6 }));
        handle_action(&mut state, 0).unwrap();
        assert_eq!(state.coins[0], 5);
        assert!(!state.border_occupied(6));
    }

    #[test]
    fn turn_advance_skips_eliminated_seats() {
        let mut state = live_room(4);
        state.eliminated[1] = true;
        state.eliminated[2] = true;
        handle_roll(&mut state, 0, [3, 4]).unwrap();
        handle_confirm(&mut state, 0, 7).unwrap();
        handle_action(&mut state, 0).unwrap();
        assert_eq!(state.current_turn, 3);
    }

    #[test]
    fn sole_survivor_ends_the_game() {
        let mut state = live_room(3);
        state.eliminated[2] = true;
        state.coins[0] = 0;
        // Seat 0 owes a deposit it cannot pay; seat 1 is the last one standing.
        handle_roll(&mut state, 0, [5, 6]).unwrap();
        let signals = handle_confirm(&mut state, 0, 11).unwrap();
        assert!(state.eliminated[0]);
        assert_eq!(
            signals,
            vec![Signal::GameOver {
                winners: vec![1],
                coins: state.coins.clone(),
            }]
        );
        assert!(state.paused);
    }
}
