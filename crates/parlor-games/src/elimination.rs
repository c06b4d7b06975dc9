//! Rules of the dice-elimination game.
//!
//! Each player starts with the numbers 1..=12 up. On a turn the player
//! rolls two dice and must knock down a subset of their remaining numbers
//! summing exactly to the rolled total. A player with no legal subset for
//! their roll is finished; an emptied board wins instantly.

use std::collections::BTreeSet;

use rand::Rng;

use parlor_protocol::EliminationSeat;

use crate::RuleError;

/// Lowest possible two-dice total.
pub const ROLL_MIN: u8 = 2;
/// Highest possible two-dice total.
pub const ROLL_MAX: u8 = 12;

/// Rolls two independent six-sided dice.
pub fn roll_dice<R: Rng + ?Sized>(rng: &mut R) -> (u8, u8) {
    (rng.random_range(1..=6), rng.random_range(1..=6))
}

/// Checks that a total is achievable with two dice.
pub fn validate_roll_total(total: u8) -> Result<(), RuleError> {
    if !(ROLL_MIN..=ROLL_MAX).contains(&total) {
        return Err(RuleError::OutOfRange {
            value: total,
            min: ROLL_MIN,
            max: ROLL_MAX,
        });
    }
    Ok(())
}

/// Decides whether any non-empty subset of `numbers` sums exactly to
/// `target`.
///
/// Exact subset-sum over at most 12 elements; the exponential worst case
/// is fine at this size.
pub fn can_make_move(target: u8, numbers: &BTreeSet<u8>) -> bool {
    fn can_form(target: i16, rest: &[u8]) -> bool {
        if target == 0 {
            return true;
        }
        if target < 0 || rest.is_empty() {
            return false;
        }
        can_form(target - i16::from(rest[0]), &rest[1..]) || can_form(target, &rest[1..])
    }

    if target == 0 {
        return false; // a non-empty subset of positive numbers can't sum to 0
    }
    let numbers: Vec<u8> = numbers.iter().copied().collect();
    can_form(i16::from(target), &numbers)
}

/// Validates that ending the turn without a move is legal for this roll:
/// no subset of the remaining numbers reaches the total.
pub fn mark_stuck_allowed(roll: u8, numbers: &BTreeSet<u8>) -> Result<(), RuleError> {
    if can_make_move(roll, numbers) {
        return Err(RuleError::MovesAvailable);
    }
    Ok(())
}

/// Applies a move: validates the chosen subset against the roll, knocks
/// the numbers down, and recomputes the cached score.
pub fn apply_move(
    seat: &mut EliminationSeat,
    roll: u8,
    chosen: &BTreeSet<u8>,
) -> Result<(), RuleError> {
    if chosen.is_empty() {
        return Err(RuleError::EmptySelection);
    }
    if let Some(&missing) = chosen.iter().find(|n| !seat.numbers.contains(n)) {
        return Err(RuleError::NotOnBoard(missing));
    }
    let sum: u8 = chosen.iter().sum();
    if sum != roll {
        return Err(RuleError::WrongSum {
            expected: roll,
            got: sum,
        });
    }

    for n in chosen {
        seat.numbers.remove(n);
    }
    seat.score = seat.numbers.iter().sum();
    Ok(())
}
