//! Pure rule engines for the two Parlor games.
//!
//! These modules decide move legality and compute next-state fragments;
//! they never touch the store. The synchronizer in `parlor-room` is the
//! only caller: it validates through these functions before any write is
//! attempted, so an illegal move dies locally as a plain `Err`.

mod elimination;
mod error;
mod guessing;

pub use elimination::{
    apply_move, can_make_move, mark_stuck_allowed, roll_dice, validate_roll_total,
};
pub use error::RuleError;
pub use guessing::{SECRET_MAX, SECRET_MIN, hint_for, record_guess, validate_secret};
