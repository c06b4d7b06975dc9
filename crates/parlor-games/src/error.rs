//! Rule-violation errors shared by both engines.

/// Why a proposed move is illegal.
///
/// These are local rejections: the synchronizer surfaces them to the
/// caller without writing anything to the shared document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// A submitted value is outside its legal range.
    #[error("{value} is outside the legal range {min}..={max}")]
    OutOfRange { value: u8, min: u8, max: u8 },

    /// A move must name at least one number.
    #[error("no numbers selected")]
    EmptySelection,

    /// A selected number is not on the player's board.
    #[error("number {0} is not on the board")]
    NotOnBoard(u8),

    /// The selected numbers do not sum to the rolled total.
    #[error("selection sums to {got}, need exactly {expected}")]
    WrongSum { expected: u8, got: u8 },

    /// The player tried to give up the turn while a legal move exists.
    #[error("a legal move is still available for this roll")]
    MovesAvailable,
}
