use fairtable_core::PlayerId;
use thiserror::Error;

/// Why an action is illegal in the current session. The `Display` text is
/// what voters put in a Reject vote's reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("player not in session: {0}")]
    UnknownPlayer(PlayerId),

    #[error("wrong round: expected {expected}, got {got}")]
    WrongRound { expected: String, got: String },

    #[error("out-of-turn: {0} is not the current player")]
    OutOfTurn(PlayerId),

    #[error("player has folded")]
    AlreadyFolded,

    #[error("hand is over")]
    HandOver,

    #[error("bet must be positive")]
    ZeroBet,

    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    #[error("illegal check: own bet {bet} below highest bet {highest}")]
    IllegalCheck { bet: u64, highest: u64 },

    #[error("raise below highest bet: {bet} < {highest}")]
    RaiseBelowHighest { bet: u64, highest: u64 },

    #[error("all-in amount mismatch: declared {declared}, expected {expected}")]
    AllInMismatch { declared: u64, expected: u64 },
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Illegal action: {0}")]
    Rule(#[from] RuleViolation),

    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("Duplicate player: {0}")]
    DuplicatePlayer(PlayerId),

    #[error("Session has no players")]
    EmptyTable,

    #[error("Dealer index {dealer} out of range for {players} players")]
    DealerOutOfRange { dealer: usize, players: usize },

    #[error("Player {0} already holds two cards")]
    HandFull(PlayerId),

    #[error("Board already holds five cards")]
    BoardFull,

    #[error("Settlement pays {paid} but pots hold {pot}")]
    SettlementMismatch { paid: u64, pot: u64 },

    #[error("Hand is still in progress")]
    HandInProgress,

    #[error("Core error: {0}")]
    Core(#[from] fairtable_core::CoreError),
}
