//! Fairtable State - the deterministic table state machine
//!
//! A `Session` is only ever changed by `Session::apply` (and the hand
//! lifecycle helpers), so every peer that applies the same committed actions
//! in the same order holds byte-identical state.

pub mod error;
pub mod player;
pub mod pot;
pub mod rules;
pub mod session;

pub use error::{RuleViolation, StateError};
pub use player::{Player, Seat};
pub use pot::{compute_pots, Pot};
pub use rules::Effect;
pub use session::Session;
