use serde::{Deserialize, Serialize};

/// Handle to a card drawn from the shared deck, before it is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u32);

/// A revealed card. Its encoding belongs to the dealing protocol; the
/// consensus core only stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Card(pub u8);
