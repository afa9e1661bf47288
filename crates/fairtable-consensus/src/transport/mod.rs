//! Round-synchronous group communication used by the consensus engine.
//!
//! The engine only needs two collectives: a rooted broadcast for the
//! proposal and an all-to-all exchange for the votes. Every member calls
//! the same collectives in the same order, so each implementation numbers
//! its calls per channel and matches them up by sequence number.

mod local;
mod mailbox;

use async_trait::async_trait;
use fairtable_core::PlayerId;

use crate::error::TransportError;

pub use local::{LocalNetwork, LocalTransport};
pub use mailbox::{Channel, Mailbox, Sequencer};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Identity of the member this handle speaks for
    fn local_id(&self) -> &PlayerId;

    /// Current members in roster order, including the local one
    fn members(&self) -> Vec<PlayerId>;

    /// Rooted broadcast. The root passes `Some(payload)`, sends it to every
    /// other member and gets it back. Everyone else passes `None` and waits
    /// for the root's payload.
    async fn broadcast(
        &self,
        payload: Option<Vec<u8>>,
        root: &PlayerId,
    ) -> Result<Vec<u8>, TransportError>;

    /// Every member contributes one payload and receives all of them,
    /// ordered by `members()`.
    async fn all_to_all(&self, payload: Vec<u8>) -> Result<Vec<Vec<u8>>, TransportError>;

    /// Stop addressing an expelled member
    async fn remove_member(&self, id: &PlayerId) -> Result<(), TransportError>;

    /// Release resources. Pending and later calls fail with `Closed`.
    async fn shutdown(&self);
}
