use std::collections::HashSet;

use fairtable_core::{PlayerId, PublicKey};

use crate::error::ConsensusError;

/// Known members and their verifying keys, in seat order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    members: Vec<(PlayerId, PublicKey)>,
}

impl Roster {
    pub fn new(members: Vec<(PlayerId, PublicKey)>) -> Result<Self, ConsensusError> {
        let mut seen = HashSet::new();
        for (id, _) in &members {
            if !seen.insert(id) {
                return Err(ConsensusError::RosterMismatch(format!("duplicate member {id}")));
            }
        }
        Ok(Roster { members })
    }

    pub fn key_of(&self, id: &PlayerId) -> Option<&PublicKey> {
        self.members.iter().find(|(m, _)| m == id).map(|(_, key)| key)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.key_of(id).is_some()
    }

    pub fn remove(&mut self, id: &PlayerId) -> bool {
        let before = self.members.len();
        self.members.retain(|(m, _)| m != id);
        self.members.len() != before
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.members.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(PlayerId, PublicKey)> {
        self.members.iter()
    }
}
