use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use fairtable_core::PlayerId;
use tracing::{debug, warn};

use super::mailbox::{Channel, Mailbox, Sequencer};
use super::Transport;
use crate::error::TransportError;

/// In-process group of members, one mailbox each
pub struct LocalNetwork {
    members: Vec<PlayerId>,
    mailboxes: HashMap<PlayerId, Arc<Mailbox>>,
}

impl LocalNetwork {
    pub fn new(members: Vec<PlayerId>) -> Self {
        let mailboxes = members
            .iter()
            .map(|id| (id.clone(), Arc::new(Mailbox::new())))
            .collect();
        LocalNetwork { members, mailboxes }
    }

    /// Handle for one member
    pub fn transport(&self, id: &PlayerId) -> Result<LocalTransport, TransportError> {
        let inbox = self
            .mailboxes
            .get(id)
            .cloned()
            .ok_or_else(|| TransportError::UnknownMember(id.clone()))?;
        Ok(LocalTransport {
            me: id.clone(),
            members: RwLock::new(self.members.clone()),
            mailboxes: self.mailboxes.clone(),
            inbox,
            seq: Sequencer::new(),
        })
    }

    /// Handles for every member, in roster order
    pub fn transports(&self) -> Vec<LocalTransport> {
        self.members
            .iter()
            .filter_map(|id| self.transport(id).ok())
            .collect()
    }
}

pub struct LocalTransport {
    me: PlayerId,
    members: RwLock<Vec<PlayerId>>,
    mailboxes: HashMap<PlayerId, Arc<Mailbox>>,
    inbox: Arc<Mailbox>,
    seq: Sequencer,
}

impl LocalTransport {
    fn peers(&self) -> Vec<PlayerId> {
        self.members().into_iter().filter(|id| id != &self.me).collect()
    }

    fn send(&self, to: &PlayerId, channel: Channel, seq: u64, payload: &[u8]) {
        let Some(mailbox) = self.mailboxes.get(to) else {
            warn!("No mailbox for {}", to);
            return;
        };
        if let Err(e) = mailbox.deposit(channel, seq, self.me.clone(), payload.to_vec()) {
            warn!("Failed to deliver {:?} #{} to {}: {}", channel, seq, to, e);
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn local_id(&self) -> &PlayerId {
        &self.me
    }

    fn members(&self) -> Vec<PlayerId> {
        self.members
            .read()
            .map(|m| m.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    async fn broadcast(
        &self,
        payload: Option<Vec<u8>>,
        root: &PlayerId,
    ) -> Result<Vec<u8>, TransportError> {
        if self.inbox.is_closed() {
            return Err(TransportError::Closed);
        }
        if !self.members().contains(root) {
            return Err(TransportError::UnknownMember(root.clone()));
        }
        let seq = self.seq.next(Channel::Broadcast);

        if root == &self.me {
            let payload = payload.ok_or_else(|| {
                TransportError::Protocol("broadcast root must supply a payload".to_string())
            })?;
            for peer in self.peers() {
                self.send(&peer, Channel::Broadcast, seq, &payload);
            }
            self.inbox.skip(Channel::Broadcast, seq);
            debug!("{} broadcast #{} ({} bytes)", self.me, seq, payload.len());
            return Ok(payload);
        }

        self.inbox.collect_one(Channel::Broadcast, seq, root).await
    }

    async fn all_to_all(&self, payload: Vec<u8>) -> Result<Vec<Vec<u8>>, TransportError> {
        if self.inbox.is_closed() {
            return Err(TransportError::Closed);
        }
        let seq = self.seq.next(Channel::Exchange);
        let members = self.members();
        let peers = self.peers();

        for peer in &peers {
            self.send(peer, Channel::Exchange, seq, &payload);
        }
        let mut received = self.inbox.collect(Channel::Exchange, seq, &peers).await?;

        members
            .iter()
            .map(|id| {
                if id == &self.me {
                    Ok(payload.clone())
                } else {
                    received
                        .remove(id)
                        .ok_or_else(|| TransportError::Protocol(format!("no payload from {id}")))
                }
            })
            .collect()
    }

    async fn remove_member(&self, id: &PlayerId) -> Result<(), TransportError> {
        let mut members = self
            .members
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = members.len();
        members.retain(|m| m != id);
        if members.len() == before {
            return Err(TransportError::UnknownMember(id.clone()));
        }
        debug!("{} dropped member {}", self.me, id);
        Ok(())
    }

    async fn shutdown(&self) {
        self.inbox.close();
        debug!("{} transport shut down", self.me);
    }
}
