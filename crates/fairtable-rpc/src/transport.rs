//! Collective transport over HTTP.
//!
//! Each peer exposes `/consensus/broadcast/{seq}` and
//! `/consensus/exchange/{seq}`; inbound payloads land in the local
//! [`Mailbox`] and the collective calls wait on it exactly as the in-process
//! transport does. Every delivery is signed with the sender's roster key and
//! checked by [`Inbound`] before it is deposited.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use fairtable_consensus::{Channel, Mailbox, Sequencer, Transport, TransportError};
use fairtable_core::serialize::to_canonical_bytes;
use fairtable_core::{sign, verify, CoreError, PlayerId, PublicKey, SecretKey, Signature};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::RpcError;

const SEND_ATTEMPTS: usize = 10;
const RETRY_DELAY: Duration = Duration::from_millis(300);

/// Body of a peer-to-peer delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverRequest {
    pub from: PlayerId,
    /// Hex-encoded payload
    pub payload: String,
    /// Sender's signature over channel, sequence number, sender and payload
    pub signature: Signature,
}

impl DeliverRequest {
    pub fn signed(
        channel: Channel,
        seq: u64,
        from: PlayerId,
        payload: &[u8],
        secret: &SecretKey,
    ) -> Result<Self, CoreError> {
        let payload = hex::encode(payload);
        let message = delivery_message(channel, seq, &from, &payload)?;
        Ok(DeliverRequest {
            signature: sign(secret, &message),
            from,
            payload,
        })
    }

    /// Check the signature for the slot this request was posted to
    pub fn verify(&self, channel: Channel, seq: u64, key: &PublicKey) -> Result<(), CoreError> {
        let message = delivery_message(channel, seq, &self.from, &self.payload)?;
        verify(key, &message, &self.signature)
    }
}

fn delivery_message(
    channel: Channel,
    seq: u64,
    from: &PlayerId,
    payload: &str,
) -> Result<Vec<u8>, CoreError> {
    to_canonical_bytes(&(channel_path(channel), seq, from, payload))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverResponse {
    pub status: String,
}

/// Where a table member can be reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEndpoint {
    pub id: PlayerId,
    /// Base URL, e.g. `http://127.0.0.1:9001`
    pub address: String,
    /// Key the member signs its deliveries with
    pub pubkey: PublicKey,
}

/// Path segment for a channel
pub fn channel_path(channel: Channel) -> &'static str {
    match channel {
        Channel::Broadcast => "broadcast",
        Channel::Exchange => "exchange",
    }
}

fn read_peers(peers: &RwLock<Vec<PeerEndpoint>>) -> Vec<PeerEndpoint> {
    peers
        .read()
        .map(|p| p.clone())
        .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
}

/// Receiving side of an [`HttpTransport`]. Shares the member list, so a
/// dropped member's deliveries are refused from then on.
#[derive(Clone)]
pub struct Inbound {
    inbox: Arc<Mailbox>,
    peers: Arc<RwLock<Vec<PeerEndpoint>>>,
}

impl Inbound {
    pub fn new(inbox: Arc<Mailbox>, peers: Vec<PeerEndpoint>) -> Self {
        Inbound {
            inbox,
            peers: Arc::new(RwLock::new(peers)),
        }
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.inbox
    }

    /// Authenticate a delivery and deposit its payload. Returns the payload size.
    pub fn accept(
        &self,
        channel: Channel,
        seq: u64,
        request: DeliverRequest,
    ) -> Result<usize, RpcError> {
        let payload = hex::decode(&request.payload)
            .map_err(|e| RpcError::BadRequest(format!("Invalid payload hex: {}", e)))?;
        let key = read_peers(&self.peers)
            .into_iter()
            .find(|p| p.id == request.from)
            .map(|p| p.pubkey)
            .ok_or_else(|| RpcError::Unauthorized(format!("{} is not a member", request.from)))?;
        request.verify(channel, seq, &key).map_err(|e| {
            warn!("Refusing {:?} #{} claimed by {}: {}", channel, seq, request.from, e);
            RpcError::Unauthorized(format!("Bad delivery signature for {}", request.from))
        })?;

        let size = payload.len();
        self.inbox.deposit(channel, seq, request.from, payload)?;
        Ok(size)
    }
}

pub struct HttpTransport {
    me: PlayerId,
    secret: SecretKey,
    /// Every member including the local one, in roster order
    peers: Arc<RwLock<Vec<PeerEndpoint>>>,
    inbox: Arc<Mailbox>,
    seq: Sequencer,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(
        me: PlayerId,
        secret: SecretKey,
        peers: Vec<PeerEndpoint>,
    ) -> Result<Self, TransportError> {
        let local = peers
            .iter()
            .find(|p| p.id == me)
            .ok_or_else(|| TransportError::UnknownMember(me.clone()))?;
        if local.pubkey != secret.public_key() {
            return Err(TransportError::Protocol(format!(
                "signing key does not match the roster key of {me}"
            )));
        }
        Ok(HttpTransport {
            me,
            secret,
            peers: Arc::new(RwLock::new(peers)),
            inbox: Arc::new(Mailbox::new()),
            seq: Sequencer::new(),
            client: reqwest::Client::new(),
        })
    }

    /// Handle the HTTP handlers deliver through
    pub fn inbound(&self) -> Inbound {
        Inbound {
            inbox: Arc::clone(&self.inbox),
            peers: Arc::clone(&self.peers),
        }
    }

    fn endpoints(&self) -> Vec<PeerEndpoint> {
        read_peers(&self.peers)
    }

    fn remote_peers(&self) -> Vec<PeerEndpoint> {
        self.endpoints().into_iter().filter(|p| p.id != self.me).collect()
    }

    async fn send(
        &self,
        peer: &PeerEndpoint,
        channel: Channel,
        seq: u64,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let url = format!(
            "{}/consensus/{}/{}",
            peer.address.trim_end_matches('/'),
            channel_path(channel),
            seq
        );
        let request = DeliverRequest::signed(channel, seq, self.me.clone(), payload, &self.secret)
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let mut last_error = String::new();
        for attempt in 1..=SEND_ATTEMPTS {
            match self.client.post(&url).json(&request).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => last_error = format!("status {}", resp.status()),
                Err(e) => last_error = e.to_string(),
            }
            debug!(
                "Delivery of {:?} #{} to {} failed (attempt {}): {}",
                channel, seq, peer.id, attempt, last_error
            );
            tokio::time::sleep(RETRY_DELAY).await;
        }

        Err(TransportError::Send {
            to: peer.id.clone(),
            reason: last_error,
        })
    }

    async fn send_to_all(&self, peers: &[PeerEndpoint], channel: Channel, seq: u64, payload: &[u8]) {
        let sends = peers.iter().map(|peer| self.send(peer, channel, seq, payload));
        for result in join_all(sends).await {
            if let Err(e) = result {
                warn!("{}", e);
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn local_id(&self) -> &PlayerId {
        &self.me
    }

    fn members(&self) -> Vec<PlayerId> {
        self.endpoints().into_iter().map(|p| p.id).collect()
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
            let peers = self.remote_peers();
            self.send_to_all(&peers, Channel::Broadcast, seq, &payload).await;
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
        let peers = self.remote_peers();
        let peer_ids: Vec<PlayerId> = peers.iter().map(|p| p.id.clone()).collect();

        // Sends run alongside the wait so a slow peer does not hold up collection
        let (_, received) = tokio::join!(
            self.send_to_all(&peers, Channel::Exchange, seq, &payload),
            self.inbox.collect(Channel::Exchange, seq, &peer_ids)
        );
        let mut received = received?;

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
        let mut peers = self
            .peers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = peers.len();
        peers.retain(|p| &p.id != id);
        if peers.len() == before {
            return Err(TransportError::UnknownMember(id.clone()));
        }
        debug!("{} dropped peer {}", self.me, id);
        Ok(())
    }

    async fn shutdown(&self) {
        self.inbox.close();
        debug!("{} transport shut down", self.me);
    }
}
