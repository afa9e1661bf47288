use fairtable_consensus::NodeStatus;
use fairtable_core::{BanCertificate, CommitCertificate};
use fairtable_state::Session;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// WebSocket event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsEvent {
    ActionCommitted {
        proposal_id: String,
        player: String,
        kind: String,
        amount: u64,
        votes: usize,
        total_pot: u64,
        next_to_act: Option<String>,
    },
    PlayerBanned {
        proposal_id: String,
        accused: String,
        reasons: String,
        votes: usize,
        remaining: usize,
    },
    Expelled {
        proposal_id: String,
        reasons: String,
    },
    /// Last published node status, sent on connect and on request
    TableStatus(NodeStatus),
}

impl WsEvent {
    pub fn action_committed(cert: &CommitCertificate, session: &Session) -> Self {
        let (player, kind, amount) = match &cert.proposal.action {
            Some(action) => (action.player.to_string(), action.kind.to_string(), action.amount),
            None => (String::new(), String::new(), 0),
        };
        WsEvent::ActionCommitted {
            proposal_id: cert.proposal_id().to_string(),
            player,
            kind,
            amount,
            votes: cert.votes.len(),
            total_pot: session.total_pot(),
            next_to_act: session.current_player().map(|p| p.id.to_string()),
        }
    }

    pub fn player_banned(cert: &BanCertificate, session: &Session) -> Self {
        WsEvent::PlayerBanned {
            proposal_id: cert.proposal_id.to_string(),
            accused: cert.accused.to_string(),
            reasons: cert.reasons.clone(),
            votes: cert.votes.len(),
            remaining: session.player_count(),
        }
    }

    pub fn expelled(cert: &BanCertificate) -> Self {
        WsEvent::Expelled {
            proposal_id: cert.proposal_id.to_string(),
            reasons: cert.reasons.clone(),
        }
    }

    /// Whether a feed following `player` should see this event. Events about
    /// the local node itself concern every follower.
    pub fn involves(&self, player: &str) -> bool {
        match self {
            WsEvent::ActionCommitted {
                player: actor,
                next_to_act,
                ..
            } => actor == player || next_to_act.as_deref() == Some(player),
            WsEvent::PlayerBanned { accused, .. } => accused == player,
            WsEvent::Expelled { .. } | WsEvent::TableStatus(_) => true,
        }
    }
}

/// Event broadcaster for WebSocket clients
pub struct EventBroadcaster {
    sender: broadcast::Sender<WsEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventBroadcaster { sender }
    }

    /// Broadcast an event to all connected clients
    pub fn broadcast(&self, event: WsEvent) {
        // No receivers is fine
        if let Ok(count) = self.sender.send(event.clone()) {
            debug!("Broadcast {:?} to {} clients", event, count);
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}
