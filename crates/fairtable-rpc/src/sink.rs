use std::sync::Arc;

use fairtable_consensus::NodeEventSink;
use fairtable_core::{BanCertificate, CommitCertificate};
use fairtable_state::Session;

use crate::ws::{EventBroadcaster, WsEvent};

/// Forwards node decisions to WebSocket subscribers
pub struct RpcEventSink {
    broadcaster: Arc<EventBroadcaster>,
}

impl RpcEventSink {
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        RpcEventSink { broadcaster }
    }
}

impl NodeEventSink for RpcEventSink {
    fn on_commit(&self, cert: &CommitCertificate, session: &Session) {
        self.broadcaster.broadcast(WsEvent::action_committed(cert, session));
    }

    fn on_ban(&self, cert: &BanCertificate, session: &Session) {
        self.broadcaster.broadcast(WsEvent::player_banned(cert, session));
    }

    fn on_expelled(&self, cert: &BanCertificate) {
        self.broadcaster.broadcast(WsEvent::expelled(cert));
    }
}
