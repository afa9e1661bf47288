use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use fairtable_consensus::{
    quorum_for, verify_ban_certificate, verify_commit_certificate, Channel, NodeStatus, Roster,
};
use fairtable_core::{BanCertificate, CommitCertificate};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::RpcError;
use crate::transport::{DeliverRequest, DeliverResponse, Inbound};
use crate::ws::events::EventBroadcaster;

/// Last published view of the local node. The node holds its engine for a
/// whole round, so handlers read this snapshot instead.
#[derive(Default)]
pub struct TableView {
    status: RwLock<Option<NodeStatus>>,
    roster: RwLock<Option<Roster>>,
}

impl TableView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, status: NodeStatus, roster: Roster) {
        *self.status.write().await = Some(status);
        *self.roster.write().await = Some(roster);
    }

    pub async fn status(&self) -> Option<NodeStatus> {
        self.status.read().await.clone()
    }

    pub async fn roster(&self) -> Option<Roster> {
        self.roster.read().await.clone()
    }
}

/// Application state shared with handlers
pub struct AppState {
    pub inbound: Inbound,
    pub view: Arc<TableView>,
    pub broadcaster: Arc<EventBroadcaster>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub proposal_id: String,
    pub quorum: usize,
}

/// GET /status - Last published node status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<NodeStatus>, RpcError> {
    state
        .view
        .status()
        .await
        .map(Json)
        .ok_or_else(|| RpcError::NotFound("Node status not yet published".to_string()))
}

/// POST /consensus/broadcast/{seq} - Payload from a broadcast root
pub async fn deliver_broadcast(
    State(state): State<Arc<AppState>>,
    Path(seq): Path<u64>,
    Json(request): Json<DeliverRequest>,
) -> Result<Json<DeliverResponse>, RpcError> {
    deliver(&state, Channel::Broadcast, seq, request)
}

/// POST /consensus/exchange/{seq} - One member's share of an all-to-all
pub async fn deliver_exchange(
    State(state): State<Arc<AppState>>,
    Path(seq): Path<u64>,
    Json(request): Json<DeliverRequest>,
) -> Result<Json<DeliverResponse>, RpcError> {
    deliver(&state, Channel::Exchange, seq, request)
}

fn deliver(
    state: &AppState,
    channel: Channel,
    seq: u64,
    request: DeliverRequest,
) -> Result<Json<DeliverResponse>, RpcError> {
    if seq == 0 {
        return Err(RpcError::BadRequest("Sequence numbers start at 1".to_string()));
    }
    let from = request.from.clone();
    let size = state.inbound.accept(channel, seq, request)?;
    debug!("Received {:?} #{} from {} ({} bytes)", channel, seq, from, size);

    Ok(Json(DeliverResponse {
        status: "accepted".to_string(),
    }))
}

async fn current_roster(state: &AppState) -> Result<Roster, RpcError> {
    state
        .view
        .roster()
        .await
        .ok_or_else(|| RpcError::NotFound("Roster not yet published".to_string()))
}

/// POST /certificate/commit - Check a commit certificate against the current roster
pub async fn verify_commit(
    State(state): State<Arc<AppState>>,
    Json(cert): Json<CommitCertificate>,
) -> Result<Json<VerifyResponse>, RpcError> {
    let roster = current_roster(&state).await?;
    let quorum = quorum_for(roster.len());
    verify_commit_certificate(&cert, &roster, quorum)?;

    info!("Verified commit certificate {}", cert.proposal_id().short());
    Ok(Json(VerifyResponse {
        valid: true,
        proposal_id: cert.proposal_id().to_string(),
        quorum,
    }))
}

/// POST /certificate/ban - Check a ban certificate against the current roster
pub async fn verify_ban(
    State(state): State<Arc<AppState>>,
    Json(cert): Json<BanCertificate>,
) -> Result<Json<VerifyResponse>, RpcError> {
    let roster = current_roster(&state).await?;
    let quorum = quorum_for(roster.len());
    verify_ban_certificate(&cert, &roster, quorum)?;

    info!("Verified ban certificate against {}", cert.accused);
    Ok(Json(VerifyResponse {
        valid: true,
        proposal_id: cert.proposal_id.to_string(),
        quorum,
    }))
}
