use std::future::Future;
use std::sync::Arc;

use fairtable_core::serialize::{from_wire, to_wire};
use fairtable_core::{
    Action, ActionKind, BanCertificate, CommitCertificate, PlayerId, ProposalId, ProposalMsg,
};
use fairtable_state::{Session, StateError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::collaborators::{CardDealer, HandEvaluator};
use crate::config::ConsensusConfig;
use crate::engine::Engine;
use crate::error::ConsensusError;
use crate::events::NodeEventSink;
use crate::outcome::RoundOutcome;
use crate::roster::Roster;
use crate::transport::Transport;

const HOLE_CARDS: usize = 2;
const BOARD_CARDS: usize = 5;

/// Point-in-time summary of a node, served by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub player_id: PlayerId,
    pub round_id: String,
    pub members: Vec<PlayerId>,
    pub quorum: usize,
    pub commit_count: u64,
    pub next_to_act: Option<PlayerId>,
    pub total_pot: u64,
    pub hand_over: bool,
    pub expelled: bool,
    pub digest: String,
}

/// A table member: the consensus engine wired to a transport.
///
/// Every round runs under the engine lock, from proposal to decision, so
/// rounds never interleave on one node.
pub struct Node<T: Transport> {
    engine: Mutex<Engine>,
    transport: Arc<T>,
    config: ConsensusConfig,
    evaluator: Option<Arc<dyn HandEvaluator>>,
    event_sink: Option<Arc<dyn NodeEventSink>>,
}

impl<T: Transport> Node<T> {
    pub fn new(engine: Engine, transport: Arc<T>, config: ConsensusConfig) -> Self {
        Node {
            engine: Mutex::new(engine),
            transport,
            config,
            evaluator: None,
            event_sink: None,
        }
    }

    pub fn set_evaluator(&mut self, evaluator: Arc<dyn HandEvaluator>) {
        self.evaluator = Some(evaluator);
    }

    pub fn set_event_sink(&mut self, sink: Arc<dyn NodeEventSink>) {
        self.event_sink = Some(sink);
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Run a transport or dealer call under the round timeout
    async fn timed<F, R, E>(&self, fut: F) -> Result<R, ConsensusError>
    where
        F: Future<Output = Result<R, E>>,
        ConsensusError: From<E>,
    {
        match tokio::time::timeout(self.config.round_timeout, fut).await {
            Ok(result) => result.map_err(ConsensusError::from),
            Err(_) => {
                warn!("Round timed out after {:?}", self.config.round_timeout);
                Err(ConsensusError::RoundTimeout(self.config.round_timeout))
            }
        }
    }

    /// Propose a pre-signed action from the local player and run its round
    pub async fn propose(&self, action: Action) -> Result<RoundOutcome, ConsensusError> {
        let mut engine = self.engine.lock().await;
        let proposal = engine.prepare_proposal(action)?;
        let me = engine.local_id().clone();

        let payload = to_wire(&proposal)?;
        self.timed(self.transport.broadcast(Some(payload), &me)).await?;
        info!("Broadcast proposal {}", proposal.proposal_id.short());

        self.run_vote_round(&mut engine, proposal, &me).await
    }

    /// Sign `kind`/`amount` as the local player and propose it
    pub async fn act(&self, kind: ActionKind, amount: u64) -> Result<RoundOutcome, ConsensusError> {
        let action = self.engine.lock().await.sign_action(kind, amount)?;
        self.propose(action).await
    }

    /// Wait for the current-turn player's proposal, vote on it and tally
    pub async fn wait_for_proposal(&self) -> Result<RoundOutcome, ConsensusError> {
        let mut engine = self.engine.lock().await;
        if engine.is_expelled() {
            return Err(ConsensusError::Expelled);
        }
        let root = engine
            .next_to_act()
            .ok_or(ConsensusError::State(StateError::EmptyTable))?;
        if &root == engine.local_id() {
            return Err(ConsensusError::OwnTurn);
        }

        let payload = self.timed(self.transport.broadcast(None, &root)).await?;
        let proposal = match from_wire::<ProposalMsg>(&payload) {
            Ok(proposal) => proposal,
            Err(e) => {
                // Every member received the same bytes, so every member votes
                // on the same nil proposal.
                warn!("Undecodable proposal from {}: {}", root, e);
                ProposalMsg {
                    proposal_id: ProposalId::from_content(&payload),
                    action: None,
                    signature: None,
                }
            }
        };

        self.run_vote_round(&mut engine, proposal, &root).await
    }

    async fn run_vote_round(
        &self,
        engine: &mut Engine,
        proposal: ProposalMsg,
        root: &PlayerId,
    ) -> Result<RoundOutcome, ConsensusError> {
        let vote = engine.receive_proposal(proposal, root)?;
        let payload = to_wire(&vote)?;
        let batch = self.timed(self.transport.all_to_all(payload)).await?;

        let outcome = engine.receive_votes(batch)?;
        self.after_decision(engine, &outcome).await?;
        Ok(outcome)
    }

    /// Side effects of a decision beyond the engine: settlement, transport
    /// membership and event delivery.
    async fn after_decision(
        &self,
        engine: &mut Engine,
        outcome: &RoundOutcome,
    ) -> Result<(), ConsensusError> {
        match outcome {
            RoundOutcome::Committed(cert) => {
                let showdown = cert
                    .proposal
                    .action
                    .as_ref()
                    .is_some_and(|a| a.kind == ActionKind::Showdown);
                if showdown {
                    if let Some(evaluator) = &self.evaluator {
                        // The commit stands; an unsettled hand keeps its pot
                        if let Err(e) = engine.settle_hand(evaluator.as_ref()) {
                            error!(
                                "Settlement after {} failed: {}",
                                cert.proposal_id().short(),
                                e
                            );
                        }
                    }
                }
                if let Some(sink) = &self.event_sink {
                    sink.on_commit(cert, engine.session());
                }
            }
            RoundOutcome::Banned(cert) => {
                if let Err(e) = self.transport.remove_member(&cert.accused).await {
                    warn!("Transport could not drop {}: {}", cert.accused, e);
                }
                if let Some(sink) = &self.event_sink {
                    sink.on_ban(cert, engine.session());
                }
            }
            RoundOutcome::Expelled(cert) => {
                self.transport.shutdown().await;
                if let Some(sink) = &self.event_sink {
                    sink.on_expelled(cert);
                }
            }
            RoundOutcome::Rejected {
                proposal_id,
                reasons,
            } => {
                warn!(
                    "Proposal {} rejected without a ban: {}",
                    proposal_id.short(),
                    reasons
                );
            }
            RoundOutcome::NoQuorum {
                proposal_id,
                accepts,
                rejects,
                quorum,
            } => {
                warn!(
                    "Round for {} ended without quorum ({} accept, {} reject, need {})",
                    proposal_id.short(),
                    accepts,
                    rejects,
                    quorum
                );
            }
        }
        Ok(())
    }

    /// Apply a commit certificate that arrived outside a local round
    pub async fn apply_commit_certificate(
        &self,
        cert: &CommitCertificate,
    ) -> Result<RoundOutcome, ConsensusError> {
        let mut engine = self.engine.lock().await;
        engine.apply_commit(cert)?;
        let outcome = RoundOutcome::Committed(cert.clone());
        self.after_decision(&mut engine, &outcome).await?;
        Ok(outcome)
    }

    /// Apply a ban certificate that arrived outside a local round
    pub async fn apply_ban_certificate(
        &self,
        cert: &BanCertificate,
    ) -> Result<RoundOutcome, ConsensusError> {
        let mut engine = self.engine.lock().await;
        let outcome = engine.apply_ban(cert)?;
        self.after_decision(&mut engine, &outcome).await?;
        Ok(outcome)
    }

    /// Deal two hole cards to every seated player, then the board
    pub async fn deal_hand(&self, dealer: &dyn CardDealer) -> Result<(), ConsensusError> {
        let mut engine = self.engine.lock().await;
        let session = engine.session();
        let seated: Vec<PlayerId> = session
            .players()
            .iter()
            .filter(|p| !p.folded)
            .map(|p| p.id.clone())
            .collect();
        let button = session
            .players()
            .get(session.dealer())
            .map(|p| p.id.clone())
            .ok_or(ConsensusError::State(StateError::EmptyTable))?;

        for _ in 0..HOLE_CARDS {
            for player in &seated {
                let card_id = self.timed(dealer.draw_card(player)).await?;
                let card = self.timed(dealer.open_card(player, card_id)).await?;
                engine.deal_hole_card(player, card)?;
            }
        }
        for _ in 0..BOARD_CARDS {
            let card_id = self.timed(dealer.draw_card(&button)).await?;
            let card = self.timed(dealer.open_card(&button, card_id)).await?;
            engine.deal_board_card(card)?;
        }
        info!("Dealt {} for {} players", engine.session().round_id(), seated.len());
        Ok(())
    }

    /// Open the next hand after settlement
    pub async fn start_hand(&self, round_id: impl Into<String>) -> Result<(), ConsensusError> {
        self.engine.lock().await.start_hand(round_id)
    }

    /// Settle a finished hand with an explicit evaluator
    pub async fn settle_hand(&self, evaluator: &dyn HandEvaluator) -> Result<(), ConsensusError> {
        self.engine.lock().await.settle_hand(evaluator)?;
        Ok(())
    }

    pub async fn session(&self) -> Session {
        self.engine.lock().await.session().clone()
    }

    pub async fn is_my_turn(&self) -> bool {
        self.engine.lock().await.is_my_turn()
    }

    pub async fn is_expelled(&self) -> bool {
        self.engine.lock().await.is_expelled()
    }

    pub async fn local_id(&self) -> PlayerId {
        self.engine.lock().await.local_id().clone()
    }

    pub async fn roster(&self) -> Roster {
        self.engine.lock().await.roster().clone()
    }

    pub async fn status(&self) -> NodeStatus {
        let engine = self.engine.lock().await;
        let session = engine.session();
        let digest = match session.digest() {
            Ok(d) => d.to_hex(),
            Err(e) => {
                error!("Failed to digest session: {}", e);
                String::new()
            }
        };
        NodeStatus {
            player_id: engine.local_id().clone(),
            round_id: session.round_id().to_string(),
            members: engine.roster().ids(),
            quorum: engine.quorum(),
            commit_count: session.commit_count(),
            next_to_act: engine.next_to_act(),
            total_pot: session.total_pot(),
            hand_over: session.is_hand_over(),
            expelled: engine.is_expelled(),
            digest,
        }
    }
}
