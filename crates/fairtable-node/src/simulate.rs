//! Whole table in one process over the in-memory transport

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use fairtable_consensus::{
    ChopEvaluator, ConsensusConfig, Engine, LocalNetwork, LocalTransport, Node, Roster,
};
use fairtable_core::{KeyPair, PlayerId};
use fairtable_rpc::{EventBroadcaster, RpcEventSink};
use fairtable_state::{Seat, Session};
use tracing::info;

use crate::autopilot::{run_table, Autopilot, TableSummary};

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub players: usize,
    pub rounds: u64,
    pub stack: u64,
    pub opening_bet: u64,
    pub round_timeout: Duration,
}

/// Final state of one simulated seat
#[derive(Debug)]
pub struct SeatReport {
    pub player: PlayerId,
    pub summary: TableSummary,
    pub session: Session,
    pub digest: String,
}

fn build_table(config: &SimulationConfig) -> Result<Vec<Arc<Node<LocalTransport>>>> {
    if config.players < 2 {
        return Err(anyhow!("A table needs at least two players"));
    }
    let keys: Vec<KeyPair> = (0..config.players)
        .map(|i| KeyPair::from_seed(&[i as u8 + 1; 32]))
        .collect();
    let ids: Vec<PlayerId> = (0..config.players)
        .map(|i| PlayerId::new(format!("player-{}", i)))
        .collect();

    let roster = Roster::new(ids.iter().cloned().zip(keys.iter().map(|k| k.public)).collect())?;
    let seats = ids.iter().map(|id| Seat::new(id.clone(), config.stack)).collect();
    let session = Session::new("hand-1", seats, config.players - 1)?;
    let network = LocalNetwork::new(ids.clone());
    let broadcaster = Arc::new(EventBroadcaster::default());

    let mut nodes = Vec::with_capacity(ids.len());
    for (id, kp) in ids.iter().zip(keys) {
        let engine = Engine::new(id.clone(), kp, roster.clone(), session.clone())?;
        let transport = Arc::new(network.transport(id)?);
        let mut node = Node::new(
            engine,
            transport,
            ConsensusConfig::with_round_timeout(config.round_timeout),
        );
        node.set_evaluator(Arc::new(ChopEvaluator));
        node.set_event_sink(Arc::new(RpcEventSink::new(Arc::clone(&broadcaster))));
        nodes.push(Arc::new(node));
    }
    Ok(nodes)
}

/// Run every seat's autopilot concurrently and collect the final sessions
pub async fn simulate(config: SimulationConfig) -> Result<Vec<SeatReport>> {
    let nodes = build_table(&config)?;
    info!(
        "Simulating {} players for {} rounds ({} chips each)",
        config.players, config.rounds, config.stack
    );

    let policy = Autopilot::new(config.opening_bet);
    let mut handles = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let node = Arc::clone(node);
        let rounds = config.rounds;
        handles.push(tokio::spawn(async move {
            run_table(node.as_ref(), policy, rounds, None).await
        }));
    }

    let mut reports = Vec::with_capacity(nodes.len());
    for (node, handle) in nodes.iter().zip(handles) {
        let summary = handle.await??;
        let session = node.session().await;
        let digest = session.digest()?.to_hex();
        reports.push(SeatReport {
            player: node.local_id().await,
            summary,
            session,
            digest,
        });
    }
    Ok(reports)
}

/// Human-readable table of the final state
pub fn print_reports(reports: &[SeatReport]) {
    println!("Simulation finished:");
    for report in reports {
        let stacks: Vec<String> = report
            .session
            .players()
            .iter()
            .map(|p| format!("{}={}", p.id, p.stack))
            .collect();
        println!(
            "  {:<10} rounds={:<4} hands={:<3} expelled={:<5} digest={} stacks=[{}]",
            report.player.to_string(),
            report.summary.rounds,
            report.summary.hands,
            report.summary.expelled,
            &report.digest[..16],
            stacks.join(", ")
        );
    }

    let agreed = reports
        .windows(2)
        .all(|pair| pair[0].digest == pair[1].digest);
    println!("All seats agree: {}", agreed);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(players: usize, rounds: u64) -> SimulationConfig {
        SimulationConfig {
            players,
            rounds,
            stack: 100,
            opening_bet: 10,
            round_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_seats_agree() {
        let reports = simulate(config(4, 20)).await.unwrap();
        assert_eq!(reports.len(), 4);

        let first = &reports[0];
        assert!(first.summary.hands > 1);
        for report in &reports {
            assert_eq!(report.digest, first.digest);
            assert_eq!(report.summary, first.summary);
            let chips: u64 = report.session.players().iter().map(|p| p.stack).sum::<u64>()
                + report.session.total_pot();
            assert_eq!(chips, 400);
        }
    }

    #[tokio::test]
    async fn test_single_player_rejected() {
        assert!(simulate(config(1, 5)).await.is_err());
    }
}
