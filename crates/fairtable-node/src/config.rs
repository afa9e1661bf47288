use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use fairtable_consensus::{ConsensusConfig, Roster};
use fairtable_core::{KeyPair, PlayerId, PublicKey, SecretKey};
use fairtable_rpc::PeerEndpoint;
use fairtable_state::{Seat, Session};
use serde::{Deserialize, Serialize};

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Local player id, must appear in the roster
    pub player_id: String,

    /// Local secret key (hex)
    pub secret_key: String,

    /// Every seat at the table, in seat order
    pub roster: Vec<RosterEntry>,

    /// Id of the first hand
    pub round_id: String,

    /// Seat index holding the dealer button
    pub dealer: usize,

    /// HTTP bind address for peer traffic, status and events
    pub listen_addr: SocketAddr,

    /// Upper bound on every broadcast and all-to-all, in milliseconds
    pub round_timeout_ms: u64,

    /// Stop after this many consensus rounds
    pub max_rounds: u64,

    /// Chips the first player to act opens with (0 = always check)
    pub opening_bet: u64,

    /// Enable WebSocket
    pub enable_ws: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    /// Public key (hex)
    pub pubkey: String,
    /// Base URL of the member's HTTP server
    pub address: String,
    pub stack: u64,
}

impl NodeConfig {
    /// Load config from file
    pub fn load(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn local_id(&self) -> PlayerId {
        PlayerId::new(self.player_id.clone())
    }

    pub fn keypair(&self) -> Result<KeyPair> {
        let secret = SecretKey::from_hex(&self.secret_key)?;
        Ok(KeyPair::from_secret(secret))
    }

    pub fn to_roster(&self) -> Result<Roster> {
        let members = self
            .roster
            .iter()
            .map(|entry| {
                PublicKey::from_hex(&entry.pubkey)
                    .map(|pk| (PlayerId::new(entry.id.clone()), pk))
                    .map_err(|e| anyhow!("Bad public key for {}: {}", entry.id, e))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Roster::new(members)?)
    }

    pub fn to_session(&self) -> Result<Session> {
        let seats = self
            .roster
            .iter()
            .map(|entry| Seat::new(entry.id.as_str(), entry.stack))
            .collect();
        Ok(Session::new(self.round_id.clone(), seats, self.dealer)?)
    }

    pub fn peers(&self) -> Result<Vec<PeerEndpoint>> {
        self.roster
            .iter()
            .map(|entry| {
                let pubkey = PublicKey::from_hex(&entry.pubkey)
                    .map_err(|e| anyhow!("Bad public key for {}: {}", entry.id, e))?;
                Ok(PeerEndpoint {
                    id: PlayerId::new(entry.id.clone()),
                    address: entry.address.clone(),
                    pubkey,
                })
            })
            .collect()
    }

    pub fn consensus_config(&self) -> ConsensusConfig {
        ConsensusConfig::with_round_timeout(Duration::from_millis(self.round_timeout_ms))
    }
}

/// Sample four-seat table on localhost; the local node takes the first seat
pub fn generate_sample_config() -> NodeConfig {
    let keys: Vec<KeyPair> = (0..4).map(|_| KeyPair::generate()).collect();
    let roster = localhost_roster(&keys, 9000, 1_000);
    seat_config(0, &keys[0], roster, 9000)
}

/// One config per seat for an `n`-player localhost table, with fresh keys.
/// Seat `i` listens on `base_port + i`.
pub fn generate_table_configs(n: usize, base_port: u16, stack: u64) -> Vec<NodeConfig> {
    let keys: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
    let roster = localhost_roster(&keys, base_port, stack);
    keys.iter()
        .enumerate()
        .map(|(i, kp)| seat_config(i, kp, roster.clone(), base_port))
        .collect()
}

fn localhost_roster(keys: &[KeyPair], base_port: u16, stack: u64) -> Vec<RosterEntry> {
    keys.iter()
        .enumerate()
        .map(|(i, kp)| RosterEntry {
            id: format!("player-{}", i),
            pubkey: kp.public.to_hex(),
            address: format!("http://127.0.0.1:{}", base_port + i as u16),
            stack,
        })
        .collect()
}

fn seat_config(seat: usize, keypair: &KeyPair, roster: Vec<RosterEntry>, base_port: u16) -> NodeConfig {
    NodeConfig {
        player_id: format!("player-{}", seat),
        secret_key: keypair.secret.to_hex(),
        dealer: roster.len().saturating_sub(1),
        roster,
        round_id: "hand-1".to_string(),
        listen_addr: SocketAddr::from(([127, 0, 0, 1], base_port + seat as u16)),
        round_timeout_ms: 30_000,
        max_rounds: 100,
        opening_bet: 10,
        enable_ws: true,
    }
}
