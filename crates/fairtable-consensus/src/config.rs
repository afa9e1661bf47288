use std::time::Duration;

/// Configuration for the consensus node
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Upper bound on every broadcast and all-to-all call
    pub round_timeout: Duration,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        ConsensusConfig {
            round_timeout: Duration::from_secs(30),
        }
    }
}

impl ConsensusConfig {
    pub fn with_round_timeout(round_timeout: Duration) -> Self {
        ConsensusConfig { round_timeout }
    }
}
