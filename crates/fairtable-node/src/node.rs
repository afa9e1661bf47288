use std::sync::Arc;

use anyhow::Result;
use fairtable_consensus::{ChopEvaluator, Engine, Node};
use fairtable_rpc::{
    EventBroadcaster, HttpTransport, RpcConfig, RpcEventSink, RpcServer, TableView,
};
use tracing::{error, info};

use crate::autopilot::{run_table, Autopilot};
use crate::config::NodeConfig;

/// A networked table member: consensus node, HTTP server and autopilot
pub struct TableNode {
    config: NodeConfig,
    node: Node<HttpTransport>,
    server: RpcServer,
    view: Arc<TableView>,
}

impl TableNode {
    /// Create a new node from configuration
    pub fn new(config: NodeConfig) -> Result<Self> {
        let me = config.local_id();
        let keypair = config.keypair()?;
        let roster = config.to_roster()?;
        let session = config.to_session()?;

        let transport = Arc::new(HttpTransport::new(
            me.clone(),
            keypair.secret.clone(),
            config.peers()?,
        )?);
        let broadcaster = Arc::new(EventBroadcaster::default());
        let view = Arc::new(TableView::new());

        let server = RpcServer::new(
            RpcConfig {
                http_addr: config.listen_addr,
                enable_ws: config.enable_ws,
            },
            transport.inbound(),
            Arc::clone(&view),
            Arc::clone(&broadcaster),
        );

        let engine = Engine::new(me, keypair, roster, session)?;
        let mut node = Node::new(engine, transport, config.consensus_config());
        node.set_evaluator(Arc::new(ChopEvaluator));
        node.set_event_sink(Arc::new(RpcEventSink::new(broadcaster)));

        Ok(TableNode {
            config,
            node,
            server,
            view,
        })
    }

    /// Serve peers and play until the round budget runs out
    pub async fn run(self) -> Result<()> {
        let TableNode {
            config,
            node,
            server,
            view,
        } = self;

        info!(
            "Starting {} at a {}-seat table",
            config.player_id,
            config.roster.len()
        );
        let server_handle = tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("RPC server error: {}", e);
            }
        });

        let policy = Autopilot::new(config.opening_bet);
        let summary = run_table(&node, policy, config.max_rounds, Some(view.as_ref())).await;
        match &summary {
            Ok(summary) => info!(
                "Played {} rounds over {} hands (expelled: {})",
                summary.rounds, summary.hands, summary.expelled
            ),
            Err(e) => error!("Table loop stopped: {}", e),
        }

        let status = node.status().await;
        info!("Final digest {}", status.digest);
        println!("{}", serde_json::to_string_pretty(&status)?);

        // Keep answering status requests until interrupted
        info!("Serving status on {} (Ctrl-C to exit)", config.listen_addr);
        tokio::select! {
            _ = server_handle => {}
            _ = tokio::signal::ctrl_c() => {}
        }

        summary?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generate_sample_config;

    #[tokio::test]
    async fn test_node_creation() {
        let config = generate_sample_config();
        let node = TableNode::new(config).unwrap();
        assert_eq!(node.node.status().await.members.len(), 4);
    }

    #[test]
    fn test_foreign_player_rejected() {
        let mut config = generate_sample_config();
        config.player_id = "stranger".to_string();
        assert!(TableNode::new(config).is_err());
    }
}
