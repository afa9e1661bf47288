//! Fairtable RPC - HTTP transport, status API and event stream
//!
//! This crate carries consensus collectives between peers over HTTP and
//! exposes the node's status, certificate checks and a WebSocket feed of
//! table events.

pub mod error;
pub mod http;
pub mod sink;
pub mod transport;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tracing::info;

use http::{create_router, AppState};
use ws::create_ws_router;

pub use error::RpcError;
pub use http::{TableView, VerifyResponse};
pub use sink::RpcEventSink;
pub use transport::{DeliverRequest, DeliverResponse, HttpTransport, Inbound, PeerEndpoint};
pub use ws::{EventBroadcaster, WsEvent};

/// RPC server configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// HTTP bind address
    pub http_addr: SocketAddr,
    /// Enable WebSocket
    pub enable_ws: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        RpcConfig {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            enable_ws: true,
        }
    }
}

/// RPC server
pub struct RpcServer {
    config: RpcConfig,
    app_state: Arc<AppState>,
}

impl RpcServer {
    pub fn new(
        config: RpcConfig,
        inbound: Inbound,
        view: Arc<TableView>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        let app_state = Arc::new(AppState {
            inbound,
            view,
            broadcaster,
        });

        RpcServer { config, app_state }
    }

    /// Get the event broadcaster
    pub fn broadcaster(&self) -> Arc<EventBroadcaster> {
        Arc::clone(&self.app_state.broadcaster)
    }

    /// Create the combined router
    pub fn router(&self) -> Router {
        let http_router = create_router(Arc::clone(&self.app_state));

        if self.config.enable_ws {
            let ws_router = create_ws_router(Arc::clone(&self.app_state));
            http_router.merge(ws_router)
        } else {
            http_router
        }
    }

    /// Run the RPC server
    pub async fn run(self) -> Result<(), std::io::Error> {
        let router = self.router();
        let addr = self.config.http_addr;

        info!("Starting RPC server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await
    }
}
