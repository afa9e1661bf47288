//! `/ws` table feed.
//!
//! A client gets the node's last published status on connect, then every
//! decided round. `?player=<id>` narrows the feed to rounds that player acts
//! in or is banned by. Sending the text `status` asks for a fresh snapshot.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use super::events::WsEvent;
use crate::http::{AppState, TableView};

const STATUS_REQUEST: &str = "status";

/// Query string of `/ws`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedQuery {
    /// Only forward events about this player
    pub player: Option<String>,
}

impl FeedQuery {
    fn admits(&self, event: &WsEvent) -> bool {
        self.player.as_deref().map_or(true, |player| event.involves(player))
    }
}

pub fn create_ws_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(feed_handler))
        .with_state(state)
}

async fn feed_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<FeedQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| stream_table(socket, state, query))
}

fn encode(event: &WsEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            None
        }
    }
}

async fn status_frame(view: &TableView) -> Option<Message> {
    let status = view.status().await?;
    encode(&WsEvent::TableStatus(status))
}

async fn stream_table(socket: WebSocket, state: Arc<AppState>, query: FeedQuery) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.broadcaster.subscribe();
    info!("Table feed opened (player: {:?})", query.player);

    if let Some(frame) = status_frame(&state.view).await {
        if sender.send(frame).await.is_err() {
            return;
        }
    }

    loop {
        let frame = tokio::select! {
            event = events.recv() => match event {
                Ok(event) if query.admits(&event) => encode(&event),
                Ok(_) => None,
                // Missed rounds are covered by a fresh snapshot
                Err(RecvError::Lagged(n)) => {
                    warn!("Table feed lagged {} events", n);
                    status_frame(&state.view).await
                }
                Err(RecvError::Closed) => {
                    debug!("Event channel closed");
                    break;
                }
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) if text.as_str().trim() == STATUS_REQUEST => {
                    status_frame(&state.view).await
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => None,
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    break;
                }
            },
        };

        if let Some(frame) = frame {
            if let Err(e) = sender.send(frame).await {
                warn!("Failed to send table event: {}", e);
                break;
            }
        }
    }

    info!("Table feed closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use fairtable_consensus::{Mailbox, NodeStatus, Roster};
    use fairtable_core::{KeyPair, PlayerId};
    use tower::ServiceExt;

    use crate::transport::Inbound;
    use crate::ws::EventBroadcaster;

    fn committed(player: &str, next: &str) -> WsEvent {
        WsEvent::ActionCommitted {
            proposal_id: "ab".repeat(32),
            player: player.to_string(),
            kind: "bet".to_string(),
            amount: 10,
            votes: 3,
            total_pot: 10,
            next_to_act: Some(next.to_string()),
        }
    }

    fn status() -> NodeStatus {
        NodeStatus {
            player_id: "p1".into(),
            round_id: "hand-3".to_string(),
            members: vec!["p0".into(), "p1".into()],
            quorum: 2,
            commit_count: 7,
            next_to_act: Some("p0".into()),
            total_pot: 40,
            hand_over: false,
            expelled: false,
            digest: String::new(),
        }
    }

    #[test]
    fn test_player_filter() {
        let all = FeedQuery::default();
        let p2 = FeedQuery {
            player: Some("p2".to_string()),
        };

        assert!(all.admits(&committed("p0", "p1")));
        assert!(!p2.admits(&committed("p0", "p1")));
        assert!(p2.admits(&committed("p2", "p0")));
        assert!(p2.admits(&committed("p1", "p2")));

        let ban = |accused: &str| WsEvent::PlayerBanned {
            proposal_id: String::new(),
            accused: accused.to_string(),
            reasons: "insufficient funds".to_string(),
            votes: 2,
            remaining: 2,
        };
        assert!(p2.admits(&ban("p2")));
        assert!(!p2.admits(&ban("p0")));
        assert!(p2.admits(&WsEvent::TableStatus(status())));
    }

    #[tokio::test]
    async fn test_status_frame_follows_published_view() {
        let view = TableView::new();
        assert!(status_frame(&view).await.is_none());

        let roster = Roster::new(vec![(PlayerId::from("p0"), KeyPair::generate().public)]).unwrap();
        view.publish(status(), roster).await;
        let Some(Message::Text(text)) = status_frame(&view).await else {
            panic!("expected a text frame");
        };
        let event: WsEvent = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(event, WsEvent::TableStatus(status()));
        assert!(text.as_str().contains("\"type\":\"TableStatus\""));
    }

    #[tokio::test]
    async fn test_plain_get_is_not_upgraded() {
        let state = Arc::new(AppState {
            inbound: Inbound::new(Arc::new(Mailbox::new()), Vec::new()),
            view: Arc::new(TableView::new()),
            broadcaster: Arc::new(EventBroadcaster::new(100)),
        });
        let router = create_ws_router(state);

        let request = Request::builder().uri("/ws?player=p1").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_ne!(response.status(), StatusCode::OK);
    }
}
