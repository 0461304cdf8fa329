use crate::session::SessionManager;
use crate::ws::WsGateway;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct ApiState {
    manager: Arc<SessionManager>,
    gateway: Arc<WsGateway>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Stats {
    active_games: usize,
    connected_users: usize,
}

pub fn make_router(manager: Arc<SessionManager>, gateway: Arc<WsGateway>) -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .with_state(ApiState { manager, gateway })
}

pub async fn listen(port: u16) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    log::info!("Stats available on {}", listener.local_addr()?);
    Ok(listener)
}

async fn get_stats(State(state): State<ApiState>) -> Json<Stats> {
    Json(Stats {
        active_games: state.manager.num_games(),
        connected_users: state.gateway.connected_users(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::{GameStore, MemoryStore};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn counts_games_and_users() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(WsGateway::new(vec!['/']));
        let manager = Arc::new(SessionManager::new(store.clone(), gateway.clone(), Config::default()));
        store.create_game(1, vec!["Ann".into()]).unwrap();
        store.create_game(2, vec!["Bob".into()]).unwrap();
        let (outbox, _frames) = mpsc::unbounded_channel();
        gateway.connect(1, outbox);

        let state = ApiState { manager, gateway };
        let Json(stats) = get_stats(State(state)).await;
        assert_eq!(
            stats,
            Stats {
                active_games: 2,
                connected_users: 1
            }
        );
    }
}
