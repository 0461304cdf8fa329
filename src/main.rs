use crate::config::Config;
use crate::session::SessionManager;
use crate::store::SledStore;
use crate::ws::{accept_connection, WsGateway};
use anyhow::Context;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::TcpListener;

mod api;
mod client;
mod config;
mod error;
mod event;
mod game;
mod gateway;
mod session;
mod store;
mod ws;

// FIXME: Implement TLS support

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::try_init().ok();

    run().await.map_err(|err| {
        log::error!("{:#}", err);
        err
    })
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    let db = sled::open(&config.db_path)
        .with_context(|| format!("Could not open database at {}", config.db_path))?;
    let store = Arc::new(SledStore::new(db)?);
    let gateway = Arc::new(WsGateway::new(config.command_prefixes.clone()));
    let manager = Arc::new(SessionManager::new(store, gateway.clone(), config.clone()));
    log::info!("{} unfinished games on record", manager.num_games());

    if let Some(port) = config.api_port {
        let listener = api::listen(port).await.context("Could not bind stats port")?;
        let router = api::make_router(manager.clone(), gateway.clone());
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                log::error!("Stats endpoint failed: {}", err);
            }
        });
    }

    let addr = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not bind to address: {:?}", addr))?;
    log::info!("Listening on: {:?}", addr);

    while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(accept_connection(stream, manager.clone(), gateway.clone()));
    }
    Ok(())
}
