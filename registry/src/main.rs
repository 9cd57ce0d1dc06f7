mod handlers;
mod monitor;
mod state;

use crate::state::AppState;
use std::env;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| "registry=debug,axum=info".to_string()),
        )
        .init();

    let state = AppState::new();

    // router HTTP
    let app = handlers::build_router(state.clone());

    // reconciliación de leases vencidos en segundo plano
    let monitor_state = state.clone();
    tokio::spawn(async move {
        monitor::run_reconcile_loop(monitor_state).await;
    });

    let addr = env::var("REGISTRY_ADDR").unwrap_or_else(|_| "0.0.0.0:8001".to_string());
    let listener = TcpListener::bind(&addr).await.unwrap();
    info!("registry escuchando en {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
