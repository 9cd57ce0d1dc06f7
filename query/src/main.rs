mod handlers;

use common::llm::{MockChatLlm, MockEmbeddingLlm};
use reqwest::Client;
use std::env;
use tokio::net::TcpListener;
use tracing::info;

use crate::handlers::AppState;

fn urls_from_env(var: &str, default: &str) -> Vec<String> {
    env::var(var)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| "query=debug,axum=info".to_string()),
        )
        .init();

    let state = AppState {
        http: Client::new(),
        embedding_llm: MockEmbeddingLlm::default(),
        chat_llm: MockChatLlm,
        vector_db_urls: urls_from_env("VECTOR_DB_URLS", "http://index-1:8006"),
        chunk_service_urls: urls_from_env(
            "CHUNK_SERVICE_URLS",
            "http://chunk-1:8004,http://chunk-2:8004",
        ),
    };

    info!(
        "query service con índices {:?} y chunkers {:?}",
        state.vector_db_urls, state.chunk_service_urls
    );

    let app = handlers::build_router(state);

    let addr = env::var("QUERY_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = TcpListener::bind(&addr).await.unwrap();
    info!("query escuchando en {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
