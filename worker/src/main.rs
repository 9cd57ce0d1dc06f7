mod harness;
mod http;
mod registry_client;
mod stages;

use anyhow::{bail, Result};
use common::{ChunkConfig, EMBEDDING_QUEUE_CAPACITY};
use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::registry_client::RegistryClient;
use crate::stages::{ChunkStage, ChunkStore, EmbedStage, EmbeddingQueue, IndexStore};

/// Lista de upstreams separada por comas, estilo
/// CHUNK_SERVICE_URLS=http://chunk-1:8004,http://chunk-2:8004
fn upstreams_from_env(var: &str, default: &str) -> Vec<String> {
    env::var(var)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| "worker=debug,reqwest=info".to_string()),
        )
        .init();

    let stage = env::var("STAGE").unwrap_or_else(|_| "chunk".to_string());
    let registry_url =
        env::var("REGISTRY_URL").unwrap_or_else(|_| "http://localhost:8001".to_string());
    let addr = env::var("WORKER_ADDR").unwrap_or_else(|_| "0.0.0.0:8004".to_string());

    let hostname = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let worker_id = format!(
        "{}-{}",
        hostname,
        &uuid::Uuid::new_v4().to_string()[..8]
    );

    let registry = RegistryClient::new(registry_url.clone());

    let app = match stage.as_str() {
        "chunk" => {
            let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "/data/uploads".to_string());
            let config = ChunkConfig {
                chunk_size: env::var("CHUNK_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
                overlap_percentage: env::var("CHUNK_OVERLAP")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0.1),
            };

            let store = ChunkStore::new();
            let adapter = Arc::new(ChunkStage::new(store.clone(), data_dir, config));
            harness::run_stage(worker_id.clone(), registry, adapter);
            http::chunk_router(store)
        }
        "embed" => {
            let upstreams = upstreams_from_env(
                "CHUNK_SERVICE_URLS",
                "http://chunk-1:8004,http://chunk-2:8004",
            );

            let queue = EmbeddingQueue::new(EMBEDDING_QUEUE_CAPACITY);
            let adapter = Arc::new(EmbedStage::new(queue.clone(), upstreams));
            harness::run_stage(worker_id.clone(), registry, adapter);
            http::embed_router(queue)
        }
        "index" => {
            let upstreams = upstreams_from_env(
                "EMBED_SERVICE_URLS",
                "http://embed-1:8005,http://embed-2:8005",
            );

            let store = IndexStore::new();
            stages::index::run_consume_loops(registry, store.clone(), upstreams);
            http::index_router(store)
        }
        other => bail!("stage desconocido: {}", other),
    };

    info!(
        "worker {} (stage {}) escuchando en {} contra {}",
        worker_id, stage, addr, registry_url
    );

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn la_lista_de_upstreams_se_parte_por_comas() {
        env::set_var(
            "TEST_UPSTREAMS",
            "http://a:8004, http://b:8004/ ,http://c:8004",
        );
        let urls = upstreams_from_env("TEST_UPSTREAMS", "");
        assert_eq!(urls, vec!["http://a:8004", "http://b:8004", "http://c:8004"]);
    }

    #[test]
    fn sin_variable_se_usa_el_default() {
        let urls = upstreams_from_env("NO_EXISTE_ESTA_VAR", "http://x:1");
        assert_eq!(urls, vec!["http://x:1"]);
    }
}
