use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use common::protocol::{EmbeddingBatchResponse, IndexStatsResponse, SearchHit};
use common::vector::VectorStore;
use common::{EmbeddingId, TaskId, TaskStatus, EMBEDDING_BATCH_SIZE};
use reqwest::Client;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::registry_client::RegistryClient;

/// Intervalo del consumidor de lotes (no es un loop de claim).
const CONSUME_INTERVAL_SECS: u64 = 2;

/// Índice vectorial de esta réplica, compartido entre los consumidores
/// y el endpoint de búsqueda.
#[derive(Clone, Default)]
pub struct IndexStore {
    inner: Arc<Mutex<VectorStore>>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, embedding: common::Embedding) {
        self.inner.lock().unwrap().insert(embedding);
    }

    pub fn search(
        &self,
        query_vector: &[f64],
        top_k: usize,
        task_ids: Option<&[TaskId]>,
    ) -> Vec<SearchHit> {
        self.inner.lock().unwrap().search(query_vector, top_k, task_ids)
    }

    pub fn embedding_ids_for_task(&self, task_id: &TaskId) -> Vec<EmbeddingId> {
        self.inner.lock().unwrap().embedding_ids_for_task(task_id)
    }

    pub fn stats(&self) -> IndexStatsResponse {
        self.inner.lock().unwrap().stats()
    }
}

/// El stage de indexado no reclama tareas: consume lotes de cada upstream
/// de embedding y marca indexed cada tarea que tocó (re-marcar es no-op).
pub fn run_consume_loops(registry: RegistryClient, store: IndexStore, upstreams: Vec<String>) {
    for upstream in upstreams {
        tokio::spawn(consume_loop(registry.clone(), store.clone(), upstream));
    }
}

async fn consume_loop(registry: RegistryClient, store: IndexStore, upstream: String) {
    let http = Client::new();
    info!("consumidor de embeddings arrancado contra {}", upstream);

    loop {
        sleep(Duration::from_secs(CONSUME_INTERVAL_SECS)).await;

        let url = format!(
            "{}/embeddings/batch?batch_size={}",
            upstream, EMBEDDING_BATCH_SIZE
        );
        let batch: EmbeddingBatchResponse = match http.get(&url).send().await {
            Ok(resp) => match resp.json().await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("lote inválido de {}: {:?}", upstream, e);
                    continue;
                }
            },
            Err(e) => {
                // upstream caído: se loguea y se sigue en el próximo ciclo
                warn!("no se pudo consultar {}: {:?}", upstream, e);
                continue;
            }
        };

        if batch.embeddings.is_empty() {
            continue;
        }
        info!(
            "{} embeddings recibidos de {}",
            batch.embeddings.len(),
            upstream
        );

        let mut touched: HashSet<TaskId> = HashSet::new();
        for embedding in batch.embeddings {
            touched.insert(embedding.task_id.clone());
            store.insert(embedding);
        }

        for task_id in touched {
            if let Err(e) = registry
                .transition(&task_id, TaskStatus::Indexed, None)
                .await
            {
                warn!("no se pudo marcar indexed la tarea {}: {:?}", task_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Embedding;

    fn emb(id: &str, task: &str, vector: Vec<f64>) -> Embedding {
        Embedding {
            id: id.to_string(),
            chunk_id: format!("{}_chunk", id),
            task_id: task.to_string(),
            vector,
            model_name: "mock-embedding-model".to_string(),
            dimension: 2,
        }
    }

    #[test]
    fn el_store_indexa_y_busca() {
        let store = IndexStore::new();
        store.insert(emb("e1", "t1", vec![1.0, 0.0]));
        store.insert(emb("e2", "t1", vec![0.0, 1.0]));

        let hits = store.search(&[1.0, 0.0], 1, None);
        assert_eq!(hits[0].embedding_id, "e1");

        assert_eq!(store.embedding_ids_for_task(&"t1".to_string()).len(), 2);
        assert_eq!(store.stats().total_embeddings, 2);
    }
}
