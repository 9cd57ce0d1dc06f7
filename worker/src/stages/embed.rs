use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use common::llm::{MockEmbeddingLlm, EMBEDDING_MODEL_NAME};
use common::protocol::ChunksResponse;
use common::{Embedding, Task, TaskStatus, EMBEDDING_QUEUE_CAPACITY};
use reqwest::Client;
use tracing::{info, warn};

use crate::harness::StageAdapter;

/// Cola acotada de embeddings de esta réplica. Sacar de una cola vacía
/// devuelve cero elementos, nunca bloquea.
#[derive(Clone)]
pub struct EmbeddingQueue {
    inner: Arc<Mutex<VecDeque<Embedding>>>,
    capacity: usize,
}

impl EmbeddingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
            capacity,
        }
    }

    /// false si la cola está llena: el embedding se descarta.
    pub fn push(&self, embedding: Embedding) -> bool {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() >= self.capacity {
            return false;
        }
        queue.push_back(embedding);
        true
    }

    pub fn pop_batch(&self, max: usize) -> Vec<Embedding> {
        let mut queue = self.inner.lock().unwrap();
        let take = max.min(queue.len());
        queue.drain(..take).collect()
    }

    pub fn depth(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EmbeddingQueue {
    fn default() -> Self {
        Self::new(EMBEDDING_QUEUE_CAPACITY)
    }
}

/// Stage de embedding: trae los chunks del upstream al que está atado el
/// loop, los vectoriza y encola los embeddings para el indexador.
pub struct EmbedStage {
    queue: EmbeddingQueue,
    llm: MockEmbeddingLlm,
    http: Client,
    chunk_upstreams: Vec<String>,
}

impl EmbedStage {
    pub fn new(queue: EmbeddingQueue, chunk_upstreams: Vec<String>) -> Self {
        Self {
            queue,
            llm: MockEmbeddingLlm::default(),
            http: Client::new(),
            chunk_upstreams,
        }
    }
}

#[async_trait]
impl StageAdapter for EmbedStage {
    fn name(&self) -> &'static str {
        "embed"
    }

    fn input_status(&self) -> TaskStatus {
        TaskStatus::Chunked
    }

    fn working_status(&self) -> TaskStatus {
        TaskStatus::Embedding
    }

    fn done_status(&self) -> TaskStatus {
        TaskStatus::Embedded
    }

    fn upstreams(&self) -> Vec<String> {
        self.chunk_upstreams.clone()
    }

    async fn process(&self, task: &Task, upstream: &str) -> Result<()> {
        let url = format!("{}/chunks/{}", upstream, task.id);
        let resp = self.http.get(&url).send().await?;

        // Los chunks viven solo en la réplica que los produjo: si no están
        // en el upstream de este loop, la tarea falla acá.
        if !resp.status().is_success() {
            bail!(
                "los chunks de la tarea {} no están en {} ({})",
                task.id,
                upstream,
                resp.status()
            );
        }

        let body: ChunksResponse = resp.json().await?;
        info!(
            "{} chunks recibidos de {} para la tarea {}",
            body.chunks.len(),
            upstream,
            task.id
        );

        for chunk in &body.chunks {
            let vector = self.llm.generate_embedding(&chunk.content);
            let embedding = Embedding {
                id: format!("{}_emb", chunk.id),
                chunk_id: chunk.id.clone(),
                task_id: chunk.task_id.clone(),
                dimension: vector.len(),
                vector,
                model_name: EMBEDDING_MODEL_NAME.to_string(),
            };

            if !self.queue.push(embedding) {
                warn!(
                    "cola de embeddings llena, se descarta el del chunk {}",
                    chunk.id
                );
            }
        }

        Ok(())
    }
}
