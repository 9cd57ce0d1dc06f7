use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkId};
use crate::embedding::{Embedding, EmbeddingId};
use crate::task::{TaskId, TaskStatus, WorkerId};

/* --------- API del registry --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub filename: String,
}

/// Transición confiada: el registry no valida aristas del grafo, solo que
/// no se salga de un estado terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub status: TaskStatus,
    #[serde(default)]
    pub worker_id: Option<WorkerId>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Claim atómico: compare-and-swap sobre (status esperado, sin dueño).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub worker_id: WorkerId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub worker_id: WorkerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub ok: bool,
}

/* --------- Endpoints de artefactos de los workers --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunksResponse {
    pub task_id: TaskId,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunksClearedResponse {
    pub task_id: TaskId,
    pub cleared: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchParams {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingBatchResponse {
    pub embeddings: Vec<Embedding>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatusResponse {
    pub queue_size: usize,
    pub max_size: usize,
}

/* --------- Búsqueda en el índice vectorial --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query_vector: Vec<f64>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub task_ids: Option<Vec<TaskId>>,
}

pub fn default_top_k() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub embedding_id: EmbeddingId,
    pub chunk_id: ChunkId,
    pub task_id: TaskId,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatsResponse {
    pub total_embeddings: usize,
    pub total_tasks: usize,
    pub tasks: Vec<TaskId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEmbeddingsResponse {
    pub task_id: TaskId,
    pub embedding_ids: Vec<EmbeddingId>,
}

/* --------- Frontera de consultas RAG --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub task_ids: Option<Vec<TaskId>>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub chunk_id: ChunkId,
    pub task_id: TaskId,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub response: String,
    pub sources: Vec<SourceRef>,
}
