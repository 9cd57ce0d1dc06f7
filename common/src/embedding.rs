use serde::{Deserialize, Serialize};

use crate::chunk::ChunkId;
use crate::task::TaskId;

pub type EmbeddingId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub id: EmbeddingId,
    pub chunk_id: ChunkId,
    pub task_id: TaskId,
    pub vector: Vec<f64>,
    pub model_name: String,
    pub dimension: usize,
}
