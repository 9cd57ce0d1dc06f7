use serde::{Deserialize, Serialize};

use crate::task::TaskId;

pub type ChunkId = String;

/// Configuración del splitter de texto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Tamaño de cada chunk en caracteres.
    pub chunk_size: usize,
    /// Fracción de solapamiento entre chunks consecutivos (0.0 a 0.5).
    pub overlap_percentage: f64,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap_percentage: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub task_id: TaskId,
    pub content: String,
    /// Posición del chunk dentro del documento, para reconstruir el orden.
    pub chunk_index: u32,
    pub start_char: usize,
    pub end_char: usize,
}
