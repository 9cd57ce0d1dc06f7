use crate::chunk::{Chunk, ChunkConfig};
use crate::task::TaskId;

/// Parte un documento en chunks de tamaño fijo con solapamiento.
/// Los offsets son en caracteres, no en bytes, para no cortar UTF-8.
pub fn split_text(task_id: &TaskId, text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    let chunk_size = config.chunk_size.max(1);
    // El overlap tiene que ser menor al chunk para que el loop avance.
    let overlap = ((chunk_size as f64 * config.overlap_percentage) as usize).min(chunk_size - 1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_index = 0u32;

    while start < total {
        let end = (start + chunk_size).min(total);
        let content: String = chars[start..end].iter().collect();

        chunks.push(Chunk {
            id: format!("{}_chunk_{}", task_id, chunk_index),
            task_id: task_id.clone(),
            content,
            chunk_index,
            start_char: start,
            end_char: end,
        });

        // El último chunk no retrocede, para que el loop termine.
        start = if end < total { end - overlap } else { end };
        chunk_index += 1;
    }

    chunks
}
