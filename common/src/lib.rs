pub mod chunk;
pub mod chunker;
pub mod embedding;
pub mod llm;
pub mod protocol;
pub mod task;
pub mod vector;

pub use chunk::{Chunk, ChunkConfig, ChunkId};
pub use embedding::{Embedding, EmbeddingId};
pub use task::{Task, TaskId, TaskStatus, WorkerId};

/* --------- Constantes del protocolo de coordinación --------- */

/// Segundos sin heartbeat antes de dar por muerto al worker que tiene el lease.
pub const LEASE_TIMEOUT_SECS: i64 = 30;
/// Intervalo del barrido de reconciliación en el registry.
pub const RECONCILE_INTERVAL_SECS: u64 = 10;
/// Intervalo de polling de los loops de claim de cada stage.
pub const POLL_INTERVAL_SECS: u64 = 5;
/// Intervalo del loop de heartbeats de cada worker.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 10;
/// Reintentos máximos de una tarea antes de marcarla como failed.
pub const MAX_TASK_RETRIES: u32 = 3;
/// Capacidad de la cola de embeddings de cada worker de embedding.
pub const EMBEDDING_QUEUE_CAPACITY: usize = 1000;
/// Tamaño de lote que el indexador pide a cada upstream de embedding.
pub const EMBEDDING_BATCH_SIZE: usize = 50;
