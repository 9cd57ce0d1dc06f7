pub mod chunk;
pub mod embed;
pub mod index;

pub use chunk::{ChunkStage, ChunkStore};
pub use embed::{EmbedStage, EmbeddingQueue};
pub use index::IndexStore;
