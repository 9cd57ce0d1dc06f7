use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use common::chunker::split_text;
use common::{Chunk, ChunkConfig, Task, TaskId, TaskStatus};
use tracing::info;

use crate::harness::StageAdapter;

/// Buffer en memoria de los chunks producidos por esta réplica. Los
/// artefactos de una tarea viven solo en la réplica que los produjo.
#[derive(Clone, Default)]
pub struct ChunkStore {
    inner: Arc<Mutex<HashMap<TaskId, Vec<Chunk>>>>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task_id: TaskId, chunks: Vec<Chunk>) {
        self.inner.lock().unwrap().insert(task_id, chunks);
    }

    pub fn get(&self, task_id: &TaskId) -> Option<Vec<Chunk>> {
        self.inner.lock().unwrap().get(task_id).cloned()
    }

    pub fn clear(&self, task_id: &TaskId) -> bool {
        self.inner.lock().unwrap().remove(task_id).is_some()
    }
}

/// Stage de chunking: lee el documento del storage compartido, lo parte
/// y deja los chunks servidos en esta réplica.
pub struct ChunkStage {
    store: ChunkStore,
    config: ChunkConfig,
    data_dir: String,
}

impl ChunkStage {
    pub fn new(store: ChunkStore, data_dir: String, config: ChunkConfig) -> Self {
        Self {
            store,
            config,
            data_dir,
        }
    }
}

#[async_trait]
impl StageAdapter for ChunkStage {
    fn name(&self) -> &'static str {
        "chunk"
    }

    fn input_status(&self) -> TaskStatus {
        TaskStatus::UploadDone
    }

    fn working_status(&self) -> TaskStatus {
        TaskStatus::Chunking
    }

    fn done_status(&self) -> TaskStatus {
        TaskStatus::Chunked
    }

    // El "upstream" del chunker es el directorio de uploads compartido.
    fn upstreams(&self) -> Vec<String> {
        vec![self.data_dir.clone()]
    }

    async fn process(&self, task: &Task, upstream: &str) -> Result<()> {
        let lower = task.filename.to_lowercase();
        if !lower.ends_with(".txt") && !lower.ends_with(".md") {
            bail!("tipo de archivo no soportado: {}", task.filename);
        }

        let path = format!("{}/{}_{}", upstream, task.id, task.filename);
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("no se pudo leer el documento {}", path))?;

        let chunks = split_text(&task.id, &text, &self.config);
        if chunks.is_empty() {
            bail!("el documento {} está vacío", task.filename);
        }

        info!("{} chunks generados para la tarea {}", chunks.len(), task.id);
        self.store.insert(task.id.clone(), chunks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs, path::PathBuf};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("chunk_stage_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    #[test]
    fn el_store_guarda_devuelve_y_limpia() {
        let store = ChunkStore::new();
        let chunks = split_text(&"t1".to_string(), "hola mundo", &ChunkConfig::default());
        store.insert("t1".to_string(), chunks);

        assert!(store.get(&"t1".to_string()).is_some());
        assert!(store.get(&"t2".to_string()).is_none());

        assert!(store.clear(&"t1".to_string()));
        assert!(!store.clear(&"t1".to_string()));
        assert!(store.get(&"t1".to_string()).is_none());
    }

    #[tokio::test]
    async fn procesar_un_txt_deja_los_chunks_en_el_store() {
        let dir = temp_dir("procesa_txt");
        let store = ChunkStore::new();
        let stage = ChunkStage::new(
            store.clone(),
            dir.to_string_lossy().to_string(),
            ChunkConfig {
                chunk_size: 5,
                overlap_percentage: 0.0,
            },
        );

        let task = Task::new("doc.txt".to_string());
        let path = dir.join(format!("{}_doc.txt", task.id));
        fs::write(&path, "un documento de prueba").unwrap();

        stage
            .process(&task, &dir.to_string_lossy())
            .await
            .unwrap();

        let chunks = store.get(&task.id).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].task_id, task.id);
    }

    #[tokio::test]
    async fn una_extension_desconocida_falla() {
        let dir = temp_dir("extension");
        let stage = ChunkStage::new(
            ChunkStore::new(),
            dir.to_string_lossy().to_string(),
            ChunkConfig::default(),
        );

        let task = Task::new("doc.pdf".to_string());
        let err = stage
            .process(&task, &dir.to_string_lossy())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no soportado"));
    }

    #[tokio::test]
    async fn un_archivo_inexistente_falla() {
        let dir = temp_dir("inexistente");
        let stage = ChunkStage::new(
            ChunkStore::new(),
            dir.to_string_lossy().to_string(),
            ChunkConfig::default(),
        );

        let task = Task::new("fantasma.txt".to_string());
        assert!(stage.process(&task, &dir.to_string_lossy()).await.is_err());
    }
}
