use std::cmp::Ordering;
use std::collections::HashMap;

use crate::embedding::{Embedding, EmbeddingId};
use crate::protocol::{IndexStatsResponse, SearchHit};
use crate::task::TaskId;

/// Epsilon en el denominador del coseno para no dividir por cero
/// cuando algún vector almacenado es todo ceros.
const COSINE_EPSILON: f64 = 1e-10;

/// Similitud coseno: (a·b) / (|a|·|b| + eps).
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    dot / (norm_a * norm_b + COSINE_EPSILON)
}

/// Índice vectorial en memoria de una réplica del stage de indexado.
#[derive(Debug, Default)]
pub struct VectorStore {
    vectors: HashMap<EmbeddingId, Vec<f64>>,
    meta: HashMap<EmbeddingId, (TaskId, String)>,
    by_task: HashMap<TaskId, Vec<EmbeddingId>>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, embedding: Embedding) {
        self.by_task
            .entry(embedding.task_id.clone())
            .or_default()
            .push(embedding.id.clone());
        self.meta.insert(
            embedding.id.clone(),
            (embedding.task_id, embedding.chunk_id),
        );
        self.vectors.insert(embedding.id, embedding.vector);
    }

    /// Top-k por coseno, opcionalmente restringido a un conjunto de tareas.
    pub fn search(
        &self,
        query_vector: &[f64],
        top_k: usize,
        task_ids: Option<&[TaskId]>,
    ) -> Vec<SearchHit> {
        let candidate_ids: Vec<&EmbeddingId> = match task_ids {
            Some(tasks) => tasks
                .iter()
                .flat_map(|t| self.by_task.get(t).into_iter().flatten())
                .collect(),
            None => self.vectors.keys().collect(),
        };

        let mut hits: Vec<SearchHit> = candidate_ids
            .into_iter()
            .filter_map(|id| {
                let vector = self.vectors.get(id)?;
                let (task_id, chunk_id) = self.meta.get(id)?;
                Some(SearchHit {
                    embedding_id: id.clone(),
                    chunk_id: chunk_id.clone(),
                    task_id: task_id.clone(),
                    score: cosine_similarity(vector, query_vector),
                })
            })
            .collect();

        sort_by_score_desc(&mut hits);
        hits.truncate(top_k);
        hits
    }

    pub fn embedding_ids_for_task(&self, task_id: &TaskId) -> Vec<EmbeddingId> {
        self.by_task.get(task_id).cloned().unwrap_or_default()
    }

    pub fn stats(&self) -> IndexStatsResponse {
        IndexStatsResponse {
            total_embeddings: self.vectors.len(),
            total_tasks: self.by_task.len(),
            tasks: self.by_task.keys().cloned().collect(),
        }
    }
}

/// Fusión de resultados de varias réplicas: concatenar, ordenar por score
/// descendente y quedarse con los k mejores globales.
pub fn merge_top_k(mut hits: Vec<SearchHit>, top_k: usize) -> Vec<SearchHit> {
    sort_by_score_desc(&mut hits);
    hits.truncate(top_k);
    hits
}

fn sort_by_score_desc(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(id: &str, task: &str, vector: Vec<f64>) -> Embedding {
        Embedding {
            id: id.to_string(),
            chunk_id: format!("{}_chunk", id),
            task_id: task.to_string(),
            vector,
            model_name: "mock-embedding-model".to_string(),
            dimension: 3,
        }
    }

    fn hit(id: &str, score: f64) -> SearchHit {
        SearchHit {
            embedding_id: id.to_string(),
            chunk_id: format!("{}_chunk", id),
            task_id: "t1".to_string(),
            score,
        }
    }

    #[test]
    fn el_coseno_de_un_vector_consigo_mismo_es_uno() {
        let v = vec![0.3, -0.5, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn un_vector_de_ceros_no_divide_por_cero() {
        let zero = vec![0.0, 0.0, 0.0];
        let q = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&zero, &q), 0.0);
    }

    #[test]
    fn la_busqueda_devuelve_los_mas_parecidos_primero() {
        let mut store = VectorStore::new();
        store.insert(emb("e1", "t1", vec![1.0, 0.0, 0.0]));
        store.insert(emb("e2", "t1", vec![0.0, 1.0, 0.0]));
        store.insert(emb("e3", "t1", vec![0.9, 0.1, 0.0]));

        let hits = store.search(&[1.0, 0.0, 0.0], 2, None);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].embedding_id, "e1");
        assert_eq!(hits[1].embedding_id, "e3");
    }

    #[test]
    fn el_filtro_por_tarea_ignora_las_demas() {
        let mut store = VectorStore::new();
        store.insert(emb("e1", "t1", vec![1.0, 0.0, 0.0]));
        store.insert(emb("e2", "t2", vec![1.0, 0.0, 0.0]));

        let filtro = vec!["t2".to_string()];
        let hits = store.search(&[1.0, 0.0, 0.0], 5, Some(&filtro));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].task_id, "t2");
    }

    #[test]
    fn la_fusion_de_dos_replicas_da_el_top_k_global_ordenado() {
        // réplica A: [0.9, 0.8] - réplica B: [0.95, 0.7]
        let todos = vec![hit("a1", 0.9), hit("a2", 0.8), hit("b1", 0.95), hit("b2", 0.7)];

        let top = merge_top_k(todos, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].score, 0.95);
        assert_eq!(top[1].score, 0.9);
        assert_eq!(top[0].embedding_id, "b1");
        assert_eq!(top[1].embedding_id, "a1");
    }

    #[test]
    fn las_stats_cuentan_embeddings_y_tareas() {
        let mut store = VectorStore::new();
        store.insert(emb("e1", "t1", vec![1.0, 0.0, 0.0]));
        store.insert(emb("e2", "t1", vec![0.0, 1.0, 0.0]));
        store.insert(emb("e3", "t2", vec![0.0, 0.0, 1.0]));

        let stats = store.stats();
        assert_eq!(stats.total_embeddings, 3);
        assert_eq!(stats.total_tasks, 2);
    }
}
