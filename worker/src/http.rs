use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use common::protocol::{
    BatchParams, ChunksClearedResponse, ChunksResponse, EmbeddingBatchResponse,
    IndexStatsResponse, QueueStatusResponse, SearchRequest, SearchResponse,
    TaskEmbeddingsResponse,
};
use common::TaskId;
use tower_http::trace::TraceLayer;

use crate::stages::{ChunkStore, EmbeddingQueue, IndexStore};

/* --------- réplica de chunking: sirve sus chunks --------- */

pub fn chunk_router(store: ChunkStore) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chunks/:task_id", get(get_chunks).delete(clear_chunks))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

async fn get_chunks(
    State(store): State<ChunkStore>,
    Path(task_id): Path<TaskId>,
) -> Result<Json<ChunksResponse>, StatusCode> {
    match store.get(&task_id) {
        Some(chunks) => Ok(Json(ChunksResponse { task_id, chunks })),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn clear_chunks(
    State(store): State<ChunkStore>,
    Path(task_id): Path<TaskId>,
) -> Json<ChunksClearedResponse> {
    let cleared = store.clear(&task_id);
    Json(ChunksClearedResponse { task_id, cleared })
}

/* --------- réplica de embedding: cola acotada de lotes --------- */

pub fn embed_router(queue: EmbeddingQueue) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/embeddings/batch", get(get_embeddings_batch))
        .route("/queue/status", get(queue_status))
        .layer(TraceLayer::new_for_http())
        .with_state(queue)
}

async fn get_embeddings_batch(
    State(queue): State<EmbeddingQueue>,
    Query(params): Query<BatchParams>,
) -> Json<EmbeddingBatchResponse> {
    let embeddings = queue.pop_batch(params.batch_size);
    let count = embeddings.len();
    Json(EmbeddingBatchResponse { embeddings, count })
}

async fn queue_status(State(queue): State<EmbeddingQueue>) -> Json<QueueStatusResponse> {
    Json(QueueStatusResponse {
        queue_size: queue.depth(),
        max_size: queue.capacity(),
    })
}

/* --------- réplica de indexado: búsqueda vectorial --------- */

pub fn index_router(store: IndexStore) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search", post(search))
        .route("/stats", get(stats))
        .route("/embeddings/:task_id", get(task_embeddings))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

async fn search(
    State(store): State<IndexStore>,
    Json(req): Json<SearchRequest>,
) -> Json<SearchResponse> {
    let results = store.search(&req.query_vector, req.top_k, req.task_ids.as_deref());
    Json(SearchResponse { results })
}

async fn stats(State(store): State<IndexStore>) -> Json<IndexStatsResponse> {
    Json(store.stats())
}

async fn task_embeddings(
    State(store): State<IndexStore>,
    Path(task_id): Path<TaskId>,
) -> Result<Json<TaskEmbeddingsResponse>, StatusCode> {
    let embedding_ids = store.embedding_ids_for_task(&task_id);
    if embedding_ids.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(TaskEmbeddingsResponse {
        task_id,
        embedding_ids,
    }))
}

async fn health() -> &'static str {
    "ok"
}
