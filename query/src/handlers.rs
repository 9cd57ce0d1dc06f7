use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use common::llm::{MockChatLlm, MockEmbeddingLlm};
use common::protocol::{
    ChunksResponse, QueryRequest, QueryResponse, SearchHit, SearchRequest, SearchResponse,
    SourceRef,
};
use common::vector::merge_top_k;
use reqwest::Client;
use tokio::task::JoinSet;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Cuántas fuentes van al contexto del LLM y a la respuesta.
const CONTEXT_SOURCES: usize = 3;

#[derive(Clone)]
pub struct AppState {
    pub http: Client,
    pub embedding_llm: MockEmbeddingLlm,
    pub chat_llm: MockChatLlm,
    /// Réplicas del índice vectorial a las que se abre la consulta.
    pub vector_db_urls: Vec<String>,
    /// Réplicas de chunking donde se resuelve el contenido de cada chunk.
    pub chunk_service_urls: Vec<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/query", post(query))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, StatusCode> {
    info!("procesando consulta: {:.50}", req.query);
    let query_vector = state.embedding_llm.generate_embedding(&req.query);

    // 1) Fan-out en paralelo a todas las réplicas del índice
    let mut searches = JoinSet::new();
    for db_url in state.vector_db_urls.clone() {
        let http = state.http.clone();
        let body = SearchRequest {
            query_vector: query_vector.clone(),
            top_k: req.top_k,
            task_ids: req.task_ids.clone(),
        };
        searches.spawn(async move {
            let resp = http
                .post(format!("{}/search", db_url))
                .json(&body)
                .send()
                .await?
                .error_for_status()?;
            let parsed: SearchResponse = resp.json().await?;
            anyhow::Ok((db_url, parsed.results))
        });
    }

    let mut all_hits: Vec<SearchHit> = Vec::new();
    while let Some(joined) = searches.join_next().await {
        match joined {
            Ok(Ok((db_url, results))) => {
                info!("{} resultados de {}", results.len(), db_url);
                all_hits.extend(results);
            }
            Ok(Err(e)) => warn!("una réplica del índice falló: {:?}", e),
            Err(e) => warn!("join error en el fan-out de búsqueda: {:?}", e),
        }
    }

    // Si ninguna réplica devolvió nada, la consulta falla
    if all_hits.is_empty() {
        warn!("ninguna réplica del índice devolvió resultados");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    // 2) Fusión global: ordenar por score y truncar al top-k pedido
    let merged = merge_top_k(all_hits, req.top_k);

    // 3) Resolver el contenido de los mejores chunks
    let mut context_chunks: Vec<String> = Vec::new();
    for hit in merged.iter().take(CONTEXT_SOURCES) {
        match resolve_chunk_content(&state, hit).await {
            Some(content) => context_chunks.push(content),
            None => warn!(
                "no se encontró el chunk {} de la tarea {} en ninguna réplica",
                hit.chunk_id, hit.task_id
            ),
        }
    }

    // 4) Generar la respuesta con el contexto recuperado
    let context = context_chunks.join("\n\n");
    let response = state.chat_llm.generate_response(&req.query, &context);

    let sources = merged
        .iter()
        .take(CONTEXT_SOURCES)
        .map(|hit| SourceRef {
            chunk_id: hit.chunk_id.clone(),
            task_id: hit.task_id.clone(),
            score: hit.score,
        })
        .collect();

    Ok(Json(QueryResponse {
        query: req.query,
        response,
        sources,
    }))
}

/// Prueba cada réplica de chunking en orden y se queda con la primera que
/// tenga el chunk. No hay reconciliación de contenido entre réplicas.
async fn resolve_chunk_content(state: &AppState, hit: &SearchHit) -> Option<String> {
    for chunk_url in &state.chunk_service_urls {
        let url = format!("{}/chunks/{}", chunk_url, hit.task_id);
        let resp = match state.http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            _ => continue,
        };

        let body: ChunksResponse = match resp.json().await {
            Ok(body) => body,
            Err(_) => continue,
        };

        if let Some(chunk) = body.chunks.into_iter().find(|c| c.id == hit.chunk_id) {
            return Some(chunk.content);
        }
    }
    None
}
