use std::sync::PoisonError;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::spawn;
use tracing::{error, info};

use crate::{
    app_state::{AppState, Status},
    ingest,
    models::{
        article_document_id, IndexHit, IndexRecord, IndexStatistics, IntentAnalysis, QueryResult,
        RetrievedPassage, SourceCitation,
    },
    rag::QueryContext,
    vector_store::EmbeddingIndex,
};

/// Tope de resultados de la búsqueda cruda.
const MAX_SEARCH_RESULTS: usize = 20;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct QueryPayload {
    question: String,
    #[serde(default)]
    caller: Option<String>,
}

#[derive(Serialize)]
pub struct QueryResponse {
    query: String,
    response: String,
    sources: Vec<SourceCitation>,
    /// Segundos.
    processing_time: f64,
    timestamp: String,
}

impl From<QueryResult> for QueryResponse {
    fn from(result: QueryResult) -> Self {
        Self {
            query: result.query,
            response: result.response,
            sources: result.sources,
            processing_time: result.processing_time.as_secs_f64(),
            timestamp: result.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
pub struct RetrievePayload {
    query: String,
}

#[derive(Serialize)]
pub struct RetrieveResponse {
    query: String,
    intent: IntentAnalysis,
    passages: Vec<RetrievedPassage>,
}

fn default_max_results() -> usize {
    5
}

#[derive(Deserialize)]
pub struct SearchPayload {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

#[derive(Serialize)]
pub struct SearchResponse {
    query: String,
    count: usize,
    results: Vec<IndexHit>,
}

#[derive(Deserialize)]
pub struct IngestPayload {
    #[serde(default)]
    force: bool,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/query", post(query_handler))
        .route("/api/retrieve", post(retrieve_handler))
        .route("/api/search", post(search_handler))
        .route("/api/articles/:number", get(article_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/health", get(health_handler))
        .route("/api/ingest", post(ingest_handler))
        .route("/api/status", get(status_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers ---

/// Siempre responde 200 con un resultado: el pipeline no falla hacia fuera.
#[axum::debug_handler]
async fn query_handler(
    State(state): State<AppState>,
    Json(payload): Json<QueryPayload>,
) -> Json<QueryResponse> {
    let ctx = match payload.caller {
        Some(caller) => QueryContext::for_caller(caller),
        None => QueryContext::new(),
    };
    let result = state
        .orchestrator
        .process_with_context(payload.question.trim(), &ctx)
        .await;
    Json(result.into())
}

#[axum::debug_handler]
async fn retrieve_handler(
    State(state): State<AppState>,
    Json(payload): Json<RetrievePayload>,
) -> Result<Json<RetrieveResponse>, ApiError> {
    match state.orchestrator.retrieve(&payload.query).await {
        Ok((intent, passages)) => Ok(Json(RetrieveResponse {
            query: payload.query,
            intent,
            passages,
        })),
        Err(e) => {
            error!("Error en la recuperación: {e}");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error al recuperar pasajes: {e}"),
            ))
        }
    }
}

#[axum::debug_handler]
async fn search_handler(
    State(state): State<AppState>,
    Json(payload): Json<SearchPayload>,
) -> Result<Json<SearchResponse>, ApiError> {
    let max_results = payload.max_results.clamp(1, MAX_SEARCH_RESULTS);
    match state.index.search(&payload.query, max_results).await {
        Ok(results) => Ok(Json(SearchResponse {
            query: payload.query,
            count: results.len(),
            results,
        })),
        Err(e) => {
            error!("Error en búsqueda: {e}");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[axum::debug_handler]
async fn article_handler(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<IndexRecord>, ApiError> {
    match state.index.get_by_id(&article_document_id(&number)).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Artículo {number} no encontrado"),
        )),
        Err(e) => {
            error!("Error obteniendo artículo {number}: {e}");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[axum::debug_handler]
async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<IndexStatistics>, ApiError> {
    state.index.statistics().await.map(Json).map_err(|e| {
        error!("Error obteniendo estadísticas: {e}");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

#[axum::debug_handler]
async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.index.count().await {
        Ok(documents) => Ok(Json(json!({ "status": "ok", "documents": documents }))),
        Err(e) => {
            error!("Error en el health check del índice: {e}");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

#[axum::debug_handler]
async fn ingest_handler(
    State(state): State<AppState>,
    Json(payload): Json<IngestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    {
        let mut status = state.status.lock().unwrap_or_else(PoisonError::into_inner);
        if status.is_busy {
            return Err(api_error(StatusCode::CONFLICT, "Ya hay una indexación en curso."));
        }
        status.is_busy = true;
        status.message = "Iniciando indexación...".to_string();
        status.progress = 0.0;
    }

    spawn(async move {
        let result = ingest::ingest_law(
            &state.graph,
            &state.index,
            &state.llm_manager,
            &state.config.law_pdf_path,
            payload.force,
            state.status.clone(),
        )
        .await;

        let mut status = state.status.lock().unwrap_or_else(PoisonError::into_inner);
        status.is_busy = false;
        status.progress = 0.0;
        match result {
            Ok(summary) => {
                status.message = format!("¡Indexación completada! {}", summary);
            }
            Err(err) => {
                status.message = format!("Error en la indexación: {}", err);
                error!("Error de ingesta: {}", err);
            }
        }
    });

    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(state.status.lock().unwrap_or_else(PoisonError::into_inner).clone())
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state
        .shutdown_sender
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
    {
        let _ = sender.send(());
    }
    StatusCode::OK
}
