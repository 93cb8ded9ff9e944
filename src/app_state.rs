use std::sync::{Arc, Mutex};

use neo4rs::Graph;
use tokio::sync::oneshot;

use crate::{config::AppConfig, llm::LlmManager, rag::QueryOrchestrator, vector_store::Neo4jIndex};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub graph: Arc<Graph>,
    pub llm_manager: LlmManager,
    pub index: Arc<Neo4jIndex>,
    pub orchestrator: Arc<QueryOrchestrator>,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

/// Estado de la ingesta en segundo plano.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub progress: f32, // Valor entre 0.0 y 1.0
}
