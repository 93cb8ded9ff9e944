//! Orquestación de una consulta RAG sobre la ley.
//!
//! Flujo lineal:
//!   1. Clasificación de intención (nunca falla, usa un análisis por defecto).
//!   2. Recuperación multi-consulta con deduplicación y reordenación.
//!   3. Redacción de la respuesta (directa o resumen), con degradación a texto.
//!   4. Empaquetado en un [`QueryResult`] con fuentes y tiempo de proceso.
//!
//! `process` siempre devuelve un resultado: si la recuperación falla, la
//! respuesta explica el error y no hay fuentes.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::composer::ResponseComposer;
use crate::config::PipelineConfig;
use crate::error::RetrievalError;
use crate::intent::IntentClassifier;
use crate::llm::CompletionService;
use crate::models::{IntentAnalysis, QueryResult, RetrievedPassage, SourceCitation};
use crate::retrieval::RetrievalAggregator;
use crate::vector_store::EmbeddingIndex;

/// Contexto explícito de una petición. Lo crea la capa que aloja el
/// pipeline y se descarta al terminar.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub request_id: Uuid,
    /// Identificador opcional de quien consulta (usuario del bot, cliente HTTP).
    pub caller: Option<String>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self { request_id: Uuid::new_v4(), caller: None }
    }

    pub fn for_caller(caller: impl Into<String>) -> Self {
        Self { caller: Some(caller.into()), ..Self::new() }
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct QueryOrchestrator {
    classifier: IntentClassifier,
    aggregator: RetrievalAggregator,
    composer: ResponseComposer,
}

impl QueryOrchestrator {
    pub fn new(
        index: Arc<dyn EmbeddingIndex>,
        llm: Arc<dyn CompletionService>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(llm.clone(), config.clone()),
            aggregator: RetrievalAggregator::new(index),
            composer: ResponseComposer::new(llm, config),
        }
    }

    pub async fn process(&self, query: &str) -> QueryResult {
        self.process_with_context(query, &QueryContext::new()).await
    }

    pub async fn process_with_context(&self, query: &str, ctx: &QueryContext) -> QueryResult {
        let span = tracing::info_span!(
            "rag_query",
            request_id = %ctx.request_id,
            caller = ctx.caller.as_deref().unwrap_or("-"),
        );
        self.run(query).instrument(span).await
    }

    async fn run(&self, query: &str) -> QueryResult {
        let timestamp = Utc::now();
        let started = Instant::now();

        let (response, sources) = match self.answer(query).await {
            Ok(answered) => answered,
            Err(e) => {
                error!("Error procesando consulta: {e}");
                (format!("Ocurrió un error al procesar tu consulta: {e}"), Vec::new())
            }
        };

        let result = QueryResult {
            query: query.to_string(),
            response,
            sources,
            timestamp,
            processing_time: started.elapsed(),
        };
        info!(
            sources = result.sources.len(),
            elapsed_ms = result.processing_time.as_millis() as u64,
            "Consulta procesada"
        );
        result
    }

    async fn answer(&self, query: &str) -> Result<(String, Vec<SourceCitation>), RetrievalError> {
        let intent = self.classifier.classify(query).await;
        let passages = self.aggregator.retrieve(query, &intent).await?;
        let response = self.composer.compose(query, &passages, &intent).await;
        let sources = passages.iter().map(RetrievedPassage::citation).collect();
        Ok((response, sources))
    }

    /// Clasificación y recuperación sin redacción, para usos tipo herramienta.
    pub async fn retrieve(
        &self,
        query: &str,
    ) -> Result<(IntentAnalysis, Vec<RetrievedPassage>), RetrievalError> {
        let intent = self.classifier.classify(query).await;
        let passages = self.aggregator.retrieve(query, &intent).await?;
        Ok((intent, passages))
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn composer(&self) -> &ResponseComposer {
        &self.composer
    }
}
