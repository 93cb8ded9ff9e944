//! Dobles en memoria del índice y del servicio de completado.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use ley_rag::error::{CompletionError, IndexError};
use ley_rag::llm::{CompletionRequest, CompletionService};
use ley_rag::models::{article_document_id, IndexHit, IndexRecord, IndexStatistics, PassageKind, PassageMetadata};
use ley_rag::vector_store::EmbeddingIndex;

pub fn hit(kind: PassageKind, number: &str, score: f64, content: &str) -> IndexHit {
    IndexHit {
        content: content.to_string(),
        metadata: PassageMetadata {
            kind,
            number: Some(number.to_string()),
            length: content.chars().count(),
        },
        similarity_score: score,
    }
}

pub fn article(number: &str, score: f64) -> IndexHit {
    hit(PassageKind::Article, number, score, &format!("Contenido del artículo {number}"))
}

/// Índice con respuestas fijas por consulta (comparación exacta).
#[derive(Default)]
pub struct ScriptedIndex {
    results: HashMap<String, Vec<IndexHit>>,
    fail: bool,
    calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    /// Los resultados deben venir ya ordenados por similitud descendente.
    pub fn with(mut self, query: &str, hits: Vec<IndexHit>) -> Self {
        self.results.insert(query.to_string(), hits);
        self
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingIndex for ScriptedIndex {
    async fn search(&self, query: &str, n_results: usize) -> Result<Vec<IndexHit>, IndexError> {
        self.calls.lock().unwrap().push((query.to_string(), n_results));
        if self.fail {
            return Err(IndexError::Backend {
                backend: "scripted".to_string(),
                message: "conexión rechazada".to_string(),
            });
        }
        let mut hits = self.results.get(query).cloned().unwrap_or_default();
        hits.truncate(n_results);
        Ok(hits)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<IndexRecord>, IndexError> {
        Ok(self
            .results
            .values()
            .flatten()
            .find(|h| {
                h.metadata.kind == PassageKind::Article
                    && h.metadata.number.as_deref().map(article_document_id).as_deref() == Some(id)
            })
            .map(|h| IndexRecord {
                id: id.to_string(),
                content: h.content.clone(),
                metadata: h.metadata.clone(),
            }))
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.results.values().map(Vec::len).sum())
    }

    async fn statistics(&self) -> Result<IndexStatistics, IndexError> {
        let total = self.count().await?;
        let articles = self
            .results
            .values()
            .flatten()
            .filter(|h| h.metadata.kind == PassageKind::Article)
            .count();
        Ok(IndexStatistics {
            total_documents: total,
            articles_count: articles,
            sections_count: total - articles,
        })
    }
}

/// Servicio de completado que responde en orden con un guion y registra
/// cada petición. Sin guion restante, falla.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(CompletionError::Provider(message.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Provider("sin respuestas en el guion".to_string())))
    }
}

pub fn intent_json(query_type: &str, specificity: &str, terms: &[&str]) -> String {
    serde_json::json!({
        "type": query_type,
        "keywords": ["pensión"],
        "specificity": specificity,
        "suggested_search_terms": terms,
    })
    .to_string()
}
