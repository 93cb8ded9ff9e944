//! Abstracción sobre Rig para trabajar con distintos proveedores de LLM.
//! De momento se implementa OpenAI; Gemini/Ollama quedan preparados para el futuro.
//!
//! El pipeline sólo ve el trait [`CompletionService`]; [`LlmManager`] es la
//! implementación real y además calcula embeddings para el índice.

use async_trait::async_trait;
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel; // <- para .embed_texts
use tracing::debug;

use crate::config::{AppConfig, CompletionBudget, LlmProvider};
use crate::error::{CompletionError, IndexError};

/// Petición estructurada al servicio de completado.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Instrucciones de sistema (preamble). `None` para prompts de un solo mensaje.
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u64,
    pub temperature: f64,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, budget: CompletionBudget) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: budget.max_tokens,
            temperature: budget.temperature,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Servicio externo que genera texto a partir de un prompt.
///
/// Puede fallar por transporte, cuota o timeout del cliente; cada llamada
/// del pipeline captura el error según su propio contrato.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

/// Gestor de LLMs y embeddings.
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub embedding_model: String,
    pub chat_model: String,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            provider: cfg.llm_provider.clone(),
            embedding_model: cfg.llm_embedding_model.clone(),
            chat_model: cfg.llm_chat_model.clone(),
        }
    }

    // ---------------------------------------------------------------------
    // EMBEDDINGS
    // ---------------------------------------------------------------------

    /// Calcula embeddings para una lista de textos, en el mismo orden.
    pub async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>, IndexError> {
        match self.provider {
            LlmProvider::OpenAI => self.embed_with_openai(texts).await,
            ref other => Err(IndexError::Embedding(format!(
                "Proveedor LLM {:?} aún no implementado para embeddings",
                other
            ))),
        }
    }

    /// Embedding de una única consulta.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f64>, IndexError> {
        self.embed_texts(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::Embedding("No se pudo generar embedding de la query".into()))
    }

    async fn embed_with_openai(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>, IndexError> {
        use rig::providers::openai::{self, TEXT_EMBEDDING_3_SMALL};
        // Trait para client.embedding_model(...)
        use rig::client::EmbeddingsClient as _;

        let client = openai::Client::from_env();
        let model_name = if self.embedding_model.is_empty() {
            TEXT_EMBEDDING_3_SMALL
        } else {
            self.embedding_model.as_str()
        };
        let embedding_model = client.embedding_model(model_name);

        let expected = texts.len();
        let embeddings = embedding_model
            .embed_texts(texts)
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))?;

        if embeddings.len() != expected {
            return Err(IndexError::Embedding(format!(
                "Número de embeddings ({}) distinto al número de textos ({})",
                embeddings.len(),
                expected
            )));
        }

        Ok(embeddings.into_iter().map(|e| e.vec).collect())
    }

    // ---------------------------------------------------------------------
    // CHAT / COMPLETION
    // ---------------------------------------------------------------------

    async fn complete_with_openai(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        use rig::providers::openai;
        // Trait para client.agent(...)
        use rig::client::CompletionClient as _;

        let client = openai::Client::from_env();
        let model_name = if self.chat_model.is_empty() {
            "gpt-4o-mini"
        } else {
            self.chat_model.as_str()
        };

        let mut builder = client
            .agent(model_name)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens);
        if let Some(system) = &request.system {
            builder = builder.preamble(system);
        }
        let agent = builder.build();

        debug!(model = model_name, max_tokens = request.max_tokens, "Llamada de completado");
        let answer = agent
            .prompt(request.prompt.as_str())
            .await
            .map_err(|e| CompletionError::Provider(e.to_string()))?;

        if answer.trim().is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(answer)
    }
}

#[async_trait]
impl CompletionService for LlmManager {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_with_openai(request).await,
            ref other => Err(CompletionError::UnsupportedProvider(format!("{:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_budget_and_optional_system() {
        let budget = CompletionBudget { max_tokens: 500, temperature: 0.1 };
        let plain = CompletionRequest::new("hola", budget);
        assert_eq!(plain.system, None);
        assert_eq!(plain.max_tokens, 500);

        let with_system = plain.with_system("eres un asistente");
        assert_eq!(with_system.system.as_deref(), Some("eres un asistente"));
        assert_eq!(with_system.temperature, 0.1);
    }

    #[tokio::test]
    async fn unwired_providers_fail_explicitly() {
        let manager = LlmManager {
            provider: LlmProvider::Ollama,
            embedding_model: String::new(),
            chat_model: String::new(),
        };
        let err = manager
            .complete(CompletionRequest::new("hola", CompletionBudget { max_tokens: 10, temperature: 0.0 }))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::UnsupportedProvider(_)));
        assert!(manager.embed_query("hola").await.is_err());
    }
}
