//! Carga y gestión de configuración de la aplicación (Neo4j + LLM + pipeline).

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub server_addr: String,

    pub llm_provider: LlmProvider,
    pub llm_embedding_model: String,
    pub llm_chat_model: String,

    pub law_pdf_path: PathBuf,
    pub law_name: String,
    pub vector_index_name: String,
    pub embedding_dimensions: usize,
    pub summarize_broad_queries: bool,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let neo4j_uri = env::var("NEO4J_URI")
            .map_err(|_| anyhow!("Falta NEO4J_URI en el entorno"))?;
        let neo4j_user = env::var("NEO4J_USER")
            .map_err(|_| anyhow!("Falta NEO4J_USER en el entorno"))?;
        let neo4j_password = env::var("NEO4J_PASSWORD")
            .map_err(|_| anyhow!("Falta NEO4J_PASSWORD en el entorno"))?;

        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());

        let llm_provider_str =
            env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_provider = LlmProvider::from_str(&llm_provider_str)?;

        let llm_embedding_model = env::var("LLM_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let llm_chat_model =
            env::var("LLM_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let law_pdf_path = env::var("LAW_PDF_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/ley_2381_2024.pdf"));
        let law_name = env::var("LAW_NAME").unwrap_or_else(|_| DEFAULT_LAW_NAME.to_string());
        let vector_index_name = env::var("VECTOR_INDEX_NAME")
            .unwrap_or_else(|_| "passageEmbeddingIndex".to_string());

        let embedding_dimensions = match env::var("EMBEDDING_DIMENSIONS") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("EMBEDDING_DIMENSIONS inválido: '{raw}'"))?,
            Err(_) => 1536,
        };

        let summarize_broad_queries = match env::var("SUMMARIZE_BROAD_QUERIES") {
            Ok(raw) => parse_flag(&raw)
                .ok_or_else(|| anyhow!("SUMMARIZE_BROAD_QUERIES inválido: '{raw}'"))?,
            Err(_) => true,
        };

        Ok(Self {
            neo4j_uri,
            neo4j_user,
            neo4j_password,
            server_addr,
            llm_provider,
            llm_embedding_model,
            llm_chat_model,
            law_pdf_path,
            law_name,
            vector_index_name,
            embedding_dimensions,
            summarize_broad_queries,
        })
    }

    /// Parámetros que consume el pipeline de consulta.
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            law_name: self.law_name.clone(),
            summarize_broad_queries: self.summarize_broad_queries,
            ..PipelineConfig::default()
        }
    }
}

pub const DEFAULT_LAW_NAME: &str = "Ley 2381 de 2024";

/// Presupuesto de una llamada al servicio de completado.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionBudget {
    pub max_tokens: u64,
    pub temperature: f64,
}

/// Configuración del pipeline RAG, independiente de Neo4j y del proveedor LLM.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub law_name: String,
    /// Si es `false`, nunca se usa el modo resumen.
    pub summarize_broad_queries: bool,
    pub classification: CompletionBudget,
    pub answer: CompletionBudget,
    pub summary: CompletionBudget,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            law_name: DEFAULT_LAW_NAME.to_string(),
            summarize_broad_queries: true,
            classification: CompletionBudget { max_tokens: 500, temperature: 0.1 },
            answer: CompletionBudget { max_tokens: 1500, temperature: 0.3 },
            summary: CompletionBudget { max_tokens: 1500, temperature: 0.3 },
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "si" | "sí" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parsing_is_case_insensitive() {
        assert_eq!(LlmProvider::from_str(" OpenAI ").unwrap(), LlmProvider::OpenAI);
        assert_eq!(LlmProvider::from_str("ollama").unwrap(), LlmProvider::Ollama);
        assert!(LlmProvider::from_str("anthropic").is_err());
    }

    #[test]
    fn flags_accept_spanish_and_english() {
        assert_eq!(parse_flag("sí"), Some(true));
        assert_eq!(parse_flag("FALSE"), Some(false));
        assert_eq!(parse_flag("quizá"), None);
    }

    #[test]
    fn default_budgets_match_pipeline_calls() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.classification.max_tokens, 500);
        assert_eq!(cfg.answer.max_tokens, 1500);
        assert!(cfg.summarize_broad_queries);
        assert_eq!(cfg.law_name, "Ley 2381 de 2024");
    }
}
