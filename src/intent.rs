//! Clasificación de la intención de una consulta con el servicio de completado.
//!
//! El clasificador nunca falla hacia fuera: cualquier error del modelo o
//! respuesta sin JSON válido se sustituye por [`IntentAnalysis::fallback`].

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::ClassificationError;
use crate::llm::{CompletionRequest, CompletionService};
use crate::models::{IntentAnalysis, QueryType, Specificity};

/// Máximo de términos sugeridos que se conservan del clasificador.
pub const MAX_SUGGESTED_TERMS: usize = 5;

/// Forma tolerante de la respuesta del modelo: todo es opcional y los
/// valores se normalizan después.
#[derive(Debug, Deserialize)]
struct RawIntent {
    #[serde(rename = "type")]
    query_type: Option<String>,
    keywords: Option<Vec<String>>,
    specificity: Option<String>,
    suggested_search_terms: Option<Vec<String>>,
}

pub struct IntentClassifier {
    llm: Arc<dyn CompletionService>,
    config: PipelineConfig,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn CompletionService>, config: PipelineConfig) -> Self {
        Self { llm, config }
    }

    pub async fn classify(&self, query: &str) -> IntentAnalysis {
        match self.try_classify(query).await {
            Ok(intent) => {
                info!(
                    query_type = intent.query_type.as_str(),
                    specificity = intent.specificity.as_str(),
                    "Análisis de intención"
                );
                intent
            }
            Err(e) => {
                warn!("Error en análisis de intención, se usa el análisis por defecto: {e}");
                IntentAnalysis::fallback(query)
            }
        }
    }

    async fn try_classify(&self, query: &str) -> Result<IntentAnalysis, ClassificationError> {
        let request = CompletionRequest::new(
            intent_prompt(&self.config.law_name, query),
            self.config.classification,
        );
        let reply = self.llm.complete(request).await?;
        parse_intent(&reply, query)
    }
}

/// Extrae el objeto JSON de la respuesta (del primer `{` al último `}`) y lo
/// convierte en un análisis tipado.
pub fn parse_intent(reply: &str, query: &str) -> Result<IntentAnalysis, ClassificationError> {
    let json = extract_json_object(reply).ok_or(ClassificationError::MissingJson)?;
    let raw: RawIntent = serde_json::from_str(json)?;
    Ok(normalize(raw, query))
}

fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}

fn normalize(raw: RawIntent, query: &str) -> IntentAnalysis {
    let keywords = raw
        .keywords
        .map(clean_terms)
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| vec![query.to_string()]);

    let mut suggested_search_terms = raw.suggested_search_terms.map(clean_terms).unwrap_or_default();
    suggested_search_terms.truncate(MAX_SUGGESTED_TERMS);

    IntentAnalysis {
        query_type: raw
            .query_type
            .as_deref()
            .map(QueryType::from_label)
            .unwrap_or(QueryType::General),
        keywords,
        specificity: raw
            .specificity
            .as_deref()
            .map(Specificity::from_label)
            .unwrap_or(Specificity::Medium),
        suggested_search_terms,
    }
}

fn clean_terms(terms: Vec<String>) -> Vec<String> {
    terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn intent_prompt(law_name: &str, query: &str) -> String {
    format!(
        r#"Analiza la siguiente consulta sobre la {law_name} (Sistema de Protección Social) y determina:

1. TIPO DE CONSULTA:
- "definition": Busca definiciones o conceptos
- "procedure": Pregunta sobre procedimientos o trámites
- "requirement": Busca requisitos o condiciones
- "calculation": Involucra cálculos de pensiones, aportes, etc.
- "general": Consulta general o exploratoria
- "specific_article": Busca un artículo específico

2. PALABRAS CLAVE: Identifica los términos más importantes

3. ESPECIFICIDAD:
- "high": Pregunta muy específica
- "medium": Pregunta moderadamente específica
- "low": Pregunta general o amplia

Consulta: "{query}"

Responde SOLO en formato JSON:
{{
    "type": "tipo_de_consulta",
    "keywords": ["palabra1", "palabra2"],
    "specificity": "nivel",
    "suggested_search_terms": ["término1", "término2"]
}}"#
    )
}
