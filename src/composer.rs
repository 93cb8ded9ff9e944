//! Redacción de la respuesta: respuesta directa o resumen de varios artículos.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::CompositionError;
use crate::llm::{CompletionRequest, CompletionService};
use crate::models::{IntentAnalysis, PassageKind, RetrievedPassage, Specificity};

/// Por encima de este número de pasajes, una consulta amplia se resume.
pub const SUMMARY_MIN_PASSAGES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// No hay pasajes: mensaje fijo, sin llamar al modelo.
    NoInformation,
    DirectAnswer,
    Summary,
}

pub struct ResponseComposer {
    llm: Arc<dyn CompletionService>,
    config: PipelineConfig,
}

impl ResponseComposer {
    pub fn new(llm: Arc<dyn CompletionService>, config: PipelineConfig) -> Self {
        Self { llm, config }
    }

    pub fn no_information_message(&self) -> String {
        format!(
            "No encontré información relevante sobre tu consulta en la {}. ¿Podrías reformular tu pregunta o ser más específico?",
            self.config.law_name
        )
    }

    pub fn select_mode(&self, passages: &[RetrievedPassage], intent: &IntentAnalysis) -> ResponseMode {
        if passages.is_empty() {
            ResponseMode::NoInformation
        } else if self.config.summarize_broad_queries
            && passages.len() > SUMMARY_MIN_PASSAGES
            && intent.specificity == Specificity::Low
        {
            ResponseMode::Summary
        } else {
            ResponseMode::DirectAnswer
        }
    }

    /// Nunca falla: los errores del modelo se devuelven como texto visible.
    pub async fn compose(
        &self,
        query: &str,
        passages: &[RetrievedPassage],
        intent: &IntentAnalysis,
    ) -> String {
        match self.select_mode(passages, intent) {
            ResponseMode::NoInformation => self.no_information_message(),
            ResponseMode::DirectAnswer => match self.answer(query, passages, intent).await {
                Ok(text) => {
                    info!(query_type = intent.query_type.as_str(), "Respuesta generada");
                    text
                }
                Err(e) => {
                    error!("Error generando respuesta: {e}");
                    format!("Lo siento, ocurrió un error al procesar tu consulta: {e}")
                }
            },
            ResponseMode::Summary => self.summarize(passages, query).await,
        }
    }

    async fn answer(
        &self,
        query: &str,
        passages: &[RetrievedPassage],
        intent: &IntentAnalysis,
    ) -> Result<String, CompositionError> {
        let request = CompletionRequest::new(
            answer_user_prompt(&self.config.law_name, &build_context(passages), query),
            self.config.answer,
        )
        .with_system(answer_system_prompt(&self.config.law_name, intent));
        Ok(self.llm.complete(request).await?)
    }

    /// Resumen ejecutivo sobre `topic` a partir de los artículos recuperados.
    pub async fn summarize(&self, passages: &[RetrievedPassage], topic: &str) -> String {
        if passages.is_empty() {
            return "No se encontró información suficiente para generar un resumen.".to_string();
        }

        let articles: Vec<&RetrievedPassage> =
            passages.iter().filter(|p| p.kind == PassageKind::Article).collect();
        if articles.is_empty() {
            return "No se encontraron artículos relevantes para generar el resumen.".to_string();
        }

        let combined = articles
            .iter()
            .map(|p| format!("{}: {}", p.reference(), p.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = CompletionRequest::new(
            summary_prompt(&self.config.law_name, topic, &combined),
            self.config.summary,
        );
        match self.llm.complete(request).await.map_err(CompositionError::from) {
            Ok(text) => {
                info!(articles = articles.len(), "Resumen generado");
                text
            }
            Err(e) => {
                error!("Error generando resumen: {e}");
                format!("Error al generar resumen: {e}")
            }
        }
    }
}

/// Contexto de grounding: cada pasaje precedido de su referencia.
pub fn build_context(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .map(|p| format!("{}\n{}", p.context_header(), p.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn answer_system_prompt(law_name: &str, intent: &IntentAnalysis) -> String {
    format!(
        r#"Eres un asistente especializado en la {law_name} sobre el Sistema de Protección Social Integral para la Vejez, Invalidez y Muerte en Colombia.

INSTRUCCIONES:
1. Responde ÚNICAMENTE basándote en la información proporcionada de la ley
2. Utiliza un lenguaje claro y accesible para cualquier persona
3. Si la información no está en el contexto proporcionado, indícalo claramente
4. Estructura tu respuesta de manera organizada
5. Al final de tu respuesta, incluye las referencias exactas de los artículos utilizados

TIPO DE CONSULTA DETECTADO: {query_type}
ESPECIFICIDAD: {specificity}

FORMATO DE RESPUESTA:
[Respuesta en lenguaje natural y claro]

**Referencias:**
- [Lista de artículos citados]"#,
        query_type = intent.query_type.as_str(),
        specificity = intent.specificity.as_str(),
    )
}

fn answer_user_prompt(law_name: &str, context: &str, query: &str) -> String {
    format!(
        "CONTEXTO DE LA {law}:\n{context}\n\nCONSULTA DEL USUARIO:\n{query}\n\nPor favor, responde la consulta basándote únicamente en la información proporcionada.",
        law = law_name.to_uppercase(),
    )
}

fn summary_prompt(law_name: &str, topic: &str, combined: &str) -> String {
    format!(
        r#"Genera un resumen ejecutivo claro y organizado sobre "{topic}" basándote en los siguientes artículos de la {law_name}:

{combined}

El resumen debe:
1. Ser conciso pero completo
2. Usar lenguaje accesible
3. Estar bien estructurado
4. Incluir los puntos más importantes
5. Mencionar los artículos de referencia al final

FORMATO:
## Resumen: {topic}

[Contenido del resumen organizado en párrafos]

**Artículos consultados:** [Lista de artículos]"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryType;

    fn passage(kind: PassageKind, number: &str, content: &str) -> RetrievedPassage {
        RetrievedPassage {
            content: content.to_string(),
            similarity_score: 0.5,
            logical_id: number.to_string(),
            kind,
            number: Some(number.to_string()),
        }
    }

    #[test]
    fn context_labels_each_passage() {
        let context = build_context(&[
            passage(PassageKind::Article, "15", "REQUISITOS"),
            passage(PassageKind::Title, "III", "PILARES"),
        ]);
        assert_eq!(context, "ARTÍCULO 15:\nREQUISITOS\n\nTÍTULO III:\nPILARES");
    }

    #[test]
    fn system_prompt_carries_the_grounding_rules() {
        let intent = IntentAnalysis {
            query_type: QueryType::Definition,
            keywords: vec![],
            specificity: Specificity::High,
            suggested_search_terms: vec![],
        };
        let prompt = answer_system_prompt("Ley 2381 de 2024", &intent);
        assert!(prompt.contains("ÚNICAMENTE"));
        assert!(prompt.contains("lenguaje claro y accesible"));
        assert!(prompt.contains("indícalo claramente"));
        assert!(prompt.contains("**Referencias:**"));
        assert!(prompt.contains("TIPO DE CONSULTA DETECTADO: definition"));
    }

    #[test]
    fn summary_prompt_names_topic_and_articles() {
        let prompt = summary_prompt("Ley 2381 de 2024", "pensiones", "Artículo 1: x");
        assert!(prompt.contains("resumen ejecutivo"));
        assert!(prompt.contains("## Resumen: pensiones"));
        assert!(prompt.contains("**Artículos consultados:**"));
    }
}
