//! Modelos de dominio: pasajes de la ley, análisis de intención y resultados.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tipo de fragmento indexado de la ley.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassageKind {
    Article,
    Chapter,
    Title,
    /// Cualquier otra división que el índice pueda devolver.
    Section,
}

impl PassageKind {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "article" => Self::Article,
            "chapter" => Self::Chapter,
            "title" => Self::Title,
            _ => Self::Section,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Chapter => "chapter",
            Self::Title => "title",
            Self::Section => "section",
        }
    }

    /// Nombre legible en español.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Article => "Artículo",
            Self::Chapter => "Capítulo",
            Self::Title => "Título",
            Self::Section => "Sección",
        }
    }
}

/// Id del documento de un artículo en el índice (`article_15`).
pub fn article_document_id(number: &str) -> String {
    format!("article_{}", number.trim())
}

/// Id del documento de un capítulo o título en el índice (`section_chapter_II`).
pub fn section_document_id(kind: PassageKind, number: &str) -> String {
    format!("section_{}_{}", kind.as_str(), number.trim())
}

/// Lleva una similitud a [0, 1]. Valores no finitos cuentan como 0.
pub fn normalize_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Metadatos que acompañan a cada documento del índice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    pub kind: PassageKind,
    /// Número de artículo o de sección tal como aparece en la ley.
    pub number: Option<String>,
    pub length: usize,
}

impl PassageMetadata {
    /// Clave lógica usada para deduplicar resultados de varias búsquedas.
    ///
    /// Los artículos usan su número; las secciones lo prefijan con su tipo
    /// para que el capítulo I y el título I no colisionen.
    pub fn logical_id(&self) -> String {
        match (&self.number, self.kind) {
            (None, _) => "unknown".to_string(),
            (Some(n), PassageKind::Article) => n.clone(),
            (Some(n), kind) => format!("{}_{}", kind.as_str(), n),
        }
    }
}

/// Un resultado crudo de búsqueda en el índice.
#[derive(Debug, Clone, Serialize)]
pub struct IndexHit {
    pub content: String,
    pub metadata: PassageMetadata,
    pub similarity_score: f64,
}

/// Un documento leído por id.
#[derive(Debug, Clone, Serialize)]
pub struct IndexRecord {
    pub id: String,
    pub content: String,
    pub metadata: PassageMetadata,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStatistics {
    pub total_documents: usize,
    pub articles_count: usize,
    pub sections_count: usize,
}

/// Pasaje recuperado y deduplicado, listo para construir el contexto.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    pub content: String,
    pub similarity_score: f64,
    pub logical_id: String,
    pub kind: PassageKind,
    pub number: Option<String>,
}

impl RetrievedPassage {
    pub fn from_hit(hit: IndexHit) -> Self {
        Self {
            logical_id: hit.metadata.logical_id(),
            kind: hit.metadata.kind,
            number: hit.metadata.number,
            similarity_score: normalize_score(hit.similarity_score),
            content: hit.content,
        }
    }

    /// Referencia legible: "Artículo 15", "Capítulo II".
    pub fn reference(&self) -> String {
        format!("{} {}", self.kind.display_name(), self.number.as_deref().unwrap_or("N/A"))
    }

    /// Encabezado del pasaje dentro del contexto enviado al modelo.
    pub fn context_header(&self) -> String {
        format!("{}:", self.reference().to_uppercase())
    }

    pub fn citation(&self) -> SourceCitation {
        SourceCitation {
            reference: self.reference(),
            similarity_score: self.similarity_score,
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCitation {
    pub reference: String,
    pub similarity_score: f64,
    pub kind: PassageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Definition,
    Procedure,
    Requirement,
    Calculation,
    General,
    SpecificArticle,
}

impl QueryType {
    /// Los valores desconocidos colapsan a `General`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "definition" => Self::Definition,
            "procedure" => Self::Procedure,
            "requirement" => Self::Requirement,
            "calculation" => Self::Calculation,
            "specific_article" => Self::SpecificArticle,
            _ => Self::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::Procedure => "procedure",
            Self::Requirement => "requirement",
            Self::Calculation => "calculation",
            Self::General => "general",
            Self::SpecificArticle => "specific_article",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Specificity {
    High,
    Medium,
    Low,
}

impl Specificity {
    /// Los valores desconocidos colapsan a `Medium`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Número de pasajes a devolver según lo acotada que sea la consulta.
    pub fn target_results(&self) -> usize {
        match self {
            Self::High => 3,
            Self::Medium => 5,
            Self::Low => 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentAnalysis {
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub keywords: Vec<String>,
    pub specificity: Specificity,
    pub suggested_search_terms: Vec<String>,
}

impl IntentAnalysis {
    /// Análisis por defecto cuando el clasificador falla.
    pub fn fallback(query: &str) -> Self {
        Self {
            query_type: QueryType::General,
            keywords: vec![query.to_string()],
            specificity: Specificity::Medium,
            suggested_search_terms: vec![query.to_string()],
        }
    }
}

/// Resultado final de una consulta. Se construye una vez y no se modifica.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub query: String,
    pub response: String,
    pub sources: Vec<SourceCitation>,
    pub timestamp: DateTime<Utc>,
    pub processing_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(kind: PassageKind, number: Option<&str>) -> PassageMetadata {
        PassageMetadata { kind, number: number.map(str::to_string), length: 0 }
    }

    #[test]
    fn logical_ids_keep_sections_apart_from_articles() {
        assert_eq!(meta(PassageKind::Article, Some("15")).logical_id(), "15");
        assert_eq!(meta(PassageKind::Chapter, Some("I")).logical_id(), "chapter_I");
        assert_eq!(meta(PassageKind::Title, Some("I")).logical_id(), "title_I");
        assert_eq!(meta(PassageKind::Article, None).logical_id(), "unknown");
    }

    #[test]
    fn references_and_headers() {
        let passage = RetrievedPassage::from_hit(IndexHit {
            content: "REQUISITOS".to_string(),
            metadata: meta(PassageKind::Article, Some("15")),
            similarity_score: 0.92,
        });
        assert_eq!(passage.reference(), "Artículo 15");
        assert_eq!(passage.context_header(), "ARTÍCULO 15:");

        let chapter = RetrievedPassage::from_hit(IndexHit {
            content: "DISPOSICIONES".to_string(),
            metadata: meta(PassageKind::Chapter, Some("II")),
            similarity_score: 0.5,
        });
        assert_eq!(chapter.reference(), "Capítulo II");
        assert_eq!(chapter.context_header(), "CAPÍTULO II:");
    }

    #[test]
    fn scores_are_clamped_to_unit_interval() {
        let passage = RetrievedPassage::from_hit(IndexHit {
            content: String::new(),
            metadata: meta(PassageKind::Title, Some("3")),
            similarity_score: 1.2,
        });
        assert_eq!(passage.similarity_score, 1.0);
    }

    #[test]
    fn non_finite_scores_become_zero() {
        for score in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let passage = RetrievedPassage::from_hit(IndexHit {
                content: String::new(),
                metadata: meta(PassageKind::Article, Some("7")),
                similarity_score: score,
            });
            assert_eq!(passage.similarity_score, 0.0);
        }
        assert_eq!(normalize_score(-0.3), 0.0);
        assert_eq!(normalize_score(0.42), 0.42);
    }

    #[test]
    fn unknown_labels_collapse_to_defaults() {
        assert_eq!(Specificity::from_label("very-high"), Specificity::Medium);
        assert_eq!(Specificity::from_label(" LOW "), Specificity::Low);
        assert_eq!(QueryType::from_label("chit-chat"), QueryType::General);
        assert_eq!(QueryType::from_label("specific_article"), QueryType::SpecificArticle);
        assert_eq!(PassageKind::from_label("annex"), PassageKind::Section);
    }

    #[test]
    fn target_results_per_specificity() {
        assert_eq!(Specificity::High.target_results(), 3);
        assert_eq!(Specificity::Medium.target_results(), 5);
        assert_eq!(Specificity::Low.target_results(), 7);
    }

    #[test]
    fn document_ids() {
        assert_eq!(article_document_id(" 15"), "article_15");
        assert_eq!(section_document_id(PassageKind::Chapter, "II"), "section_chapter_II");
    }
}
