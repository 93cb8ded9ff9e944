//! Recuperación multi-consulta: consulta principal más términos sugeridos,
//! fusión, deduplicación por id lógico y reordenación por similitud.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::RetrievalError;
use crate::models::{IndexHit, IntentAnalysis, RetrievedPassage};
use crate::vector_store::EmbeddingIndex;

/// Términos sugeridos que se examinan como búsquedas adicionales.
pub const MAX_EXTRA_QUERIES: usize = 2;
/// Resultados pedidos al índice por cada búsqueda adicional.
pub const EXTRA_QUERY_RESULTS: usize = 3;

pub struct RetrievalAggregator {
    index: Arc<dyn EmbeddingIndex>,
}

impl RetrievalAggregator {
    pub fn new(index: Arc<dyn EmbeddingIndex>) -> Self {
        Self { index }
    }

    /// Devuelve como mucho `target_n` pasajes, sin ids lógicos repetidos y
    /// ordenados por similitud descendente. Un índice sin coincidencias da
    /// una lista vacía, no un error.
    pub async fn retrieve(
        &self,
        query: &str,
        intent: &IntentAnalysis,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        let target_n = intent.specificity.target_results();

        let mut pool = self.search(query, target_n).await?;
        for term in extra_search_terms(query, intent) {
            pool.extend(self.search(term, EXTRA_QUERY_RESULTS).await?);
        }

        let candidates = pool.len();
        let passages = merge_candidates(pool, target_n);
        info!(candidates, kept = passages.len(), target_n, "Recuperación completada");
        Ok(passages)
    }

    async fn search(&self, query: &str, n_results: usize) -> Result<Vec<IndexHit>, RetrievalError> {
        debug!(query, n_results, "Consultando índice");
        self.index
            .search(query, n_results)
            .await
            .map_err(|source| RetrievalError::Search { query: query.to_string(), source })
    }
}

/// Términos sugeridos que generan búsquedas adicionales: de los dos primeros,
/// los que no coinciden (sin distinguir mayúsculas) con la consulta.
pub fn extra_search_terms<'a>(query: &str, intent: &'a IntentAnalysis) -> Vec<&'a str> {
    let query_lower = query.trim().to_lowercase();
    intent
        .suggested_search_terms
        .iter()
        .take(MAX_EXTRA_QUERIES)
        .map(String::as_str)
        .filter(|term| term.trim().to_lowercase() != query_lower)
        .collect()
}

/// Deduplica por id lógico quedándose con la mayor similitud (en empate
/// gana el primero visto), ordena de forma estable por similitud
/// descendente y trunca a `limit`.
pub fn merge_candidates(pool: Vec<IndexHit>, limit: usize) -> Vec<RetrievedPassage> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<RetrievedPassage> = Vec::new();

    for hit in pool {
        let passage = RetrievedPassage::from_hit(hit);
        match positions.get(&passage.logical_id) {
            Some(&pos) => {
                if passage.similarity_score > unique[pos].similarity_score {
                    unique[pos] = passage;
                }
            }
            None => {
                positions.insert(passage.logical_id.clone(), unique.len());
                unique.push(passage);
            }
        }
    }

    unique.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    unique.truncate(limit);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PassageKind, PassageMetadata, Specificity};

    fn hit(kind: PassageKind, number: &str, score: f64, content: &str) -> IndexHit {
        IndexHit {
            content: content.to_string(),
            metadata: PassageMetadata {
                kind,
                number: Some(number.to_string()),
                length: content.len(),
            },
            similarity_score: score,
        }
    }

    #[test]
    fn keeps_highest_scoring_duplicate() {
        let pool = vec![
            hit(PassageKind::Article, "15", 0.60, "primera"),
            hit(PassageKind::Article, "20", 0.70, "veinte"),
            hit(PassageKind::Article, "15", 0.90, "segunda"),
        ];
        let merged = merge_candidates(pool, 5);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].logical_id, "15");
        assert_eq!(merged[0].content, "segunda");
        assert_eq!(merged[1].logical_id, "20");
    }

    #[test]
    fn ties_keep_the_first_seen_passage() {
        let pool = vec![
            hit(PassageKind::Article, "7", 0.5, "primero"),
            hit(PassageKind::Article, "7", 0.5, "segundo"),
        ];
        let merged = merge_candidates(pool, 5);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].content, "primero");
    }

    #[test]
    fn equal_scores_keep_insertion_order() {
        let pool = vec![
            hit(PassageKind::Article, "1", 0.4, "a"),
            hit(PassageKind::Article, "2", 0.8, "b"),
            hit(PassageKind::Article, "3", 0.4, "c"),
        ];
        let ids: Vec<_> = merge_candidates(pool, 5).into_iter().map(|p| p.logical_id).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
    }

    #[test]
    fn chapter_and_title_with_same_number_do_not_collide() {
        let pool = vec![
            hit(PassageKind::Chapter, "I", 0.4, "capítulo"),
            hit(PassageKind::Title, "I", 0.3, "título"),
        ];
        assert_eq!(merge_candidates(pool, 5).len(), 2);
    }

    #[test]
    fn nan_scores_sort_last() {
        let pool = vec![
            hit(PassageKind::Article, "4", f64::NAN, "nan"),
            hit(PassageKind::Article, "5", 0.2, "baja"),
            hit(PassageKind::Article, "6", 0.7, "alta"),
        ];
        let merged = merge_candidates(pool, 5);
        let ids: Vec<_> = merged.iter().map(|p| p.logical_id.as_str()).collect();
        assert_eq!(ids, vec!["6", "5", "4"]);
        assert_eq!(merged[2].similarity_score, 0.0);
    }

    #[test]
    fn truncates_to_limit() {
        let pool = (0..10)
            .map(|i| hit(PassageKind::Article, &i.to_string(), i as f64 / 10.0, "x"))
            .collect();
        let merged = merge_candidates(pool, 3);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].logical_id, "9");
    }

    #[test]
    fn extra_terms_skip_the_primary_query_and_stop_at_two() {
        let intent = IntentAnalysis {
            query_type: crate::models::QueryType::Requirement,
            keywords: vec![],
            specificity: Specificity::Medium,
            suggested_search_terms: vec![
                "Pensión de Vejez".to_string(),
                "requisitos".to_string(),
                "semanas cotizadas".to_string(),
            ],
        };
        assert_eq!(extra_search_terms("pensión de vejez", &intent), vec!["requisitos"]);
        assert_eq!(
            extra_search_terms("otra cosa", &intent),
            vec!["Pensión de Vejez", "requisitos"]
        );
        assert!(extra_search_terms("q", &IntentAnalysis::fallback("q")).is_empty());
    }
}
