//! Invariantes de la fusión de resultados: ids únicos, máximo por id,
//! orden descendente y tope por especificidad.

mod common;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use common::article;
use ley_rag::models::{IndexHit, IntentAnalysis, QueryType, Specificity};
use ley_rag::retrieval::{merge_candidates, RetrievalAggregator};
use proptest::prelude::*;

fn arb_pool() -> impl Strategy<Value = Vec<IndexHit>> {
    proptest::collection::vec((0u8..8, 0.0f64..=1.0), 0..30).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(number, score)| article(&number.to_string(), score))
            .collect()
    })
}

fn arb_specificity() -> impl Strategy<Value = Specificity> {
    prop_oneof![Just(Specificity::High), Just(Specificity::Medium), Just(Specificity::Low)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn merged_results_are_unique_sorted_and_keep_the_best(pool in arb_pool(), limit in 1usize..10) {
        let mut best: HashMap<String, f64> = HashMap::new();
        for hit in &pool {
            let id = hit.metadata.logical_id();
            let entry = best.entry(id).or_insert(hit.similarity_score);
            if hit.similarity_score > *entry {
                *entry = hit.similarity_score;
            }
        }

        let merged = merge_candidates(pool, limit);

        prop_assert_eq!(merged.len(), best.len().min(limit));

        let ids: HashSet<_> = merged.iter().map(|p| p.logical_id.clone()).collect();
        prop_assert_eq!(ids.len(), merged.len());

        for pair in merged.windows(2) {
            prop_assert!(pair[0].similarity_score >= pair[1].similarity_score);
        }

        for passage in &merged {
            prop_assert_eq!(passage.similarity_score, best[&passage.logical_id]);
        }
    }

    #[test]
    fn aggregator_never_exceeds_target(pool in arb_pool(), specificity in arb_specificity()) {
        let mut sorted = pool;
        sorted.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        let index = Arc::new(common::ScriptedIndex::new().with("q", sorted));
        let aggregator = RetrievalAggregator::new(index);
        let intent = IntentAnalysis {
            query_type: QueryType::General,
            keywords: vec![],
            specificity,
            suggested_search_terms: vec![],
        };

        let passages = tokio_test::block_on(aggregator.retrieve("q", &intent)).unwrap();

        prop_assert!(passages.len() <= specificity.target_results());
    }
}
