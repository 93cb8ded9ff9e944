//! Índice de embeddings sobre los `(:Passage)` de la ley en Neo4j.
//!
//! API pública:
//!   - trait [`EmbeddingIndex`], lo único que consume el pipeline.
//!   - [`Neo4jIndex`], implementación sobre el índice vectorial de Neo4j.
//!   - `ensure_passage_vector_index(&Graph, &AppConfig)`.

use std::sync::Arc;

use async_trait::async_trait;
use neo4rs::{query, Graph, Row};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::IndexError;
use crate::llm::LlmManager;
use crate::models::{
    normalize_score, IndexHit, IndexRecord, IndexStatistics, PassageKind, PassageMetadata,
};

/// Índice semántico de la ley.
///
/// Para una entrada idéntica y un índice sin cambios, `search` devuelve
/// siempre el mismo orden (similitud descendente).
#[async_trait]
pub trait EmbeddingIndex: Send + Sync {
    async fn search(&self, query: &str, n_results: usize) -> Result<Vec<IndexHit>, IndexError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<IndexRecord>, IndexError>;

    async fn count(&self) -> Result<usize, IndexError>;

    async fn statistics(&self) -> Result<IndexStatistics, IndexError>;
}

/// Índice respaldado por Neo4j y embeddings de Rig.
#[derive(Clone)]
pub struct Neo4jIndex {
    graph: Arc<Graph>,
    llm: LlmManager,
    index_name: String,
}

impl Neo4jIndex {
    pub fn new(graph: Arc<Graph>, llm: LlmManager, index_name: impl Into<String>) -> Self {
        Self { graph, llm, index_name: index_name.into() }
    }
}

#[async_trait]
impl EmbeddingIndex for Neo4jIndex {
    async fn search(&self, query_text: &str, n_results: usize) -> Result<Vec<IndexHit>, IndexError> {
        if n_results == 0 {
            return Ok(Vec::new());
        }

        // 1) Embedding de la query
        let query_vec = self.llm.embed_query(query_text).await?;

        // 2) Vector search en Neo4j
        let mut cursor = self
            .graph
            .execute(
                query(
                    "CALL db.index.vector.queryNodes($index_name, $k, $embedding)
                     YIELD node, score
                     RETURN node.content AS content, node.kind AS kind,
                            node.number AS number, node.length AS length, score
                     ORDER BY score DESC",
                )
                .param("index_name", self.index_name.clone())
                .param("k", n_results as i64)
                .param("embedding", query_vec),
            )
            .await
            .map_err(IndexError::neo4j)?;

        // 3) Convertir filas a IndexHit
        let mut hits = Vec::new();
        while let Some(row) = cursor.next().await.map_err(IndexError::neo4j)? {
            let score: f64 = row
                .get("score")
                .ok_or_else(|| IndexError::neo4j("Falta campo 'score' en resultado de Neo4j"))?;
            let content: String = row
                .get("content")
                .ok_or_else(|| IndexError::neo4j("Falta campo 'content' en resultado de Neo4j"))?;
            hits.push(IndexHit {
                content,
                metadata: metadata_from_row(&row),
                similarity_score: normalize_score(score),
            });
        }

        debug!(query = query_text, hits = hits.len(), "Búsqueda vectorial completada");
        Ok(hits)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<IndexRecord>, IndexError> {
        let mut cursor = self
            .graph
            .execute(
                query(
                    "MATCH (p:Passage {id: $id})
                     RETURN p.id AS id, p.content AS content, p.kind AS kind,
                            p.number AS number, p.length AS length",
                )
                .param("id", id.to_string()),
            )
            .await
            .map_err(IndexError::neo4j)?;

        let Some(row) = cursor.next().await.map_err(IndexError::neo4j)? else {
            return Ok(None);
        };
        let content: String = row.get("content").unwrap_or_default();
        Ok(Some(IndexRecord {
            id: row.get("id").unwrap_or_else(|| id.to_string()),
            metadata: metadata_from_row(&row),
            content,
        }))
    }

    async fn count(&self) -> Result<usize, IndexError> {
        let mut cursor = self
            .graph
            .execute(query("MATCH (p:Passage) RETURN count(p) AS total"))
            .await
            .map_err(IndexError::neo4j)?;
        let total = match cursor.next().await.map_err(IndexError::neo4j)? {
            Some(row) => row.get::<i64>("total").unwrap_or(0),
            None => 0,
        };
        Ok(total.max(0) as usize)
    }

    async fn statistics(&self) -> Result<IndexStatistics, IndexError> {
        let mut cursor = self
            .graph
            .execute(query(
                "MATCH (p:Passage)
                 RETURN count(p) AS total,
                        sum(CASE WHEN p.kind = 'article' THEN 1 ELSE 0 END) AS articles",
            ))
            .await
            .map_err(IndexError::neo4j)?;

        let (total, articles) = match cursor.next().await.map_err(IndexError::neo4j)? {
            Some(row) => (
                row.get::<i64>("total").unwrap_or(0).max(0) as usize,
                row.get::<i64>("articles").unwrap_or(0).max(0) as usize,
            ),
            None => (0, 0),
        };

        Ok(IndexStatistics {
            total_documents: total,
            articles_count: articles,
            sections_count: total.saturating_sub(articles),
        })
    }
}

fn metadata_from_row(row: &Row) -> PassageMetadata {
    let kind: String = row.get("kind").unwrap_or_default();
    PassageMetadata {
        kind: PassageKind::from_label(&kind),
        number: row.get::<String>("number"),
        length: row.get::<i64>("length").unwrap_or(0).max(0) as usize,
    }
}

/// Nombre entre comillas invertidas para interpolarlo en Cypher.
fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Garantiza que el índice vectorial sobre `:Passage(embedding)` exista.
pub async fn ensure_passage_vector_index(graph: &Graph, cfg: &AppConfig) -> anyhow::Result<()> {
    let index_name = &cfg.vector_index_name;

    // ¿Ya existe el índice? Usamos la sintaxis moderna SHOW VECTOR INDEXES.
    let mut cursor = graph
        .execute(
            query("SHOW VECTOR INDEXES YIELD name WHERE name = $name RETURN name")
                .param("name", index_name.clone()),
        )
        .await?;

    if cursor.next().await?.is_some() {
        info!("Índice vectorial '{index_name}' ya existe.");
        return Ok(());
    }

    let cypher = format!(
        "\
CREATE VECTOR INDEX {index_name}
FOR (p:Passage)
ON (p.embedding)
OPTIONS {{
  indexConfig: {{
    `vector.dimensions`: {dimensions},
    `vector.similarity_function`: 'cosine'
  }}
}}",
        index_name = quote_identifier(index_name),
        dimensions = cfg.embedding_dimensions
    );

    graph.run(query(&cypher)).await?;
    info!("Índice vectorial '{index_name}' creado.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_names_are_quoted() {
        assert_eq!(quote_identifier("passageEmbeddingIndex"), "`passageEmbeddingIndex`");
        assert_eq!(quote_identifier("idx-ley 2381"), "`idx-ley 2381`");
        assert_eq!(quote_identifier("a`) DROP"), "`a``) DROP`");
    }
}
