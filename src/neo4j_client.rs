use anyhow::{Context, Result};
use neo4rs::{query, Graph};
use tracing::info;
use url::Url;

use crate::config::AppConfig;

pub async fn connect_from_config(cfg: &AppConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.neo4j_uri)
        .with_context(|| format!("NEO4J_URI inválido: '{}'", cfg.neo4j_uri))?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.neo4j_user, &cfg.neo4j_password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Crea el constraint de unicidad de `:Passage(id)`, la clave que usa
/// `get_by_id` y el MERGE de la ingesta.
pub async fn ensure_schema(graph: &Graph) -> Result<()> {
    graph
        .run(query(
            "CREATE CONSTRAINT passage_id IF NOT EXISTS
             FOR (p:Passage)
             REQUIRE p.id IS UNIQUE",
        ))
        .await?;

    info!("Esquema de Neo4j asegurado (constraint :Passage(id)).");
    Ok(())
}
