use std::sync::{Arc, Mutex};

use anyhow::Context;
use ley_rag::{
    api,
    app_state::{AppState, Status},
    config, llm, neo4j_client,
    rag::QueryOrchestrator,
    vector_store::{self, EmbeddingIndex, Neo4jIndex},
};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Conectar a Neo4j y asegurar esquema e índice vectorial
    let graph = neo4j_client::connect_from_config(&cfg)
        .await
        .context("Error conectando a Neo4j")?;
    neo4j_client::ensure_schema(&graph)
        .await
        .context("Error asegurando el esquema de Neo4j")?;
    vector_store::ensure_passage_vector_index(&graph, &cfg)
        .await
        .context("Error asegurando el índice vectorial")?;
    let graph = Arc::new(graph);

    // 4. Índice, LLM y pipeline de consulta
    let llm_manager = llm::LlmManager::from_config(&cfg);
    let index = Arc::new(Neo4jIndex::new(
        graph.clone(),
        llm_manager.clone(),
        cfg.vector_index_name.clone(),
    ));
    match index.count().await {
        Ok(0) => warn!("Índice vacío. Lanza la ingesta con POST /api/ingest."),
        Ok(n) => info!("Índice con {n} documentos."),
        Err(e) => warn!("No se pudo contar el índice: {e}"),
    }
    let orchestrator = Arc::new(QueryOrchestrator::new(
        index.clone(),
        Arc::new(llm_manager.clone()),
        cfg.pipeline(),
    ));

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 5. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        graph,
        llm_manager,
        index,
        orchestrator,
        status: Arc::new(Mutex::new(Status {
            is_busy: false,
            message: "Servidor listo.".to_string(),
            progress: 0.0,
        })),
        shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    // 6. Configurar el router de la API
    let app = api::create_router(app_state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    // 7. Iniciar el servidor
    let listener = tokio::net::TcpListener::bind(&cfg.server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {}", cfg.server_addr))?;
    info!("🚀 Servidor escuchando en http://{}", cfg.server_addr);

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
