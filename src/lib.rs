//! Asistente RAG sobre la Ley 2381 de 2024.
//!
//! El núcleo es el pipeline de consulta ([`rag::QueryOrchestrator`]):
//! clasificación de intención, recuperación multi-consulta, redacción de la
//! respuesta y empaquetado con citas. Neo4j (índice vectorial) y Rig
//! (completado y embeddings) se consumen a través de los traits
//! [`vector_store::EmbeddingIndex`] y [`llm::CompletionService`].

pub mod api;
pub mod app_state;
pub mod composer;
pub mod config;
pub mod error;
pub mod ingest;
pub mod intent;
pub mod llm;
pub mod models;
pub mod neo4j_client;
pub mod rag;
pub mod retrieval;
pub mod vector_store;
