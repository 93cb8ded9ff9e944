//! Errores tipados de cada etapa del pipeline y de sus colaboradores.

use thiserror::Error;

/// Fallos del índice de embeddings (búsqueda, lectura por id, estadísticas).
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Error del índice vectorial ({backend}): {message}")]
    Backend { backend: String, message: String },

    #[error("Error generando el embedding de la consulta: {0}")]
    Embedding(String),
}

impl IndexError {
    pub fn neo4j(err: impl std::fmt::Display) -> Self {
        Self::Backend { backend: "neo4j".to_string(), message: err.to_string() }
    }
}

/// Fallos del servicio de completado (transporte, cuota, proveedor).
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Error del proveedor LLM: {0}")]
    Provider(String),

    #[error("Proveedor LLM {0} aún no implementado para chat")]
    UnsupportedProvider(String),

    #[error("El modelo devolvió una respuesta vacía")]
    EmptyResponse,
}

/// La clasificación de intención no pudo completarse. Nunca sale del clasificador.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("La respuesta del clasificador no contiene un objeto JSON")]
    MissingJson,

    #[error("JSON de intención inválido: {0}")]
    Parse(#[from] serde_json::Error),
}

/// El índice falló durante la recuperación; se propaga al orquestador.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Fallo en la búsqueda '{query}': {source}")]
    Search {
        query: String,
        #[source]
        source: IndexError,
    },
}

/// Fallo al redactar la respuesta; el compositor lo convierte en texto visible.
#[derive(Debug, Error)]
pub enum CompositionError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
}
