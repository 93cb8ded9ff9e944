//! Ingesta del PDF de la ley en Neo4j: extracción de texto, segmentación en
//! artículos, capítulos y títulos, embeddings y persistencia como `(:Passage)`.

use std::{
    collections::HashSet,
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::{anyhow, Context, Result};
use neo4rs::{query, Graph, Txn};
use regex::Regex;
use tracing::{info, warn};

use crate::{
    app_state::Status,
    llm::LlmManager,
    models::{article_document_id, section_document_id, PassageKind, PassageMetadata},
    vector_store::{EmbeddingIndex, Neo4jIndex},
};

/// Textos por llamada de embeddings.
const EMBEDDING_BATCH: usize = 64;
/// Longitud mínima (exclusiva) del contenido de un artículo.
const MIN_ARTICLE_CHARS: usize = 50;
/// Longitud mínima (exclusiva) del contenido de un capítulo o título.
const MIN_SECTION_CHARS: usize = 20;

/// Encabezado al inicio de línea. Los artículos admiten sufijo ordinal
/// (`ARTÍCULO 1o.`, `ARTÍCULO 2º`, `ARTÍCULO 3°`), que no forma parte del número.
const HEADER_PATTERN: &str = r"(?mi)^[ \t]*(?:(ART[ÍI]CULO)[ \t]+(\d+)(?:[oº]\b|°|\b)|(CAP[ÍI]TULO|T[ÍI]TULO)[ \t]+([IVXLC]+|\d+)\b)\.?";

/// Un fragmento de la ley listo para indexar.
#[derive(Debug, Clone, PartialEq)]
pub struct LawSegment {
    pub id: String,
    pub kind: PassageKind,
    pub number: String,
    pub content: String,
}

impl LawSegment {
    pub fn metadata(&self) -> PassageMetadata {
        PassageMetadata {
            kind: self.kind,
            number: Some(self.number.clone()),
            length: self.content.chars().count(),
        }
    }
}

#[derive(Debug, Default)]
pub struct LawSegments {
    pub segments: Vec<LawSegment>,
    pub duplicates_skipped: usize,
    pub too_short_skipped: usize,
}

impl LawSegments {
    pub fn articles(&self) -> usize {
        self.segments.iter().filter(|s| s.kind == PassageKind::Article).count()
    }

    pub fn sections(&self) -> usize {
        self.segments.len() - self.articles()
    }
}

/// Resumen de los resultados de una operación de ingesta.
#[derive(Debug, Default)]
pub struct IngestionSummary {
    pub articles_indexed: usize,
    pub sections_indexed: usize,
    pub duplicates_skipped: usize,
    pub too_short_skipped: usize,
    /// Documentos que ya había en el índice cuando se omitió la ingesta.
    pub already_indexed: Option<usize>,
}

/// Implementa cómo se mostrará el resumen como texto.
impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(existing) = self.already_indexed {
            return write!(
                f,
                "El índice ya contiene {existing} documentos. Use force para reindexar."
            );
        }
        write!(
            f,
            "Resumen: {} artículos y {} secciones indexados. {} duplicados y {} fragmentos demasiado cortos omitidos.",
            self.articles_indexed, self.sections_indexed, self.duplicates_skipped, self.too_short_skipped
        )
    }
}

struct Header {
    kind: PassageKind,
    number: String,
    start: usize,
    end: usize,
}

/// Encabezados que cierran el contenido de un fragmento del tipo dado.
fn ends_segment(kind: PassageKind, next: PassageKind) -> bool {
    match kind {
        PassageKind::Article => next == PassageKind::Article,
        PassageKind::Chapter => matches!(next, PassageKind::Chapter | PassageKind::Article),
        _ => true,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Segmenta el texto de la ley en artículos, capítulos y títulos.
pub fn segment_law(text: &str) -> Result<LawSegments> {
    let header_re = Regex::new(HEADER_PATTERN)?;

    let headers: Vec<Header> = header_re
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let (kind, number) = if let Some(number) = caps.get(2) {
                (PassageKind::Article, number.as_str())
            } else {
                let label = caps.get(3)?.as_str().to_uppercase();
                let kind = if label.starts_with("CAP") {
                    PassageKind::Chapter
                } else {
                    PassageKind::Title
                };
                (kind, caps.get(4)?.as_str())
            };
            Some(Header {
                kind,
                number: number.to_uppercase(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect();

    let mut result = LawSegments::default();
    let mut seen: HashSet<(PassageKind, String)> = HashSet::new();

    for (i, header) in headers.iter().enumerate() {
        let content_end = headers[i + 1..]
            .iter()
            .find(|next| ends_segment(header.kind, next.kind))
            .map(|next| next.start)
            .unwrap_or(text.len());
        let content = collapse_whitespace(&text[header.end..content_end]);

        let min_chars = match header.kind {
            PassageKind::Article => MIN_ARTICLE_CHARS,
            _ => MIN_SECTION_CHARS,
        };

        if seen.contains(&(header.kind, header.number.clone())) {
            warn!("{} {} duplicado - omitiendo", header.kind.display_name(), header.number);
            result.duplicates_skipped += 1;
            continue;
        }
        if content.chars().count() <= min_chars {
            result.too_short_skipped += 1;
            continue;
        }

        seen.insert((header.kind, header.number.clone()));
        let id = match header.kind {
            PassageKind::Article => article_document_id(&header.number),
            kind => section_document_id(kind, &header.number),
        };
        result.segments.push(LawSegment {
            id,
            kind: header.kind,
            number: header.number.clone(),
            content,
        });
    }

    info!(
        "Se encontraron {} artículos y {} secciones únicas",
        result.articles(),
        result.sections()
    );
    Ok(result)
}

fn set_status(status_arc: &Arc<Mutex<Status>>, message: String, progress: f32) {
    let mut status = status_arc.lock().unwrap_or_else(PoisonError::into_inner);
    status.message = message;
    status.progress = progress;
}

/// Qué hacer con los pasajes ya indexados al iniciar una ingesta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPlan {
    /// El índice tiene pasajes y no se pidió reindexar.
    Skip,
    /// Índice vacío: sólo se escriben los pasajes nuevos.
    Fresh,
    /// Se borran los pasajes existentes y se escriben los nuevos en la
    /// misma transacción.
    Replace,
}

pub fn plan_ingestion(existing: usize, force: bool) -> IngestPlan {
    match (existing, force) {
        (0, _) => IngestPlan::Fresh,
        (_, false) => IngestPlan::Skip,
        (_, true) => IngestPlan::Replace,
    }
}

/// Extrae, segmenta e indexa el PDF de la ley.
///
/// Si el índice ya contiene pasajes y `force` es `false`, no se hace nada.
/// Con `force`, los pasajes existentes sólo se eliminan cuando los nuevos
/// embeddings ya están listos, dentro de la transacción que los escribe.
/// Cualquier fallo previo deja el índice como estaba.
pub async fn ingest_law(
    graph: &Graph,
    index: &Neo4jIndex,
    llm: &LlmManager,
    pdf_path: &Path,
    force: bool,
    status_arc: Arc<Mutex<Status>>,
) -> Result<IngestionSummary> {
    let existing = index.count().await?;
    let plan = plan_ingestion(existing, force);
    if plan == IngestPlan::Skip {
        info!("El índice ya contiene {existing} documentos; se omite la ingesta.");
        return Ok(IngestionSummary { already_indexed: Some(existing), ..Default::default() });
    }

    set_status(&status_arc, "Extrayendo texto del PDF...".to_string(), 0.0);
    let text = extract_pdf_text(pdf_path).await?;

    let segmented = segment_law(&text)?;
    if segmented.segments.is_empty() {
        return Err(anyhow!(
            "No se encontraron artículos ni secciones en {}",
            pdf_path.display()
        ));
    }

    // --- Fase 1: Embeddings por lotes ---
    let total = segmented.segments.len();
    let mut embeddings: Vec<Vec<f64>> = Vec::with_capacity(total);
    for batch in segmented.segments.chunks(EMBEDDING_BATCH) {
        set_status(
            &status_arc,
            format!("Generando embeddings {}/{}...", embeddings.len() + batch.len(), total),
            embeddings.len() as f32 / total as f32 * 0.9,
        );
        let texts = batch.iter().map(|s| s.content.clone()).collect();
        embeddings.extend(llm.embed_texts(texts).await?);
    }

    // --- Fase 2: Persistencia ---
    set_status(&status_arc, "Guardando pasajes en Neo4j...".to_string(), 0.95);
    let tx = graph.start_txn().await?;
    let written = write_passages(&tx, plan, existing, &segmented.segments, &embeddings).await;
    match written {
        Ok(()) => tx.commit().await?,
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("No se pudo revertir la transacción de ingesta: {rollback_err}");
            }
            return Err(e);
        }
    }

    let summary = IngestionSummary {
        articles_indexed: segmented.articles(),
        sections_indexed: segmented.sections(),
        duplicates_skipped: segmented.duplicates_skipped,
        too_short_skipped: segmented.too_short_skipped,
        already_indexed: None,
    };
    info!("Indexación completada. {summary}");
    Ok(summary)
}

async fn extract_pdf_text(pdf_path: &Path) -> Result<String> {
    if !pdf_path.is_file() {
        return Err(anyhow!("No se encontró el archivo PDF: {}", pdf_path.display()));
    }
    let path = pdf_path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
        .await
        .context("La extracción del PDF terminó inesperadamente")?
        .map_err(|e| anyhow!("Error extrayendo texto del PDF {}: {e}", pdf_path.display()))?;
    info!("Texto extraído exitosamente. Longitud: {} caracteres", text.len());
    Ok(text)
}

async fn write_passages(
    tx: &Txn,
    plan: IngestPlan,
    existing: usize,
    segments: &[LawSegment],
    embeddings: &[Vec<f64>],
) -> Result<()> {
    if plan == IngestPlan::Replace {
        info!("Reemplazando {existing} pasajes existentes...");
        tx.run(query("MATCH (p:Passage) DETACH DELETE p")).await?;
    }
    upsert_passages(tx, segments, embeddings).await
}

async fn upsert_passages(tx: &Txn, segments: &[LawSegment], embeddings: &[Vec<f64>]) -> Result<()> {
    for (segment, embedding) in segments.iter().zip(embeddings) {
        let metadata = segment.metadata();
        tx.run(
            query(
                "MERGE (p:Passage {id: $id})
                 SET p.kind = $kind, p.number = $number, p.content = $content,
                     p.length = $length, p.embedding = $embedding",
            )
            .param("id", segment.id.clone())
            .param("kind", segment.kind.as_str())
            .param("number", segment.number.clone())
            .param("content", segment.content.clone())
            .param("length", metadata.length as i64)
            .param("embedding", embedding.clone()),
        )
        .await?;
    }
    Ok(())
}
