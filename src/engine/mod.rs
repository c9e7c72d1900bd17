
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::embeddings::Embedder;
use crate::generation::Generator;
use crate::index::FlatIndex;
use crate::prompt::build_prompt;
use crate::session::SessionMemory;
use crate::store::{Document, IndexStore, RetrievalResult};
use crate::{RagError, Result};

/// Characters of body text carried in a source listing.
const SNIPPET_CHARS: usize = 200;

/// A cited source returned alongside an answer, rank 1 being the closest hit.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub rank: usize,
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub snippet: String,
    pub distance: f32,
}

/// A grounded answer with the sources it was conditioned on.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Outcome of a successful index build.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BuildSummary {
    pub generation: Uuid,
    pub documents: usize,
    pub dimension: usize,
}

/// Snapshot of engine state for the status surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub index_loaded: bool,
    pub generation: Option<Uuid>,
    pub documents: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub generation_model: String,
    pub sessions: usize,
}

/// Ties the pipeline together: embedding, retrieval, prompt assembly,
/// generation and session memory.
///
/// Every query binds one index generation for its whole lifetime, so a
/// rebuild landing mid-request never mixes ordinals across generations.
pub struct RagEngine {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    store: IndexStore,
    sessions: SessionMemory,
    default_top_k: usize,
    history_window: usize,
}

impl RagEngine {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: IndexStore,
        config: &Config,
    ) -> Self {
        Self {
            embedder,
            generator,
            store,
            sessions: SessionMemory::new(config.session.max_turns),
            default_top_k: config.retrieval.top_k,
            history_window: config.retrieval.history_window,
        }
    }

    /// Answer a question against the published index, remembering the
    /// exchange under `session_id`.
    ///
    /// `top_k` overrides the configured retrieval depth for this call. A
    /// failed generation surfaces as an error and leaves the session
    /// transcript exactly as it was.
    #[inline]
    pub async fn answer(
        &self,
        session_id: &str,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<AnswerResult> {
        if session_id.trim().is_empty() {
            return Err(RagError::InvalidSession);
        }
        if question.trim().is_empty() {
            return Err(RagError::InvalidQuestion);
        }

        let Some(generation) = self.store.current().await else {
            return Err(RagError::IndexNotLoaded);
        };
        if generation.embedding_model != self.embedder.model() {
            return Err(RagError::Index(format!(
                "Generation {} was embedded with model {} but {} is configured; \
                 rebuild the index",
                generation.id,
                generation.embedding_model,
                self.embedder.model()
            )));
        }

        let k = top_k.unwrap_or(self.default_top_k);
        let query = self.embedder.embed(question).await?;
        let hits = generation.index.search(&query, k);
        debug!(
            "Session {}: {} of {} documents retrieved (k = {})",
            session_id,
            hits.len(),
            generation.document_count(),
            k
        );

        let results: Vec<RetrievalResult> = hits
            .iter()
            .filter_map(|&(ordinal, distance)| {
                generation.document(ordinal).map(|document| RetrievalResult {
                    document: document.clone(),
                    distance,
                })
            })
            .collect();

        let history = self.sessions.recent(session_id, self.history_window).await;
        let prompt = build_prompt(&results, &history, question);

        let answer = self.generator.generate(&prompt).await?;
        self.sessions
            .append_exchange(session_id, question, &answer)
            .await;

        let sources = results
            .iter()
            .enumerate()
            .map(|(i, result)| SourceRef {
                rank: i + 1,
                subject: result.document.subject.clone(),
                sender: result.document.sender.clone(),
                date: result.document.date.clone(),
                snippet: snippet(&result.document.body),
                distance: result.distance,
            })
            .collect();

        info!(
            "Session {}: answered with {} sources from generation {}",
            session_id,
            results.len(),
            generation.id
        );
        Ok(AnswerResult { answer, sources })
    }

    /// Embed a document batch and publish it as the new index generation.
    ///
    /// An empty batch is refused before anything touches disk.
    #[inline]
    pub async fn build(&self, documents: Vec<Document>) -> Result<BuildSummary> {
        if documents.is_empty() {
            return Err(RagError::EmptyDocumentSet);
        }

        info!("Building index over {} documents", documents.len());
        let texts: Vec<String> = documents.iter().map(Document::embedding_text).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        let index = FlatIndex::from_vectors(vectors)?;
        let dimension = index.dimension();

        let generation = self
            .store
            .publish(index, documents, self.embedder.model())
            .await?;

        Ok(BuildSummary {
            generation: generation.id,
            documents: generation.document_count(),
            dimension,
        })
    }

    /// Current engine state for `/status` and the CLI.
    #[inline]
    pub async fn status(&self) -> EngineStatus {
        let generation = self.store.current().await;
        EngineStatus {
            index_loaded: generation.is_some(),
            generation: generation.as_ref().map(|g| g.id),
            documents: generation.as_ref().map_or(0, |g| g.document_count()),
            dimension: generation.as_ref().map_or(0, |g| g.dimension()),
            embedding_model: self.embedder.model().to_string(),
            generation_model: self.generator.model().to_string(),
            sessions: self.sessions.session_count().await,
        }
    }
}

/// First [`SNIPPET_CHARS`] characters of a body for source listings, with a
/// trailing ellipsis when the body was longer.
fn snippet(body: &str) -> String {
    if body.chars().count() <= SNIPPET_CHARS {
        return body.to_string();
    }
    let mut snippet: String = body.chars().take(SNIPPET_CHARS).collect();
    snippet.push_str("...");
    snippet
}
