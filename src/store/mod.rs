#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::index::FlatIndex;
use crate::{RagError, Result};

const CURRENT_POINTER: &str = "CURRENT";
const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.bin";
const DOCUMENTS_FILE: &str = "documents.json";

/// One email record from the collector.
///
/// Immutable once ingested; identified solely by its ordinal position within
/// the batch it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub body: String,
}

impl Document {
    /// Composite text fed to the embedder, keeping header fields in the
    /// vector alongside the body.
    #[inline]
    pub fn embedding_text(&self) -> String {
        format!(
            "Subject: {}\nFrom: {}\nDate: {}\n\n{}",
            self.subject, self.sender, self.date, self.body
        )
    }
}

/// One retrieved document with its distance to the query, transient per query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub document: Document,
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    generation_id: Uuid,
    created_at: DateTime<Utc>,
    document_count: usize,
    dimension: usize,
    embedding_model: String,
}

/// One immutable published index generation: the vector table plus the
/// ordinal-aligned document records it was built from.
#[derive(Debug)]
pub struct IndexGeneration {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub embedding_model: String,
    pub index: FlatIndex,
    pub documents: Vec<Document>,
}

impl IndexGeneration {
    /// The document behind an ordinal produced by a search against this
    /// generation.
    #[inline]
    pub fn document(&self, ordinal: usize) -> Option<&Document> {
        self.documents.get(ordinal)
    }

    #[inline]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }
}

/// Persistent home of index generations.
///
/// Layout under the store root:
///
/// ```text
/// <root>/CURRENT                  id of the published generation
/// <root>/gen-<uuid>/manifest.json
/// <root>/gen-<uuid>/vectors.bin
/// <root>/gen-<uuid>/documents.json
/// ```
///
/// A build writes a complete new generation directory and then swaps the
/// `CURRENT` pointer via an atomic rename; queries hold an `Arc` to one
/// generation for their whole lifetime, so a publish mid-request never
/// changes what an in-flight query sees.
pub struct IndexStore {
    root: PathBuf,
    current: RwLock<Option<Arc<IndexGeneration>>>,
}

impl IndexStore {
    /// Open a store rooted at `root`, loading the published generation if one
    /// exists. Missing or unreadable state yields an unloaded store, never an
    /// error, so callers can prompt for a rebuild.
    #[inline]
    pub async fn open<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let current = load_current(&root).await;
        Self {
            root,
            current: RwLock::new(current),
        }
    }

    /// The currently published generation, if any. `None` means unloaded.
    #[inline]
    pub async fn current(&self) -> Option<Arc<IndexGeneration>> {
        self.current.read().await.clone()
    }

    /// Write a new generation and atomically publish it.
    ///
    /// The documents must be ordinal-aligned with the index. The pointer swap
    /// is the only step a concurrent reader can observe; prior generations
    /// are pruned best-effort after the swap.
    #[inline]
    pub async fn publish(
        &self,
        index: FlatIndex,
        documents: Vec<Document>,
        embedding_model: &str,
    ) -> Result<Arc<IndexGeneration>> {
        if documents.len() != index.len() {
            return Err(RagError::Index(format!(
                "Refusing to publish: {} documents but {} vectors",
                documents.len(),
                index.len()
            )));
        }

        // Serializes concurrent publishers and makes the handle swap atomic
        // with the pointer rename.
        let mut guard = self.current.write().await;

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let dir = self.generation_dir(id);
        fs::create_dir_all(&dir).await.map_err(|e| {
            RagError::Index(format!(
                "Failed to create generation directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let manifest = Manifest {
            generation_id: id,
            created_at,
            document_count: documents.len(),
            dimension: index.dimension(),
            embedding_model: embedding_model.to_string(),
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| RagError::Index(format!("Failed to serialize manifest: {}", e)))?;
        persist(&dir.join(MANIFEST_FILE), &manifest_bytes).await?;
        persist(&dir.join(VECTORS_FILE), &index.encode()).await?;
        let document_bytes = serde_json::to_vec(&documents)
            .map_err(|e| RagError::Index(format!("Failed to serialize documents: {}", e)))?;
        persist(&dir.join(DOCUMENTS_FILE), &document_bytes).await?;

        let pointer = self.root.join(CURRENT_POINTER);
        let pointer_tmp = self.root.join(format!("{}.tmp", CURRENT_POINTER));
        persist(&pointer_tmp, id.to_string().as_bytes()).await?;
        fs::rename(&pointer_tmp, &pointer).await.map_err(|e| {
            RagError::Index(format!(
                "Failed to publish index pointer {}: {}",
                pointer.display(),
                e
            ))
        })?;

        let generation = Arc::new(IndexGeneration {
            id,
            created_at,
            embedding_model: embedding_model.to_string(),
            index,
            documents,
        });
        if let Some(retired) = guard.replace(Arc::clone(&generation)) {
            debug!("Retired index generation {}", retired.id);
        }
        self.prune_retired(id).await;
        drop(guard);

        info!(
            "Published index generation {} ({} documents, dimension {})",
            id,
            generation.document_count(),
            generation.dimension()
        );
        Ok(generation)
    }

    fn generation_dir(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("gen-{}", id))
    }

    /// Remove generation directories other than `keep`. Failures only warn;
    /// a leftover directory is unreferenced and harmless.
    async fn prune_retired(&self, keep: Uuid) {
        let keep_name = format!("gen-{}", keep);
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    "Could not scan {} for retired generations: {}",
                    self.root.display(),
                    err
                );
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with("gen-") || name == keep_name {
                continue;
            }
            match fs::remove_dir_all(entry.path()).await {
                Ok(()) => debug!("Pruned retired generation directory {}", name),
                Err(err) => warn!("Could not prune retired generation {}: {}", name, err),
            }
        }
    }
}

/// Write `bytes` to `path` and flush them to disk before returning.
async fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
    let result = async {
        let mut file = fs::File::create(path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok::<(), std::io::Error>(())
    }
    .await;

    result.map_err(|e| RagError::Index(format!("Failed to write {}: {}", path.display(), e)))
}

async fn load_current(root: &Path) -> Option<Arc<IndexGeneration>> {
    let pointer = root.join(CURRENT_POINTER);
    let raw = match fs::read_to_string(&pointer).await {
        Ok(raw) => raw,
        Err(_) => {
            debug!("No published index under {}", root.display());
            return None;
        }
    };

    let id = match Uuid::parse_str(raw.trim()) {
        Ok(id) => id,
        Err(err) => {
            warn!(
                "Ignoring malformed index pointer {}: {}",
                pointer.display(),
                err
            );
            return None;
        }
    };

    match load_generation(root, id).await {
        Ok(generation) => {
            info!(
                "Loaded index generation {} ({} documents, dimension {})",
                id,
                generation.document_count(),
                generation.dimension()
            );
            Some(Arc::new(generation))
        }
        Err(err) => {
            warn!("Failed to load index generation {}: {}", id, err);
            None
        }
    }
}

async fn load_generation(root: &Path, id: Uuid) -> Result<IndexGeneration> {
    let dir = root.join(format!("gen-{}", id));

    let manifest_path = dir.join(MANIFEST_FILE);
    let manifest_bytes = fs::read(&manifest_path).await.map_err(|e| {
        RagError::Index(format!("Failed to read {}: {}", manifest_path.display(), e))
    })?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes).map_err(|e| {
        RagError::Index(format!("Failed to parse {}: {}", manifest_path.display(), e))
    })?;
    if manifest.generation_id != id {
        return Err(RagError::Index(format!(
            "Manifest in gen-{} names generation {}",
            id, manifest.generation_id
        )));
    }

    let vectors_path = dir.join(VECTORS_FILE);
    let blob = fs::read(&vectors_path).await.map_err(|e| {
        RagError::Index(format!("Failed to read {}: {}", vectors_path.display(), e))
    })?;
    let index = FlatIndex::decode(&blob)?;

    let documents_path = dir.join(DOCUMENTS_FILE);
    let document_bytes = fs::read(&documents_path).await.map_err(|e| {
        RagError::Index(format!("Failed to read {}: {}", documents_path.display(), e))
    })?;
    let documents: Vec<Document> = serde_json::from_slice(&document_bytes).map_err(|e| {
        RagError::Index(format!("Failed to parse {}: {}", documents_path.display(), e))
    })?;

    if documents.len() != index.len()
        || manifest.document_count != documents.len()
        || manifest.dimension != index.dimension()
    {
        return Err(RagError::Index(format!(
            "Generation {} is inconsistent: manifest says {} documents of dimension {}, \
             found {} documents and {} vectors of dimension {}",
            id,
            manifest.document_count,
            manifest.dimension,
            documents.len(),
            index.len(),
            index.dimension()
        )));
    }

    Ok(IndexGeneration {
        id,
        created_at: manifest.created_at,
        embedding_model: manifest.embedding_model,
        index,
        documents,
    })
}
