//! Persisted embedding index.
//!
//! An [`EmbeddingIndex`] holds every chunk of the corpus together with its
//! unit-length embedding and answers nearest-neighbour queries by dot
//! product. It is built once, written to a directory as two JSON files, and
//! reloaded on later starts without re-embedding:
//!
//! - `chunks.json`: the chunks, embeddings included, in build order
//! - `manifest.json`: format version, embedding model identity, dimensions,
//!   chunk count, and a fingerprint of the chunk texts
//!
//! The manifest is written last and checked first. Loading through a
//! provider whose [`model_id`](EmbeddingProvider::model_id) differs from the
//! recorded one fails with [`RagError::IndexUnavailableError`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::document::{Chunk, SearchResult};
use crate::embedding::{EmbeddingProvider, dot};
use crate::error::{RagError, Result};

/// Version of the on-disk layout written by [`EmbeddingIndex::persist`].
pub const INDEX_FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const CHUNKS_FILE: &str = "chunks.json";

/// Metadata describing how an index was built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    /// On-disk layout version.
    pub format_version: u32,
    /// Identity of the embedding model used for every stored vector.
    pub model_id: String,
    /// Width of every stored vector.
    pub dimensions: usize,
    /// Number of stored chunks.
    pub chunk_count: usize,
    /// SHA-256 over the ids and texts of all chunks, in order.
    pub fingerprint: String,
    /// When the index was built.
    pub built_at: DateTime<Utc>,
}

/// Compute the fingerprint recorded in [`IndexManifest::fingerprint`].
pub fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(chunk.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// An immutable collection of embedded chunks searchable by cosine similarity.
pub struct EmbeddingIndex {
    manifest: IndexManifest,
    chunks: Vec<Chunk>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("manifest", &self.manifest)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

impl EmbeddingIndex {
    /// Embed every chunk and build an in-memory index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the provider fails or returns
    /// vectors of the wrong count or width.
    pub async fn build(
        mut chunks: Vec<Chunk>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let model_id = provider.model_id();
        let dimensions = provider.dimensions();

        if !chunks.is_empty() {
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            let embeddings = provider.embed_batch(&texts).await.map_err(|e| {
                error!(model = %model_id, error = %e, "embedding failed during index build");
                e
            })?;

            if embeddings.len() != chunks.len() {
                return Err(RagError::EmbeddingError {
                    provider: model_id,
                    message: format!(
                        "expected {} embeddings, got {}",
                        chunks.len(),
                        embeddings.len()
                    ),
                });
            }

            for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
                if embedding.len() != dimensions {
                    return Err(RagError::EmbeddingError {
                        provider: model_id,
                        message: format!(
                            "chunk '{}' embedded to {} dimensions, expected {dimensions}",
                            chunk.id,
                            embedding.len()
                        ),
                    });
                }
                chunk.embedding = embedding;
            }
        }

        let manifest = IndexManifest {
            format_version: INDEX_FORMAT_VERSION,
            model_id,
            dimensions,
            chunk_count: chunks.len(),
            fingerprint: fingerprint(&chunks),
            built_at: Utc::now(),
        };
        info!(chunk_count = manifest.chunk_count, model = %manifest.model_id, "built index");

        Ok(Self { manifest, chunks, provider })
    }

    /// Write the index to `dir`, creating it if needed.
    ///
    /// Each file is written to a temporary sibling and renamed into place;
    /// the manifest goes last.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexUnavailableError`] if the directory or files
    /// cannot be written.
    pub async fn persist(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let location = dir.display().to_string();
        let storage_err = |e: std::io::Error| {
            error!(index_dir = %location, error = %e, "failed to persist index");
            RagError::index_unavailable(&location, format!("cannot write index: {e}"))
        };

        tokio::fs::create_dir_all(dir).await.map_err(storage_err)?;

        let chunks = serde_json::to_vec(&self.chunks)
            .map_err(|e| RagError::index_unavailable(&location, e.to_string()))?;
        write_replace(&dir.join(CHUNKS_FILE), &chunks).await.map_err(storage_err)?;

        let manifest = serde_json::to_vec_pretty(&self.manifest)
            .map_err(|e| RagError::index_unavailable(&location, e.to_string()))?;
        write_replace(&dir.join(MANIFEST_FILE), &manifest).await.map_err(storage_err)?;

        info!(index_dir = %location, chunk_count = self.chunks.len(), "persisted index");
        Ok(())
    }

    /// Load a persisted index from `dir`, validating it against `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexUnavailableError`] if either file is missing
    /// or unparseable, the format version is unknown, the recorded model
    /// identity or dimensions differ from `provider`, or the stored chunks
    /// disagree with the manifest.
    pub async fn load(dir: impl AsRef<Path>, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let dir = dir.as_ref();
        let location = dir.display().to_string();

        let manifest: IndexManifest = read_json(&dir.join(MANIFEST_FILE), &location).await?;
        if manifest.format_version != INDEX_FORMAT_VERSION {
            return Err(RagError::index_unavailable(
                &location,
                format!(
                    "unsupported index format version {} (expected {INDEX_FORMAT_VERSION})",
                    manifest.format_version
                ),
            ));
        }

        let model_id = provider.model_id();
        if manifest.model_id != model_id {
            warn!(index_dir = %location, stored = %manifest.model_id, current = %model_id, "embedding model mismatch");
            return Err(RagError::index_unavailable(
                &location,
                format!(
                    "index was built with embedding model '{}' but '{model_id}' is configured; rebuild the index",
                    manifest.model_id
                ),
            ));
        }
        if manifest.dimensions != provider.dimensions() {
            return Err(RagError::index_unavailable(
                &location,
                format!(
                    "index stores {}-dimensional vectors but provider produces {}",
                    manifest.dimensions,
                    provider.dimensions()
                ),
            ));
        }

        let chunks: Vec<Chunk> = read_json(&dir.join(CHUNKS_FILE), &location).await?;
        if chunks.len() != manifest.chunk_count {
            return Err(RagError::index_unavailable(
                &location,
                format!("manifest lists {} chunks, found {}", manifest.chunk_count, chunks.len()),
            ));
        }
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != manifest.dimensions) {
            return Err(RagError::index_unavailable(
                &location,
                format!("chunk '{}' has a {}-dimensional embedding", bad.id, bad.embedding.len()),
            ));
        }
        if fingerprint(&chunks) != manifest.fingerprint {
            return Err(RagError::index_unavailable(&location, "chunk fingerprint mismatch"));
        }

        info!(index_dir = %location, chunk_count = chunks.len(), model = %model_id, "loaded index");
        Ok(Self { manifest, chunks, provider })
    }

    /// Reuse the index stored in `dir` or build and persist a fresh one.
    ///
    /// A stored index is reused unless `rebuild` is set or it cannot be
    /// loaded. A stored index whose fingerprint differs from `chunks` is
    /// still reused; corpus changes require an explicit rebuild.
    ///
    /// # Errors
    ///
    /// Propagates embedding failures from [`build`](EmbeddingIndex::build)
    /// and storage failures from [`persist`](EmbeddingIndex::persist).
    pub async fn open_or_build(
        dir: impl AsRef<Path>,
        chunks: Vec<Chunk>,
        provider: Arc<dyn EmbeddingProvider>,
        rebuild: bool,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        if !rebuild {
            match Self::load(dir, provider.clone()).await {
                Ok(index) => {
                    if index.manifest.fingerprint != fingerprint(&chunks) {
                        warn!(
                            index_dir = %dir.display(),
                            "stored index differs from the current corpus; run with --rebuild to refresh it"
                        );
                    }
                    return Ok(index);
                }
                Err(e) => info!(index_dir = %dir.display(), reason = %e, "building a new index"),
            }
        }

        let index = Self::build(chunks, provider).await?;
        index.persist(dir).await?;
        Ok(index)
    }

    /// Return the `k` chunks most similar to `text`, best first.
    ///
    /// Equal scores keep build order, so identical inputs always rank
    /// identically. An empty index returns no results without embedding.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the query cannot be embedded.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.provider.embed(text).await?;
        if query_embedding.len() != self.manifest.dimensions {
            return Err(RagError::EmbeddingError {
                provider: self.manifest.model_id.clone(),
                message: format!(
                    "query embedded to {} dimensions, expected {}",
                    query_embedding.len(),
                    self.manifest.dimensions
                ),
            });
        }

        let mut scored: Vec<SearchResult> = self
            .chunks
            .iter()
            .map(|chunk| SearchResult {
                chunk: chunk.clone(),
                score: dot(&chunk.embedding, &query_embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        debug!(top_k = k, result_count = scored.len(), "index query");
        Ok(scored)
    }

    /// Build metadata for this index.
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// All stored chunks in build order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

async fn write_replace(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = PathBuf::from(path);
    tmp.set_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path, dir: &str) -> Result<T> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        RagError::index_unavailable(dir, format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        RagError::index_unavailable(dir, format!("corrupted {}: {e}", path.display()))
    })
}

/// Single-initialisation slot for a shared [`EmbeddingIndex`].
///
/// Readers never observe a partially built index: [`get`](IndexHandle::get)
/// returns `None` until the build passed to
/// [`get_or_try_init`](IndexHandle::get_or_try_init) has completed, and
/// concurrent initialisers share one build.
#[derive(Debug, Default)]
pub struct IndexHandle {
    cell: OnceCell<Arc<EmbeddingIndex>>,
}

impl IndexHandle {
    /// Create an empty, not-yet-ready handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the index has finished building.
    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    /// The index, once ready.
    pub fn get(&self) -> Option<Arc<EmbeddingIndex>> {
        self.cell.get().cloned()
    }

    /// Return the index, running `init` first if no build has completed.
    ///
    /// A failed `init` leaves the handle empty so a later call can retry.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `init`.
    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<Arc<EmbeddingIndex>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<EmbeddingIndex>>,
    {
        self.cell.get_or_try_init(|| async { init().await.map(Arc::new) }).await.cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashingEmbeddingProvider;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            embedding: Vec::new(),
            document_id: id.to_string(),
            chunk_index: 0,
            start_char: 0,
        }
    }

    fn provider(dims: usize) -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashingEmbeddingProvider::new(dims).unwrap())
    }

    #[tokio::test]
    async fn build_attaches_unit_embeddings() {
        let index = EmbeddingIndex::build(
            vec![chunk("a", "admission requirements"), chunk("b", "tuition fees")],
            provider(64),
        )
        .await
        .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.manifest().model_id, "hashing-fnv1a-v1/64");
        for c in index.chunks() {
            assert_eq!(c.embedding.len(), 64);
            assert!((dot(&c.embedding, &c.embedding) - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn query_ranks_best_match_first() {
        let index = EmbeddingIndex::build(
            vec![
                chunk("fees", "Question: How much is tuition?\nAnswer: 4000 EUR per year."),
                chunk("admission", "Question: What are the admission requirements?\nAnswer: A diploma."),
            ],
            provider(512),
        )
        .await
        .unwrap();
        let results = index.query("admission requirements", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "admission");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn query_truncates_to_k() {
        let chunks = (0..10).map(|i| chunk(&format!("c{i}"), &format!("topic {i}"))).collect();
        let index = EmbeddingIndex::build(chunks, provider(64)).await.unwrap();
        assert_eq!(index.query("topic", 3).await.unwrap().len(), 3);
        assert!(index.query("topic", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_index_returns_nothing() {
        let index = EmbeddingIndex::build(Vec::new(), provider(64)).await.unwrap();
        assert!(index.is_empty());
        assert!(index.query("anything", 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index");
        let built = EmbeddingIndex::build(
            vec![chunk("a", "campus library hours"), chunk("b", "dormitory application")],
            provider(128),
        )
        .await
        .unwrap();
        built.persist(&path).await.unwrap();

        let loaded = EmbeddingIndex::load(&path, provider(128)).await.unwrap();
        assert_eq!(loaded.manifest(), built.manifest());
        assert_eq!(loaded.chunks(), built.chunks());

        let a = built.query("library", 2).await.unwrap();
        let b = loaded.query("library", 2).await.unwrap();
        assert_eq!(
            a.iter().map(|r| &r.chunk.id).collect::<Vec<_>>(),
            b.iter().map(|r| &r.chunk.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn load_rejects_other_model() {
        let dir = tempfile::tempdir().unwrap();
        EmbeddingIndex::build(vec![chunk("a", "text")], provider(128))
            .await
            .unwrap()
            .persist(dir.path())
            .await
            .unwrap();

        let err = EmbeddingIndex::load(dir.path(), provider(64)).await.unwrap_err();
        match err {
            RagError::IndexUnavailableError { message, .. } => {
                assert!(message.contains("hashing-fnv1a-v1/128"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn load_rejects_missing_and_corrupted_storage() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EmbeddingIndex::load(dir.path(), provider(64)).await,
            Err(RagError::IndexUnavailableError { .. })
        ));

        EmbeddingIndex::build(vec![chunk("a", "text")], provider(64))
            .await
            .unwrap()
            .persist(dir.path())
            .await
            .unwrap();
        std::fs::write(dir.path().join(CHUNKS_FILE), b"[{\"id\": ").unwrap();
        assert!(matches!(
            EmbeddingIndex::load(dir.path(), provider(64)).await,
            Err(RagError::IndexUnavailableError { .. })
        ));
    }

    #[tokio::test]
    async fn storage_errors_name_the_index_dir() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("stored");
        let err = EmbeddingIndex::load(&index_dir, provider(64)).await.unwrap_err();
        assert!(err.to_string().contains("stored"), "{err}");

        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let index = EmbeddingIndex::build(vec![chunk("a", "text")], provider(64)).await.unwrap();
        match index.persist(blocker.join("index")).await.unwrap_err() {
            RagError::IndexUnavailableError { path, .. } => assert!(path.ends_with("index")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn load_rejects_tampered_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let index =
            EmbeddingIndex::build(vec![chunk("a", "original text")], provider(64)).await.unwrap();
        index.persist(dir.path()).await.unwrap();

        let mut chunks = index.chunks().to_vec();
        chunks[0].text = "edited text".to_string();
        std::fs::write(dir.path().join(CHUNKS_FILE), serde_json::to_vec(&chunks).unwrap())
            .unwrap();
        let err = EmbeddingIndex::load(dir.path(), provider(64)).await.unwrap_err();
        assert!(err.to_string().contains("fingerprint"));
    }

    #[tokio::test]
    async fn open_or_build_reuses_stored_index() {
        let dir = tempfile::tempdir().unwrap();
        let first =
            EmbeddingIndex::open_or_build(dir.path(), vec![chunk("a", "one")], provider(64), false)
                .await
                .unwrap();
        // A different corpus is ignored until a rebuild is requested.
        let second =
            EmbeddingIndex::open_or_build(dir.path(), vec![chunk("b", "two")], provider(64), false)
                .await
                .unwrap();
        assert_eq!(second.chunks()[0].id, "a");
        assert_eq!(second.manifest().built_at, first.manifest().built_at);

        let rebuilt =
            EmbeddingIndex::open_or_build(dir.path(), vec![chunk("b", "two")], provider(64), true)
                .await
                .unwrap();
        assert_eq!(rebuilt.chunks()[0].id, "b");
    }

    #[tokio::test]
    async fn open_or_build_replaces_index_for_other_model() {
        let dir = tempfile::tempdir().unwrap();
        EmbeddingIndex::open_or_build(dir.path(), vec![chunk("a", "one")], provider(64), false)
            .await
            .unwrap();
        let index =
            EmbeddingIndex::open_or_build(dir.path(), vec![chunk("a", "one")], provider(32), false)
                .await
                .unwrap();
        assert_eq!(index.manifest().dimensions, 32);
        assert!(EmbeddingIndex::load(dir.path(), provider(32)).await.is_ok());
    }

    #[tokio::test]
    async fn handle_builds_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let handle = IndexHandle::new();
        let builds = AtomicUsize::new(0);
        assert!(!handle.is_ready());
        assert!(handle.get().is_none());

        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            EmbeddingIndex::build(vec![chunk("a", "one")], provider(16))
        };
        let first = handle.get_or_try_init(build).await.unwrap();
        assert!(handle.is_ready());

        let second = handle.get_or_try_init(build).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handle_stays_empty_after_failed_build() {
        let handle = IndexHandle::new();
        let err = handle
            .get_or_try_init(|| async { Err(RagError::index_unavailable("idx", "boom")) })
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::IndexUnavailableError { .. }));
        assert!(!handle.is_ready());
    }
}
