//! Directory-backed store of embedding sources.
//!
//! Each file in the directory is one source collection (a flashcard category
//! run, a topic batch, ...). Loading merges every source in file-name order:
//! later sources overwrite earlier ones on id collision, and each id is tagged
//! with the 1-based group of the source it was last loaded from.

use cardgraph_core::error::{CardgraphError, ErrorCode};
use cardgraph_core::model::{EmbeddingRecord, GroupAssignment, ItemId};
use rkyv::{AlignedVec, Archive, Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

pub const RKYV_EXTENSION: &str = "rkyv";
pub const JSON_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("embedding store unavailable at {path}: {reason}")]
    Unavailable {
        path: PathBuf,
        reason: String,
        missing: bool,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error")]
    Serialization,
    #[error("invalid source name: {0:?}")]
    InvalidSourceName(String),
}

impl CardgraphError for StoreError {
    fn error_code(&self) -> ErrorCode {
        match self {
            StoreError::Unavailable { missing: true, .. } => ErrorCode::NotFound,
            StoreError::Unavailable { .. } => ErrorCode::Internal,
            StoreError::Io(_) => ErrorCode::Internal,
            StoreError::Serialization => ErrorCode::Internal,
            StoreError::InvalidSourceName(_) => ErrorCode::InvalidArgument,
        }
    }
}

impl StoreError {
    fn unavailable(path: &Path, reason: impl ToString) -> Self {
        StoreError::Unavailable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
            missing: false,
        }
    }
}

/// On-disk layout of a `.rkyv` source.
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct EmbeddingSource {
    pub name: String,
    pub records: Vec<EmbeddingRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedEmbeddings {
    pub records: Vec<EmbeddingRecord>,
    pub groups: GroupAssignment,
    /// Source names in load order; group `n` is `sources[n - 1]`.
    pub sources: Vec<String>,
}

impl LoadedEmbeddings {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn merge_source(
        &mut self,
        index: &mut HashMap<ItemId, usize>,
        name: String,
        records: Vec<EmbeddingRecord>,
    ) {
        self.sources.push(name);
        let group = self.sources.len() as u32;

        for record in records {
            self.groups.assign(record.id.clone(), group);
            match index.get(&record.id) {
                Some(&pos) => self.records[pos].vector = record.vector,
                None => {
                    index.insert(record.id.clone(), self.records.len());
                    self.records.push(record);
                }
            }
        }
    }
}

pub struct EmbeddingStore {
    dir: PathBuf,
}

impl EmbeddingStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Source files in load order (lexicographic by file name).
    pub async fn list_sources(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::Unavailable {
                    path: self.dir.clone(),
                    reason: "directory does not exist".to_string(),
                    missing: true,
                });
            }
            Err(err) => return Err(StoreError::unavailable(&self.dir, err)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| StoreError::unavailable(&self.dir, err))?
        {
            let path = entry.path();
            if !is_source_name(&path) {
                continue;
            }
            let file_type = entry
                .file_type()
                .await
                .map_err(|err| StoreError::unavailable(&path, err))?;
            // Symlinks count when their target is a regular file.
            let is_file = if file_type.is_symlink() {
                fs::metadata(&path).await.is_ok_and(|meta| meta.is_file())
            } else {
                file_type.is_file()
            };
            if is_file {
                paths.push(path);
            }
        }

        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }

    pub async fn load_all(&self) -> Result<LoadedEmbeddings, StoreError> {
        let mut loaded = LoadedEmbeddings::default();
        let mut index = HashMap::new();

        for path in self.list_sources().await? {
            let records = read_source(&path).await?;
            let name = source_name(&path);
            tracing::debug!(source = %name, records = records.len(), "loaded embedding source");
            loaded.merge_source(&mut index, name, records);
        }

        tracing::info!(
            sources = loaded.sources.len(),
            records = loaded.records.len(),
            "embedding store loaded"
        );
        Ok(loaded)
    }

    /// Like [`EmbeddingStore::load_all`], but an unavailable store reads as
    /// "no embeddings".
    pub async fn load_all_or_empty(&self) -> LoadedEmbeddings {
        match self.load_all().await {
            Ok(loaded) => loaded,
            Err(err) => {
                tracing::warn!(dir = %self.dir.display(), error = %err, "no embeddings available");
                LoadedEmbeddings::default()
            }
        }
    }

    /// Writes one source as `<name>.rkyv`, replacing any previous version.
    /// The file is written to a temp path and renamed into place.
    pub async fn write_source(
        &self,
        name: &str,
        records: Vec<EmbeddingRecord>,
    ) -> Result<PathBuf, StoreError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StoreError::InvalidSourceName(name.to_string()));
        }

        fs::create_dir_all(&self.dir).await?;

        let source = EmbeddingSource {
            name: name.to_string(),
            records,
        };
        let bytes = rkyv::to_bytes::<_, 4096>(&source).map_err(|_| StoreError::Serialization)?;

        let path = self.dir.join(format!("{name}.{RKYV_EXTENSION}"));
        let tmp_path = self.dir.join(format!(".{name}.tmp"));
        fs::write(&tmp_path, &bytes[..]).await?;
        fs::rename(&tmp_path, &path).await?;

        tracing::info!(source = %name, records = source.records.len(), "embedding source written");
        Ok(path)
    }
}

fn is_source_name(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('.'));
    if hidden {
        return false;
    }
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(RKYV_EXTENSION) | Some(JSON_EXTENSION)
    )
}

fn source_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

async fn read_source(path: &Path) -> Result<Vec<EmbeddingRecord>, StoreError> {
    let bytes = fs::read(path)
        .await
        .map_err(|err| StoreError::unavailable(path, err))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some(JSON_EXTENSION) => serde_json::from_slice::<Vec<EmbeddingRecord>>(&bytes)
            .map_err(|err| StoreError::unavailable(path, err)),
        _ => {
            let mut aligned = AlignedVec::with_capacity(bytes.len());
            aligned.extend_from_slice(&bytes);
            let archived = rkyv::check_archived_root::<EmbeddingSource>(&aligned[..])
                .map_err(|err| StoreError::unavailable(path, format!("corrupt archive: {err}")))?;
            let source: EmbeddingSource = archived
                .deserialize(&mut rkyv::Infallible)
                .unwrap_or_else(|never| match never {});
            Ok(source.records)
        }
    }
}
