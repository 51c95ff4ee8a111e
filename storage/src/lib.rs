pub mod embedding_store;
pub mod repo;
pub mod wal;

pub use embedding_store::{EmbeddingStore, LoadedEmbeddings, StoreError};
pub use repo::{RepoError, Repository};
