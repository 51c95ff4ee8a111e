use cardgraph_core::error::{CardgraphError, ErrorCode};
use graph::{GraphError, RenderError};
use storage::{RepoError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("no card is being practiced")]
    NoCurrentCard,
}

impl CardgraphError for SdkError {
    fn error_code(&self) -> ErrorCode {
        match self {
            SdkError::Store(err) => err.error_code(),
            SdkError::Repo(err) => err.error_code(),
            SdkError::Graph(err) => err.error_code(),
            SdkError::Render(err) => err.error_code(),
            SdkError::NoCurrentCard => ErrorCode::FailedPrecondition,
        }
    }
}
