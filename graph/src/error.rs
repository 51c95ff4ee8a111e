use cardgraph_core::error::{CardgraphError, ErrorCode};
use cardgraph_core::model::ItemId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("vector for {id} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        id: ItemId,
        expected: usize,
        actual: usize,
    },
    #[error("similarity threshold must be finite, got {0}")]
    InvalidThreshold(f64),
    #[error("invalid size range [{min}, {max}]")]
    InvalidSizeRange { min: f64, max: f64 },
    #[error("invalid centrality parameters: {0}")]
    InvalidRankerConfig(String),
}

impl CardgraphError for GraphError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::InvalidArgument
    }
}
