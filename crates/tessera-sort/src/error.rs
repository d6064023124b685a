//! Error types for sorting.

use tessera_runtime::RuntimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SortError {
    /// Bitonic networks only handle lengths that are a power of two.
    #[error("array length {len} is not a power of two")]
    Size { len: usize },

    /// The output is out of order at `index`/`index + 1`.
    #[error("array is not sorted at index {index}")]
    Unsorted { index: usize },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl SortError {
    /// Taxonomy name of this error.
    pub fn kind(&self) -> &'static str {
        match self {
            SortError::Size { .. } => "SizeError",
            SortError::Unsorted { .. } => "UnsortedError",
            SortError::Runtime(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SortError>;
