//! Error types for vector and matrix operations.

use tessera_runtime::RuntimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinalgError {
    /// Operand shapes are incompatible.
    #[error("size error: {0}")]
    Size(String),

    /// Elimination found no usable pivot in `column`.
    #[error("matrix is singular: no pivot in column {column}")]
    Singular { column: usize },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl LinalgError {
    /// Taxonomy name of this error.
    pub fn kind(&self) -> &'static str {
        match self {
            LinalgError::Size(_) => "SizeError",
            LinalgError::Singular { .. } => "SingularError",
            LinalgError::Runtime(e) => e.kind(),
        }
    }

    pub(crate) fn out_of_range(what: &'static str, index: usize, bound: usize) -> Self {
        LinalgError::Runtime(RuntimeError::OutOfRange { what, index, bound })
    }
}

pub type Result<T> = std::result::Result<T, LinalgError>;
