//! Vector and matrix workloads, including Gauss-Jordan inversion, on top of `tessera-runtime`.
//!
//! Every operation has a host reference so device results can be checked
//! element for element.
//!
//! # Example
//!
//! ```no_run
//! use tessera_linalg::{Matrix, multiply};
//! use tessera_runtime::{Context, ContextConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let ctx = Context::new(&ContextConfig::default())?;
//!     let a = Matrix::from_vec(2, 3, vec![1, 2, 3, 4, 5, 6])?;
//!     let b = a.transpose_host();
//!
//!     let c = multiply(&ctx, &a, &b)?;
//!     assert_eq!(c, a.multiply_host(&b)?);
//!     Ok(())
//! }
//! ```

mod device;
mod error;
mod matrix;
pub mod vector;

pub use device::{INVERSE_WGSL, MATRIX_WGSL, TILE, inverse, multiply, transpose};
pub use error::{LinalgError, Result};
pub use matrix::{Element, Matrix, PIVOT_EPSILON};
