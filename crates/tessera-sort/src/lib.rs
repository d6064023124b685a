//! Bitonic sorting network on top of `tessera-runtime`.
//!
//! A bitonic network sorts `N = 2^k` elements in `k(k+1)/2` passes of `N/2`
//! independent compare-exchanges. [`BitonicSorter`] runs the passes either as
//! compute dispatches or directly on the host; both follow the same schedule
//! and produce the same output.
//!
//! # Example
//!
//! ```no_run
//! use tessera_runtime::{Context, ContextConfig};
//! use tessera_sort::{BitonicSorter, ExecTarget, SortDirection, check_sorted};
//!
//! fn main() -> anyhow::Result<()> {
//!     let ctx = Context::new(&ContextConfig::default())?;
//!     let mut data = vec![5, 3, 8, 1, 9, 2, 7, 4];
//!
//!     BitonicSorter::new().sort(&mut data, SortDirection::Ascending, ExecTarget::Device(&ctx))?;
//!     check_sorted(&data, SortDirection::Ascending)?;
//!     Ok(())
//! }
//! ```

mod check;
mod error;
pub mod network;
mod sorter;

pub use check::check_sorted;
pub use error::{Result, SortError};
pub use network::SortDirection;
pub use sorter::{BITONIC_SORT_WGSL, BitonicSorter, DEFAULT_MAX_LOCAL_SIZE, ExecTarget, KernelSource};
