//! Shared helpers for sort integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessera_runtime::{Context, ContextConfig};

/// Build a context on the default platform, or `None` when the machine has
/// no usable adapter.
pub fn try_context() -> Option<Context> {
    match Context::new(&ContextConfig::default()) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("skipping: no compute device available ({e})");
            None
        }
    }
}

/// `len` integers in `0..10_000`, reproducible per `seed`.
pub fn random_array(len: usize, seed: u64) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(0..10_000)).collect()
}
