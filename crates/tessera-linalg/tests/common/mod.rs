//! Shared helpers for linalg integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessera_linalg::Matrix;
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

pub fn random_ints(len: usize, range: i32, seed: u64) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(-range..range)).collect()
}

pub fn random_int_matrix(rows: usize, cols: usize, seed: u64) -> Matrix<i32> {
    Matrix::from_vec(rows, cols, random_ints(rows * cols, 10, seed)).unwrap()
}

pub fn random_float_matrix(rows: usize, cols: usize, seed: u64) -> Matrix<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..rows * cols).map(|_| rng.random_range(-1.0..1.0)).collect();
    Matrix::from_vec(rows, cols, data).unwrap()
}

/// Random `n x n` matrix with a dominant diagonal, so it is well conditioned.
pub fn invertible_matrix(n: usize, seed: u64) -> Matrix<f32> {
    let mut m = random_float_matrix(n, n, seed);
    for i in 0..n {
        let v = m.get(i, i).unwrap();
        m.set(i, i, v + n as f32).unwrap();
    }
    m
}
