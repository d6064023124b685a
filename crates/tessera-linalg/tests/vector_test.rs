//! Device vector add/diff against host arithmetic.

mod common;

use common::{random_ints, try_context};
use tessera_linalg::{LinalgError, vector};

#[test]
fn test_add_and_diff() {
    let Some(ctx) = try_context() else { return };

    for len in [1, 63, 64, 1000, 1024] {
        let a = random_ints(len, 100, len as u64);
        let b = random_ints(len, 100, len as u64 + 1);

        let sum = vector::add(&ctx, &a, &b).unwrap();
        let expected: Vec<i32> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        assert_eq!(sum, expected, "add, len = {len}");

        let difference = vector::diff(&ctx, &a, &b).unwrap();
        let expected: Vec<i32> = a.iter().zip(&b).map(|(x, y)| x - y).collect();
        assert_eq!(difference, expected, "diff, len = {len}");
    }
}

#[test]
fn test_length_mismatch() {
    let Some(ctx) = try_context() else { return };

    let err = vector::add(&ctx, &[1, 2, 3], &[1, 2]).unwrap_err();
    assert!(matches!(err, LinalgError::Size(_)));
}

#[test]
fn test_empty_vectors() {
    let Some(ctx) = try_context() else { return };

    assert!(vector::diff(&ctx, &[], &[]).unwrap().is_empty());
}
