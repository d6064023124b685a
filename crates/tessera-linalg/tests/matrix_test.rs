//! Device transpose/multiply against the host reference.

mod common;

use common::{invertible_matrix, random_float_matrix, random_int_matrix, try_context};
use tessera_linalg::{Element, LinalgError, Matrix, inverse, multiply, transpose};

#[test]
fn test_transpose_matches_host() {
    let Some(ctx) = try_context() else { return };

    for (rows, cols) in [(1, 1), (3, 5), (8, 8), (17, 64), (128, 33)] {
        let m = random_int_matrix(rows, cols, (rows * cols) as u64);
        let t = transpose(&ctx, &m).unwrap();
        assert_eq!(t, m.transpose_host(), "{rows}x{cols}");
    }
}

#[test]
fn test_transpose_floats_bit_for_bit() {
    let Some(ctx) = try_context() else { return };

    let m = random_float_matrix(20, 12, 3);
    assert_eq!(transpose(&ctx, &m).unwrap(), m.transpose_host());
}

#[test]
fn test_int_multiply_matches_host() {
    let Some(ctx) = try_context() else { return };

    for (m, n, p) in [(1, 1, 1), (2, 3, 2), (16, 16, 16), (31, 7, 45)] {
        let a = random_int_matrix(m, n, 1);
        let b = random_int_matrix(n, p, 2);
        let c = multiply(&ctx, &a, &b).unwrap();
        assert_eq!(c, a.multiply_host(&b).unwrap(), "{m}x{n} * {n}x{p}");
    }
}

#[test]
fn test_float_multiply_by_identity() {
    let Some(ctx) = try_context() else { return };

    let a = random_float_matrix(24, 24, 9);
    let c = multiply(&ctx, &a, &Matrix::identity(24)).unwrap();
    assert_eq!(c, a);
}

#[test]
fn test_float_multiply_close_to_host() {
    let Some(ctx) = try_context() else { return };

    let a = random_float_matrix(19, 40, 4);
    let b = random_float_matrix(40, 11, 5);
    let device = multiply(&ctx, &a, &b).unwrap();
    let host = a.multiply_host(&b).unwrap();

    for (d, h) in device.as_slice().iter().zip(host.as_slice()) {
        assert!(d.approx_eq(*h), "{d} vs {h}");
    }
}

#[test]
fn test_multiply_rejects_mismatched_shapes() {
    let Some(ctx) = try_context() else { return };

    let a = random_int_matrix(2, 3, 1);
    assert!(matches!(multiply(&ctx, &a, &a), Err(LinalgError::Size(_))));
}

#[test]
fn test_inverse_matches_host() {
    let Some(ctx) = try_context() else { return };

    for n in [1, 2, 7, 16, 33] {
        let m = invertible_matrix(n, n as u64);
        let device = inverse(&ctx, &m).unwrap();
        let host = m.inverse_host().unwrap();
        for (d, h) in device.as_slice().iter().zip(host.as_slice()) {
            assert!(d.approx_eq(*h), "{n}x{n}: {d} vs {h}");
        }

        // The product with the original is the identity, as the device computes it.
        let product = multiply(&ctx, &m, &device).unwrap();
        for (p, e) in product.as_slice().iter().zip(Matrix::<f32>::identity(n).as_slice()) {
            assert!(p.approx_eq(*e), "{n}x{n}: {p} vs {e}");
        }
    }
}

#[test]
fn test_inverse_needs_row_swaps() {
    let Some(ctx) = try_context() else { return };

    let m = Matrix::from_vec(2, 2, vec![0.0f32, 1.0, 1.0, 0.0]).unwrap();
    assert_eq!(inverse(&ctx, &m).unwrap(), m);
}

#[test]
fn test_inverse_reports_singular_column() {
    let Some(ctx) = try_context() else { return };

    let m = Matrix::from_vec(3, 3, vec![1.0f32, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 1.0, 1.0]).unwrap();
    let host = m.inverse_host().unwrap_err();
    let device = inverse(&ctx, &m).unwrap_err();
    assert_eq!(device.kind(), "SingularError");
    match (device, host) {
        (LinalgError::Singular { column: d }, LinalgError::Singular { column: h }) => assert_eq!(d, h),
        other => panic!("expected singular errors, got {other:?}"),
    }
}

#[test]
fn test_inverse_rejects_non_square() {
    let Some(ctx) = try_context() else { return };

    let m = random_float_matrix(3, 4, 1);
    assert!(matches!(inverse(&ctx, &m), Err(LinalgError::Size(_))));
    assert_eq!(inverse(&ctx, &Matrix::new(0, 0)).unwrap().rows(), 0);
}
