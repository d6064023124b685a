//! Matrix transpose and multiplication on the device.

use crate::error::{LinalgError, Result};
use crate::matrix::{Element, Matrix, check_multiply, check_square};
use tessera_runtime::{AccessMode, Buffer, Context, Program, Queue, Task};

/// WGSL source of `matrix_transpose`, `matrix_multiply` and `matrix_multiply_f32`.
pub const MATRIX_WGSL: &str = include_str!("../shaders/matrix.wgsl");

/// WGSL source of `inverse_pivot` and `inverse_eliminate`.
pub const INVERSE_WGSL: &str = include_str!("../shaders/inverse.wgsl");

/// Workgroups are `TILE x TILE`.
pub const TILE: u32 = 8;

/// Transpose `m` on the device.
#[tracing::instrument(skip_all, fields(rows = m.rows(), cols = m.cols()))]
pub fn transpose<T: Element>(ctx: &Context, m: &Matrix<T>) -> Result<Matrix<T>> {
    if m.as_slice().is_empty() {
        return Ok(Matrix::new(m.cols(), m.rows()));
    }
    let (rows, cols) = (extent(m.rows())?, extent(m.cols())?);

    let src = Buffer::from_vec(ctx, m.as_slice().to_vec(), AccessMode::ReadOnly)?;
    let dst = Buffer::<T>::new(ctx, m.as_slice().len(), AccessMode::WriteOnly)?;

    let program = Program::from_source(ctx, "matrix.wgsl", MATRIX_WGSL)?;
    let kernel = program.kernel("matrix_transpose")?;
    kernel.set_buffer(0, &src);
    kernel.set_buffer(2, &dst);
    kernel.set_scalar(3, &[rows, 0, cols, 0]);

    let mut queue = Queue::new(ctx);
    queue.enqueue(Task::write(&src));
    queue.enqueue(Task::execute(&kernel, (TILE, TILE), grid(cols, rows)));
    queue.enqueue(Task::read(&dst));
    queue.execute()?;
    drop(queue);

    Matrix::from_vec(m.cols(), m.rows(), dst.into_vec())
}

/// `lhs * rhs` on the device, using the kernel named by [`Element::MULTIPLY_ENTRY`].
///
/// # Errors
/// [`LinalgError::Size`] unless `lhs.cols() == rhs.rows()`.
#[tracing::instrument(skip_all, fields(lhs = ?(lhs.rows(), lhs.cols()), rhs = ?(rhs.rows(), rhs.cols())))]
pub fn multiply<T: Element>(ctx: &Context, lhs: &Matrix<T>, rhs: &Matrix<T>) -> Result<Matrix<T>> {
    check_multiply(lhs, rhs)?;
    if lhs.as_slice().is_empty() || rhs.as_slice().is_empty() {
        return Ok(Matrix::new(lhs.rows(), rhs.cols()));
    }
    let (rows, inner, cols) = (extent(lhs.rows())?, extent(lhs.cols())?, extent(rhs.cols())?);

    let a = Buffer::from_vec(ctx, lhs.as_slice().to_vec(), AccessMode::ReadOnly)?;
    let b = Buffer::from_vec(ctx, rhs.as_slice().to_vec(), AccessMode::ReadOnly)?;
    let c = Buffer::<T>::new(ctx, lhs.rows() * rhs.cols(), AccessMode::WriteOnly)?;

    let program = Program::from_source(ctx, "matrix.wgsl", MATRIX_WGSL)?;
    let kernel = program.kernel(T::MULTIPLY_ENTRY)?;
    kernel.set_buffer(0, &a);
    kernel.set_buffer(1, &b);
    kernel.set_buffer(2, &c);
    kernel.set_scalar(3, &[rows, cols, inner, 0]);

    let mut queue = Queue::new(ctx);
    queue.enqueue(Task::write(&a));
    queue.enqueue(Task::write(&b));
    queue.enqueue(Task::execute(&kernel, (TILE, TILE), grid(cols, rows)));
    queue.enqueue(Task::read(&c));
    queue.execute()?;
    drop(queue);

    Matrix::from_vec(lhs.rows(), rhs.cols(), c.into_vec())
}

/// Invert `m` on the device by Gauss-Jordan elimination with partial pivoting.
///
/// Each column is one round of tasks: pick and normalise the pivot row,
/// eliminate the column from every other row, read back the status flag.
///
/// # Errors
/// [`LinalgError::Size`] unless `m` is square, [`LinalgError::Singular`] if a
/// column has no pivot larger than the elimination tolerance.
#[tracing::instrument(skip_all, fields(n = m.rows()))]
pub fn inverse(ctx: &Context, m: &Matrix<f32>) -> Result<Matrix<f32>> {
    check_square(m)?;
    if m.as_slice().is_empty() {
        return Ok(Matrix::new(0, 0));
    }
    let n = extent(m.rows())?;

    let a = Buffer::from_vec(ctx, m.as_slice().to_vec(), AccessMode::ReadWrite)?;
    let inv = Buffer::from_vec(
        ctx,
        Matrix::<f32>::identity(m.rows()).into_vec(),
        AccessMode::ReadWrite,
    )?;
    let status = Buffer::from_vec(ctx, vec![0u32], AccessMode::ReadWrite)?;

    let program = Program::from_source(ctx, "inverse.wgsl", INVERSE_WGSL)?;
    let pivot = program.kernel("inverse_pivot")?;
    let eliminate = program.kernel("inverse_eliminate")?;
    for kernel in [&pivot, &eliminate] {
        kernel.set_buffer(0, &a);
        kernel.set_buffer(1, &inv);
        kernel.set_buffer(2, &status);
    }

    let mut queue = Queue::new(ctx);
    queue.enqueue(Task::write(&a));
    queue.enqueue(Task::write(&inv));
    queue.enqueue(Task::write(&status));

    for column in 0..n {
        pivot.set_scalar(3, &[n, column, 0, 0]);
        eliminate.set_scalar(3, &[n, column, 0, 0]);
        queue.enqueue(Task::execute(&pivot, 1u32, 1u32));
        queue.enqueue(Task::execute(&eliminate, TILE, n.next_multiple_of(TILE)));
        queue.enqueue(Task::read(&status));
        queue.execute()?;

        if status.get(0)? != 0 {
            tracing::debug!(column, "no pivot, matrix is singular");
            return Err(LinalgError::Singular {
                column: column as usize,
            });
        }
    }

    queue.enqueue(Task::read(&inv));
    queue.execute()?;
    drop(queue);

    Matrix::from_vec(m.rows(), m.cols(), inv.into_vec())
}

fn extent(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| LinalgError::Size(format!("dimension {n} is too large")))
}

/// Global range covering `cols x rows`, rounded up to whole tiles.
fn grid(cols: u32, rows: u32) -> (u32, u32) {
    (cols.next_multiple_of(TILE), rows.next_multiple_of(TILE))
}
