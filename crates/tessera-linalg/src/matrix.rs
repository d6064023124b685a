//! Row-major matrix container and host reference operations.

use crate::error::{LinalgError, Result};
use bytemuck::Pod;
use std::fmt;

/// Scalar types the matrix kernels understand. All of them are 32 bits wide.
pub trait Element: Pod + PartialEq + Default + fmt::Debug + fmt::Display {
    /// Entry point of `matrix.wgsl` that multiplies matrices of this type.
    const MULTIPLY_ENTRY: &'static str;

    const ONE: Self;

    /// `self + a * b`, wrapping for integers like the device does.
    fn mul_add(self, a: Self, b: Self) -> Self;

    /// Equality up to the rounding a device may introduce by reordering sums.
    fn approx_eq(self, other: Self) -> bool {
        self == other
    }
}

impl Element for i32 {
    const MULTIPLY_ENTRY: &'static str = "matrix_multiply";
    const ONE: Self = 1;

    fn mul_add(self, a: Self, b: Self) -> Self {
        self.wrapping_add(a.wrapping_mul(b))
    }
}

impl Element for f32 {
    const MULTIPLY_ENTRY: &'static str = "matrix_multiply_f32";
    const ONE: Self = 1.0;

    fn mul_add(self, a: Self, b: Self) -> Self {
        self + a * b
    }

    fn approx_eq(self, other: Self) -> bool {
        (self - other).abs() <= 1e-4 * self.abs().max(other.abs()).max(1.0)
    }
}

/// A `rows x cols` matrix stored row by row.
///
/// Every index is checked strictly: row `rows` and column `cols` are out of range.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T: Element> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Element> Matrix<T> {
    /// A zero-filled matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![T::default(); rows * cols],
        }
    }

    /// Wrap `data` as a `rows x cols` matrix.
    ///
    /// # Errors
    /// [`LinalgError::Size`] if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(LinalgError::Size(format!(
                "{} elements cannot form a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// `diag(1, ..., 1)` of size `n`.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::new(n, n);
        for i in 0..n {
            m.data[i * n + i] = T::ONE;
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        Ok(self.data[self.offset(row, col)?])
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let offset = self.offset(row, col)?;
        self.data[offset] = value;
        Ok(())
    }

    pub fn row(&self, row: usize) -> Result<&[T]> {
        self.check_row(row)?;
        Ok(&self.data[row * self.cols..(row + 1) * self.cols])
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) -> Result<()> {
        self.check_row(a)?;
        self.check_row(b)?;
        if a != b {
            let (lo, hi) = (a.min(b), a.max(b));
            let (head, tail) = self.data.split_at_mut(hi * self.cols);
            head[lo * self.cols..(lo + 1) * self.cols].swap_with_slice(&mut tail[..self.cols]);
        }
        Ok(())
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Transpose on the host.
    pub fn transpose_host(&self) -> Self {
        let mut out = Self::new(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.data[c * self.rows + r] = self.data[r * self.cols + c];
            }
        }
        out
    }

    /// `self * rhs` on the host.
    ///
    /// # Errors
    /// [`LinalgError::Size`] unless `self.cols() == rhs.rows()`.
    pub fn multiply_host(&self, rhs: &Self) -> Result<Self> {
        check_multiply(self, rhs)?;
        let mut out = Self::new(self.rows, rhs.cols);
        for r in 0..self.rows {
            for c in 0..rhs.cols {
                out.data[r * rhs.cols + c] = (0..self.cols).fold(T::default(), |acc, k| {
                    acc.mul_add(self.data[r * self.cols + k], rhs.data[k * rhs.cols + c])
                });
            }
        }
        Ok(out)
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.rows {
            return Err(LinalgError::out_of_range("row", row, self.rows));
        }
        Ok(())
    }

    fn offset(&self, row: usize, col: usize) -> Result<usize> {
        self.check_row(row)?;
        if col >= self.cols {
            return Err(LinalgError::out_of_range("column", col, self.cols));
        }
        Ok(row * self.cols + col)
    }
}

/// Pivots at or below this magnitude mark a matrix singular, on the host and
/// in `inverse.wgsl`.
pub const PIVOT_EPSILON: f32 = 1e-6;

impl Matrix<f32> {
    /// Invert on the host by Gauss-Jordan elimination with partial pivoting.
    ///
    /// # Errors
    /// [`LinalgError::Size`] unless the matrix is square,
    /// [`LinalgError::Singular`] naming the first column without a usable pivot.
    pub fn inverse_host(&self) -> Result<Self> {
        check_square(self)?;
        let n = self.rows;
        let mut a = self.clone();
        let mut inv = Self::identity(n);

        for c in 0..n {
            let mut pivot = c;
            for r in c + 1..n {
                if a.data[r * n + c].abs() > a.data[pivot * n + c].abs() {
                    pivot = r;
                }
            }
            if a.data[pivot * n + c].abs() <= PIVOT_EPSILON {
                return Err(LinalgError::Singular { column: c });
            }
            a.swap_rows(c, pivot)?;
            inv.swap_rows(c, pivot)?;

            let scale = 1.0 / a.data[c * n + c];
            for j in 0..n {
                a.data[c * n + j] *= scale;
                inv.data[c * n + j] *= scale;
            }

            for r in (0..n).filter(|&r| r != c) {
                let factor = a.data[r * n + c];
                for j in 0..n {
                    a.data[r * n + j] -= factor * a.data[c * n + j];
                    inv.data[r * n + j] -= factor * inv.data[c * n + j];
                }
            }
        }
        Ok(inv)
    }
}

pub(crate) fn check_square<T: Element>(m: &Matrix<T>) -> Result<()> {
    if !m.is_square() {
        return Err(LinalgError::Size(format!(
            "cannot invert a {}x{} matrix",
            m.rows, m.cols
        )));
    }
    Ok(())
}

pub(crate) fn check_multiply<T: Element>(lhs: &Matrix<T>, rhs: &Matrix<T>) -> Result<()> {
    if lhs.cols != rhs.rows {
        return Err(LinalgError::Size(format!(
            "cannot multiply {}x{} by {}x{}",
            lhs.rows, lhs.cols, rhs.rows, rhs.cols
        )));
    }
    Ok(())
}

impl<T: Element> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.data.chunks(self.cols.max(1)) {
            let line: Vec<String> = row.iter().map(ToString::to_string).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}
