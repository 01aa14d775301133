use std::cell::Cell;
use std::fmt;

use bytes::BufMut;

use super::{merge, Storage};
use crate::index::MatrixMap;
use crate::range::Range;
use crate::{Item, MpError, ReduceOp, Result};

/// Row-major matrix storage: `rows * cols` cells, row `r` starting at
/// `r * cols`.
pub struct Matrix<'a, T> {
    cells: &'a [Cell<T>],
    rows: usize,
    cols: usize,
}

impl<T> Clone for Matrix<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Matrix<'_, T> {}

impl<T> fmt::Debug for Matrix<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

impl<'a, T> Matrix<'a, T> {
    /// View `storage` as a `rows x cols` matrix.
    pub fn new(storage: impl Into<Storage<'a, T>>, rows: usize, cols: usize) -> Result<Self> {
        let cells = storage.into().cells();
        if rows.checked_mul(cols) != Some(cells.len()) {
            return Err(MpError::ShapeMismatch {
                len: cells.len(),
                rows,
                cols,
            });
        }
        Ok(Self { cells, rows, cols })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub(crate) fn cells(&self) -> &'a [Cell<T>] {
        self.cells
    }
}

impl<'a, T: Copy> Matrix<'a, T> {
    /// # Panics
    /// If `(row, col)` lies outside the matrix.
    pub fn get(&self, row: usize, col: usize) -> T {
        assert!(row < self.rows && col < self.cols, "({row}, {col}) out of bounds");
        self.cells[row * self.cols + col].get()
    }
}

#[cfg(feature = "ndarray")]
impl<'a, T> Matrix<'a, T> {
    /// View a standard-layout `Array2` without copying; `None` when the
    /// array is not contiguous in row-major order.
    pub fn from_array2(array: &'a mut ndarray::Array2<T>) -> Option<Self> {
        let (rows, cols) = array.dim();
        let data = array.as_slice_mut()?;
        Some(Self {
            cells: Cell::from_mut(data).as_slice_of_cells(),
            rows,
            cols,
        })
    }
}

/// A row, column or patch of a [`Matrix`], visited row-major.
pub struct MatrixBuf<'a, T> {
    pub(crate) matrix: Matrix<'a, T>,
    pub(crate) rows: Range,
    pub(crate) cols: Range,
    pub(crate) map: MatrixMap,
}

impl<'a, T: Item> MatrixBuf<'a, T> {
    /// Both ranges must already be validated against the matrix shape.
    pub(crate) fn new(matrix: Matrix<'a, T>, rows: Range, cols: Range) -> Self {
        Self {
            matrix,
            rows,
            cols,
            map: MatrixMap::new(&rows, &cols, matrix.cols),
        }
    }

    #[inline]
    pub fn rows(&self) -> Range {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> Range {
        self.cols
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub(crate) fn cell(&self, i: usize) -> &'a Cell<T> {
        assert!(
            i < self.map.len(),
            "index {} out of bounds for buffer of length {}",
            i,
            self.map.len()
        );
        &self.matrix.cells[self.map.offset(i)]
    }

    /// Split logical `start..start + n` into per-row runs and hand each to
    /// `f` as (flat offset of the first cell, run length).
    #[inline]
    fn for_each_run(&self, start: usize, n: usize, mut f: impl FnMut(usize, usize)) {
        let end = start + n;
        let mut i = start;
        while i < end {
            let (r, c) = self.map.split(i);
            let run = (self.map.col_count - c).min(end - i);
            f(self.map.row_start(r) + c * self.map.col_stride, run);
            i += run;
        }
    }

    #[inline]
    fn dense_run(&self, first: usize, run: usize) -> &'a [Cell<T>] {
        &self.matrix.cells[first..first + run]
    }

    #[inline]
    fn strided_run(&self, first: usize, run: usize) -> impl Iterator<Item = &'a Cell<T>> + 'a {
        self.matrix.cells[first..]
            .iter()
            .step_by(self.map.col_stride)
            .take(run)
    }

    pub(crate) fn pack_dense<W: BufMut>(&self, start: usize, n: usize, window: &mut W) {
        self.for_each_run(start, n, |first, run| {
            for cell in self.dense_run(first, run) {
                cell.get().put_be(window);
            }
        });
    }

    pub(crate) fn pack_strided<W: BufMut>(&self, start: usize, n: usize, window: &mut W) {
        self.for_each_run(start, n, |first, run| {
            for cell in self.strided_run(first, run) {
                cell.get().put_be(window);
            }
        });
    }

    pub(crate) fn receive_dense<R: bytes::Buf>(
        &self,
        start: usize,
        n: usize,
        window: &mut R,
        op: Option<&ReduceOp<T>>,
    ) {
        self.for_each_run(start, n, |first, run| {
            for cell in self.dense_run(first, run) {
                merge(cell, T::get_be(window), op);
            }
        });
    }

    pub(crate) fn receive_strided<R: bytes::Buf>(
        &self,
        start: usize,
        n: usize,
        window: &mut R,
        op: Option<&ReduceOp<T>>,
    ) {
        self.for_each_run(start, n, |first, run| {
            for cell in self.strided_run(first, run) {
                merge(cell, T::get_be(window), op);
            }
        });
    }
}
