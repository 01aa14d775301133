//! Buffer construction.
//!
//! Every factory validates the requested ranges against the storage's own
//! extent (never the view's) and fails with [`MpError::IndexOutOfBounds`]
//! before a view exists. Unit stride selects the dense variant.

use std::cell::Cell;

use crate::buf::{ArrayBuf, Buffer, Matrix, MatrixBuf, SharedArrayBuf, Storage};
use crate::cell::{SharedArray, SharedCell};
use crate::range::Range;
use crate::{Item, MpError, Result};

fn check(what: &'static str, range: Range, extent: usize) -> Result<()> {
    if range.fits_within(extent) {
        Ok(())
    } else {
        Err(MpError::IndexOutOfBounds {
            what,
            range,
            extent,
        })
    }
}

fn array_view<'a, T: Item>(cells: &'a [Cell<T>], range: Range) -> Buffer<'a, T> {
    tracing::trace!(%range, extent = cells.len(), item = %T::TYPE, "array view");
    let view = ArrayBuf::new(cells, range);
    if range.is_contiguous() {
        Buffer::DenseArray(view)
    } else {
        Buffer::StridedArray(view)
    }
}

fn matrix_view<'a, T: Item>(matrix: Matrix<'a, T>, rows: Range, cols: Range) -> Buffer<'a, T> {
    tracing::trace!(%rows, %cols, shape = ?(matrix.rows(), matrix.cols()), "matrix view");
    let view = MatrixBuf::new(matrix, rows, cols);
    if view.map.is_unit_stride() {
        Buffer::DenseMatrix(view)
    } else {
        Buffer::StridedMatrix(view)
    }
}

fn shared_view<T: Item>(array: &SharedArray<T>, range: Range) -> Buffer<'_, T> {
    tracing::trace!(%range, extent = array.len(), "shared array view");
    let view = SharedArrayBuf::new(array, range);
    if range.is_contiguous() {
        Buffer::DenseSharedArray(view)
    } else {
        Buffer::StridedSharedArray(view)
    }
}

impl<'a, T: Item> Buffer<'a, T> {
    /// A buffer with no items.
    pub fn empty() -> Self {
        Buffer::Empty
    }

    /// All of `storage`; [`Buffer::Empty`] when it has no items.
    pub fn whole_array(storage: impl Into<Storage<'a, T>>) -> Self {
        let cells = storage.into().cells();
        match Range::covering(cells.len()) {
            Some(range) => Buffer::DenseArray(ArrayBuf::new(cells, range)),
            None => Buffer::Empty,
        }
    }

    /// The members of `range` in `storage`.
    pub fn array_slice(storage: impl Into<Storage<'a, T>>, range: Range) -> Result<Self> {
        let cells = storage.into().cells();
        check("array", range, cells.len())?;
        Ok(array_view(cells, range))
    }

    /// One slice per range, all viewing the same storage.
    pub fn array_slices(storage: impl Into<Storage<'a, T>>, ranges: &[Range]) -> Result<Vec<Self>> {
        let storage = storage.into();
        ranges
            .iter()
            .map(|&range| Self::array_slice(storage, range))
            .collect()
    }

    /// Every element of `matrix`; [`Buffer::Empty`] when it has no rows or
    /// no columns.
    pub fn whole_matrix(matrix: Matrix<'a, T>) -> Self {
        match (Range::covering(matrix.rows()), Range::covering(matrix.cols())) {
            (Some(rows), Some(cols)) => Buffer::DenseMatrix(MatrixBuf::new(matrix, rows, cols)),
            _ => Buffer::Empty,
        }
    }

    /// The rows in `rows`, every column.
    pub fn row_slice(matrix: Matrix<'a, T>, rows: Range) -> Result<Self> {
        check("matrix row", rows, matrix.rows())?;
        let Some(cols) = Range::covering(matrix.cols()) else {
            return Ok(Buffer::Empty);
        };
        Ok(matrix_view(matrix, rows, cols))
    }

    /// The columns in `cols`, every row.
    pub fn col_slice(matrix: Matrix<'a, T>, cols: Range) -> Result<Self> {
        check("matrix column", cols, matrix.cols())?;
        let Some(rows) = Range::covering(matrix.rows()) else {
            return Ok(Buffer::Empty);
        };
        Ok(matrix_view(matrix, rows, cols))
    }

    /// The intersection of `rows` and `cols`.
    pub fn patch(matrix: Matrix<'a, T>, rows: Range, cols: Range) -> Result<Self> {
        check("matrix row", rows, matrix.rows())?;
        check("matrix column", cols, matrix.cols())?;
        Ok(matrix_view(matrix, rows, cols))
    }

    pub fn row_slices(matrix: Matrix<'a, T>, rows: &[Range]) -> Result<Vec<Self>> {
        rows.iter().map(|&r| Self::row_slice(matrix, r)).collect()
    }

    pub fn col_slices(matrix: Matrix<'a, T>, cols: &[Range]) -> Result<Vec<Self>> {
        cols.iter().map(|&c| Self::col_slice(matrix, c)).collect()
    }

    /// One patch per `(rows[i], cols[j])` pair, row-major: element
    /// `i * cols.len() + j`.
    pub fn patches(matrix: Matrix<'a, T>, rows: &[Range], cols: &[Range]) -> Result<Vec<Self>> {
        let mut out = Vec::with_capacity(rows.len() * cols.len());
        for &r in rows {
            for &c in cols {
                out.push(Self::patch(matrix, r, c)?);
            }
        }
        Ok(out)
    }

    /// A single owned item, initially `initial` or zero.
    pub fn scalar(initial: Option<T>) -> Self {
        Buffer::Scalar(Cell::new(initial.unwrap_or_else(T::zero)))
    }

    /// A single item living in `cell`.
    pub fn shared_cell(cell: &'a SharedCell<T>) -> Self {
        Buffer::Shared(cell)
    }

    /// All of `array`.
    pub fn shared_array(array: &'a SharedArray<T>) -> Self {
        match Range::covering(array.len()) {
            Some(range) => Buffer::DenseSharedArray(SharedArrayBuf::new(array, range)),
            None => Buffer::Empty,
        }
    }

    pub fn shared_array_slice(array: &'a SharedArray<T>, range: Range) -> Result<Self> {
        check("shared array", range, array.len())?;
        Ok(shared_view(array, range))
    }

    pub fn shared_array_slices(array: &'a SharedArray<T>, ranges: &[Range]) -> Result<Vec<Self>> {
        ranges
            .iter()
            .map(|&range| Self::shared_array_slice(array, range))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BufOps;

    fn r(lo: i64, hi: i64, stride: i64) -> Range {
        Range::with_stride(lo, hi, stride).unwrap()
    }

    #[test]
    fn test_slice_out_of_storage_rejected() {
        let mut data = [0i32; 6];
        let err = Buffer::array_slice(&mut data, r(2, 6, 2)).unwrap_err();
        match err {
            MpError::IndexOutOfBounds { what, extent, range } => {
                assert_eq!(what, "array");
                assert_eq!(extent, 6);
                assert_eq!(range.ub(), 6);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(Buffer::array_slice(&mut data, r(-1, 2, 1)).is_err());
    }

    #[test]
    fn test_stride_selects_variant() {
        let mut data = [0u16; 8];
        let storage = Storage::from(&mut data);
        let views = Buffer::array_slices(storage, &[r(0, 7, 1), r(0, 7, 3)]).unwrap();
        assert_eq!(views[0].variant_name(), "dense_array");
        assert_eq!(views[1].variant_name(), "strided_array");
        assert_eq!(views[1].len(), 3);
    }

    #[test]
    fn test_array_slices_fail_on_any_bad_range() {
        let mut data = [0i8; 4];
        assert!(Buffer::array_slices(&mut data, &[r(0, 1, 1), r(3, 4, 1)]).is_err());
    }

    #[test]
    fn test_whole_views_of_empty_storage() {
        let mut nothing: [f64; 0] = [];
        assert!(matches!(Buffer::whole_array(&mut nothing), Buffer::Empty));
        let m = Matrix::new(&mut nothing, 0, 3).unwrap();
        assert_eq!(Buffer::whole_matrix(m).len(), 0);
        let shared = SharedArray::<f64>::new(0);
        assert!(Buffer::shared_array(&shared).is_empty());
    }

    #[test]
    fn test_matrix_factories_check_their_axis() {
        let mut data = [0i64; 12];
        let m = Matrix::new(&mut data, 3, 4).unwrap();
        assert_eq!(Buffer::row_slice(m, r(1, 2, 1)).unwrap().len(), 8);
        assert_eq!(Buffer::col_slice(m, r(0, 3, 3)).unwrap().len(), 6);
        assert!(Buffer::row_slice(m, r(0, 3, 1)).is_err());
        assert!(Buffer::col_slice(m, r(0, 3, 1)).is_ok());
        assert!(Buffer::patch(m, r(0, 2, 1), r(0, 4, 1)).is_err());

        let patches = Buffer::patches(m, &[r(0, 0, 1), r(1, 2, 1)], &[r(0, 1, 1), r(2, 3, 1)]).unwrap();
        assert_eq!(patches.len(), 4);
        let lens: Vec<usize> = patches.iter().map(|p| p.len()).collect();
        assert_eq!(lens, vec![2, 2, 4, 4]);
        assert_eq!(Buffer::row_slices(m, &[r(0, 0, 1)]).unwrap().len(), 1);
        assert_eq!(Buffer::col_slices(m, &[r(0, 0, 1), r(1, 1, 1)]).unwrap().len(), 2);
    }

    #[test]
    fn test_scalar_defaults_to_zero() {
        assert!(!Buffer::<bool>::scalar(None).get(0));
        assert_eq!(Buffer::scalar(Some('x' as u16)).get(0), 120);
    }

    #[test]
    fn test_shared_slices() {
        let shared = SharedArray::from(&[1i32, 2, 3, 4, 5][..]);
        let views = Buffer::shared_array_slices(&shared, &[r(0, 4, 2), r(3, 4, 1)]).unwrap();
        assert_eq!(views[0].variant_name(), "strided_shared_array");
        assert_eq!(views[0].get(2), 5);
        assert_eq!(views[1].get(0), 4);
        assert!(Buffer::shared_array_slice(&shared, r(0, 5, 1)).is_err());
    }
}
