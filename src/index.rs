//! Logical-to-physical index mapping.
//!
//! These are pure functions of a shape: a flat logical index `0..len` is
//! turned into an array offset or a matrix `(row, col)` pair. The matrix
//! mapping is row-major and is the canonical order used by every buffer.

use crate::range::Range;

/// Physical array index of logical member `i` of `range`.
#[inline]
pub fn map_array_index(range: &Range, i: usize) -> i64 {
    range.map_index(i)
}

/// Physical `(row, col)` of logical index `i` over a `rows x cols` patch.
///
/// `i / cols.length()` selects the row member and `i % cols.length()` the
/// column member.
#[inline]
pub fn map_matrix_index(rows: &Range, cols: &Range, i: usize) -> (i64, i64) {
    let ncols = cols.length();
    (rows.map_index(i / ncols), cols.map_index(i % ncols))
}

/// Precomputed mapping for an array slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayMap {
    pub(crate) offset: usize,
    pub(crate) stride: usize,
    pub(crate) len: usize,
}

impl ArrayMap {
    /// Mapping for `range`; the range must already be known to lie in
    /// non-negative storage.
    pub(crate) fn new(range: &Range) -> Self {
        Self {
            offset: range.lb() as usize,
            stride: range.stride() as usize,
            len: range.length(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Physical offset of logical index `i` (no bounds check).
    #[inline(always)]
    pub fn offset(&self, i: usize) -> usize {
        self.offset + i * self.stride
    }
}

/// Precomputed mapping for a row-major matrix patch.
///
/// `ld` is the leading dimension (column count) of the backing storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixMap {
    pub(crate) lower_row: usize,
    pub(crate) row_stride: usize,
    pub(crate) row_count: usize,
    pub(crate) lower_col: usize,
    pub(crate) col_stride: usize,
    pub(crate) col_count: usize,
    pub(crate) ld: usize,
}

impl MatrixMap {
    pub(crate) fn new(rows: &Range, cols: &Range, ld: usize) -> Self {
        Self {
            lower_row: rows.lb() as usize,
            row_stride: rows.stride() as usize,
            row_count: rows.length(),
            lower_col: cols.lb() as usize,
            col_stride: cols.stride() as usize,
            col_count: cols.length(),
            ld,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.row_count * self.col_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    #[inline]
    pub fn col_count(&self) -> usize {
        self.col_count
    }

    /// Both strides are 1.
    #[inline]
    pub fn is_unit_stride(&self) -> bool {
        self.row_stride == 1 && self.col_stride == 1
    }

    /// Logical index `i` split into `(r, c)` within the patch.
    #[inline(always)]
    pub fn split(&self, i: usize) -> (usize, usize) {
        (i / self.col_count, i % self.col_count)
    }

    /// Physical `(row, col)` of logical index `i`.
    #[inline(always)]
    pub fn row_col(&self, i: usize) -> (usize, usize) {
        let (r, c) = self.split(i);
        (
            r * self.row_stride + self.lower_row,
            c * self.col_stride + self.lower_col,
        )
    }

    /// Flat offset into row-major storage of logical index `i`.
    #[inline(always)]
    pub fn offset(&self, i: usize) -> usize {
        let (row, col) = self.row_col(i);
        row * self.ld + col
    }

    /// Flat offset of the first physical column of patch row `r`.
    #[inline(always)]
    pub(crate) fn row_start(&self, r: usize) -> usize {
        (r * self.row_stride + self.lower_row) * self.ld + self.lower_col
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(lo: i64, hi: i64, stride: i64) -> Range {
        Range::with_stride(lo, hi, stride).unwrap()
    }

    #[test]
    fn test_array_map_matches_range() {
        let range = r(1, 5, 2);
        let map = ArrayMap::new(&range);
        assert_eq!(map.len(), 3);
        for i in 0..map.len() {
            assert_eq!(map.offset(i) as i64, map_array_index(&range, i));
        }
        assert_eq!(map.offset(2), 5);
    }

    #[test]
    fn test_matrix_row_major_order() {
        let rows = r(0, 1, 1);
        let cols = r(1, 2, 1);
        let got: Vec<(i64, i64)> = (0..4).map(|i| map_matrix_index(&rows, &cols, i)).collect();
        assert_eq!(got, vec![(0, 1), (0, 2), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_matrix_map_with_strides() {
        // 5x6 storage, rows 1,3 and cols 0,2,4
        let rows = r(1, 3, 2);
        let cols = r(0, 4, 2);
        let map = MatrixMap::new(&rows, &cols, 6);
        assert_eq!(map.len(), 6);
        assert!(!map.is_unit_stride());
        for i in 0..map.len() {
            let (row, col) = map.row_col(i);
            assert_eq!((row as i64, col as i64), map_matrix_index(&rows, &cols, i));
            assert_eq!(map.offset(i), row * 6 + col);
        }
        assert_eq!(map.row_start(1), 3 * 6);
    }
}
