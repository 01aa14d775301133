//! Lockstep copy and reduction between two views.
//!
//! These are the bulk paths behind [`BufOps::copy_from`](crate::BufOps) when
//! source and destination are the same storage family with the same shape,
//! and the public entry points for local (non-communicating) reductions.
//! Items are visited in canonical order, one source read followed by one
//! destination write, so the result equals the element-by-element loop even
//! when the two views overlap.

use std::cell::Cell;

use crate::buf::{merge, Buffer, Matrix};
use crate::index::{ArrayMap, MatrixMap};
use crate::range::Range;
use crate::{Item, MpError, ReduceOp, Result};

/// Lockstep over `min(len)` array members.
fn arrays<T: Item>(
    src: &[Cell<T>],
    src_map: &ArrayMap,
    dst: &[Cell<T>],
    dst_map: &ArrayMap,
    op: Option<&ReduceOp<T>>,
) -> usize {
    let n = src_map.len.min(dst_map.len);
    if src_map.stride == 1 && dst_map.stride == 1 {
        let s = &src[src_map.offset..src_map.offset + n];
        let d = &dst[dst_map.offset..dst_map.offset + n];
        for (from, to) in s.iter().zip(d) {
            merge(to, from.get(), op);
        }
    } else {
        for j in 0..n {
            merge(&dst[dst_map.offset(j)], src[src_map.offset(j)].get(), op);
        }
    }
    n
}

/// Lockstep over two patches of equal shape, one row at a time.
fn patches<T: Item>(
    src: &[Cell<T>],
    src_map: &MatrixMap,
    dst: &[Cell<T>],
    dst_map: &MatrixMap,
    op: Option<&ReduceOp<T>>,
) -> usize {
    debug_assert_eq!(src_map.row_count, dst_map.row_count);
    debug_assert_eq!(src_map.col_count, dst_map.col_count);
    let ncols = src_map.col_count;
    for r in 0..src_map.row_count {
        let s0 = src_map.row_start(r);
        let d0 = dst_map.row_start(r);
        if src_map.col_stride == 1 && dst_map.col_stride == 1 {
            for (from, to) in src[s0..s0 + ncols].iter().zip(&dst[d0..d0 + ncols]) {
                merge(to, from.get(), op);
            }
        } else {
            for c in 0..ncols {
                merge(
                    &dst[d0 + c * dst_map.col_stride],
                    src[s0 + c * src_map.col_stride].get(),
                    op,
                );
            }
        }
    }
    src_map.len()
}

/// Run the bulk path for `src -> dst` when both are plain arrays, or both
/// are matrix patches of one shape. Returns `false` (touching nothing) for
/// any other pairing.
pub(crate) fn lockstep<T: Item>(
    src: &Buffer<'_, T>,
    dst: &Buffer<'_, T>,
    op: Option<&ReduceOp<T>>,
) -> bool {
    match (src, dst) {
        (
            Buffer::DenseArray(s) | Buffer::StridedArray(s),
            Buffer::DenseArray(d) | Buffer::StridedArray(d),
        ) => {
            arrays(s.cells, &s.map, d.cells, &d.map, op);
            true
        }
        (
            Buffer::DenseMatrix(s) | Buffer::StridedMatrix(s),
            Buffer::DenseMatrix(d) | Buffer::StridedMatrix(d),
        ) if s.map.row_count == d.map.row_count && s.map.col_count == d.map.col_count => {
            patches(s.matrix.cells(), &s.map, d.matrix.cells(), &d.map, op);
            true
        }
        _ => false,
    }
}

fn check_range(what: &'static str, range: &Range, extent: usize) -> Result<()> {
    if range.fits_within(extent) {
        Ok(())
    } else {
        Err(MpError::IndexOutOfBounds {
            what,
            range: *range,
            extent,
        })
    }
}

/// Fold `src[src_range]` into `dst[dst_range]` member by member:
/// `dst[j] = op(dst[j], src[j])` for the first `min` of the two lengths.
/// Returns the number of members combined.
pub fn reduce<T: Item>(
    src: &[T],
    src_range: &Range,
    dst: &mut [T],
    dst_range: &Range,
    op: &ReduceOp<T>,
) -> Result<usize> {
    check_range("source array", src_range, src.len())?;
    check_range("destination array", dst_range, dst.len())?;
    let s = ArrayMap::new(src_range);
    let d = ArrayMap::new(dst_range);
    let n = s.len.min(d.len);
    for j in 0..n {
        let slot = &mut dst[d.offset(j)];
        *slot = op.apply(*slot, src[s.offset(j)]);
    }
    Ok(n)
}

/// Copy `src[src_range]` into `dst[dst_range]` member by member.
pub fn copy<T: Item>(
    src: &[T],
    src_range: &Range,
    dst: &mut [T],
    dst_range: &Range,
) -> Result<usize> {
    check_range("source array", src_range, src.len())?;
    check_range("destination array", dst_range, dst.len())?;
    let s = ArrayMap::new(src_range);
    let d = ArrayMap::new(dst_range);
    let n = s.len.min(d.len);
    for j in 0..n {
        dst[d.offset(j)] = src[s.offset(j)];
    }
    Ok(n)
}

/// Fold a patch of `src` into an equally shaped patch of `dst`, row-major.
///
/// The two matrices may share storage; each source item is read just before
/// its destination is written.
pub fn reduce_patch<T: Item>(
    src: Matrix<'_, T>,
    src_rows: &Range,
    src_cols: &Range,
    dst: Matrix<'_, T>,
    dst_rows: &Range,
    dst_cols: &Range,
    op: &ReduceOp<T>,
) -> Result<usize> {
    check_range("source matrix row", src_rows, src.rows())?;
    check_range("source matrix column", src_cols, src.cols())?;
    check_range("destination matrix row", dst_rows, dst.rows())?;
    check_range("destination matrix column", dst_cols, dst.cols())?;
    let s = MatrixMap::new(src_rows, src_cols, src.cols());
    let d = MatrixMap::new(dst_rows, dst_cols, dst.cols());
    if (s.row_count, s.col_count) != (d.row_count, d.col_count) {
        return Err(MpError::PatchShapeMismatch {
            src: (s.row_count, s.col_count),
            dst: (d.row_count, d.col_count),
        });
    }
    Ok(patches(src.cells(), &s, dst.cells(), &d, Some(op)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Op, OpTable};

    fn r(lo: i64, hi: i64, stride: i64) -> Range {
        Range::with_stride(lo, hi, stride).unwrap()
    }

    #[test]
    fn test_reduce_strided_into_dense() {
        let src = [1i32, 100, 2, 100, 3];
        let mut dst = [10i32, 20, 30, 40];
        let sum = OpTable::<i32>::new().get(Op::Sum).unwrap();
        let n = reduce(&src, &r(0, 4, 2), &mut dst, &r(1, 3, 1), &sum).unwrap();
        assert_eq!(n, 3);
        assert_eq!(dst, [10, 21, 32, 43]);
    }

    #[test]
    fn test_copy_stops_at_shorter_range() {
        let src = [1.0f32, 2.0, 3.0];
        let mut dst = [0.0f32; 6];
        assert_eq!(copy(&src, &r(0, 2, 1), &mut dst, &r(0, 2, 2)).unwrap(), 2);
        assert_eq!(dst, [1.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_ranges_validated() {
        let src = [0i8; 3];
        let mut dst = [0i8; 3];
        assert!(matches!(
            copy(&src, &r(0, 3, 1), &mut dst, &r(0, 2, 1)),
            Err(MpError::IndexOutOfBounds { what: "source array", .. })
        ));
    }

    #[test]
    fn test_reduce_patch_within_one_matrix() {
        // Fold the bottom-right 2x2 block into the top-left one.
        let mut data: Vec<i64> = (1..=9).collect();
        let m = Matrix::new(&mut data, 3, 3).unwrap();
        let max = OpTable::<i64>::new().get(Op::Max).unwrap();
        let sum = OpTable::<i64>::new().get(Op::Sum).unwrap();
        assert_eq!(reduce_patch(m, &r(1, 2, 1), &r(1, 2, 1), m, &r(0, 1, 1), &r(0, 1, 1), &sum).unwrap(), 4);
        assert_eq!(m.get(0, 0), 1 + 5);
        assert_eq!(m.get(1, 1), 5 + 9);
        assert!(matches!(
            reduce_patch(m, &r(0, 2, 1), &r(0, 0, 1), m, &r(0, 0, 1), &r(0, 2, 1), &max),
            Err(MpError::PatchShapeMismatch { src: (3, 1), dst: (1, 3) })
        ));
    }
}
