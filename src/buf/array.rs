use std::cell::Cell;

use bytes::BufMut;

use super::merge;
use crate::index::ArrayMap;
use crate::range::Range;
use crate::{Item, ReduceOp};

/// A slice of a plain array: `range` members of `cells`.
pub struct ArrayBuf<'a, T> {
    pub(crate) cells: &'a [Cell<T>],
    pub(crate) range: Range,
    pub(crate) map: ArrayMap,
}

impl<'a, T: Item> ArrayBuf<'a, T> {
    /// `range` must already be validated against `cells.len()`.
    pub(crate) fn new(cells: &'a [Cell<T>], range: Range) -> Self {
        Self {
            cells,
            range,
            map: ArrayMap::new(&range),
        }
    }

    #[inline]
    pub fn range(&self) -> Range {
        self.range
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.len == 0
    }

    #[inline]
    pub(crate) fn cell(&self, i: usize) -> &'a Cell<T> {
        assert!(
            i < self.map.len,
            "index {} out of bounds for buffer of length {}",
            i,
            self.map.len
        );
        &self.cells[self.map.offset(i)]
    }

    /// Contiguous storage of logical `start..start + n` (unit stride only).
    #[inline]
    pub(crate) fn dense_cells(&self, start: usize, n: usize) -> &'a [Cell<T>] {
        let first = self.map.offset + start;
        &self.cells[first..first + n]
    }

    #[inline]
    pub(crate) fn strided_cells(
        &self,
        start: usize,
        n: usize,
    ) -> impl Iterator<Item = &'a Cell<T>> + 'a {
        self.cells[self.map.offset(start)..]
            .iter()
            .step_by(self.map.stride)
            .take(n)
    }

    pub(crate) fn pack_dense<W: BufMut>(&self, start: usize, n: usize, window: &mut W) {
        for cell in self.dense_cells(start, n) {
            cell.get().put_be(window);
        }
    }

    pub(crate) fn pack_strided<W: BufMut>(&self, start: usize, n: usize, window: &mut W) {
        for cell in self.strided_cells(start, n) {
            cell.get().put_be(window);
        }
    }

    pub(crate) fn receive_dense<R: bytes::Buf>(
        &self,
        start: usize,
        n: usize,
        window: &mut R,
        op: Option<&ReduceOp<T>>,
    ) {
        for cell in self.dense_cells(start, n) {
            merge(cell, T::get_be(window), op);
        }
    }

    pub(crate) fn receive_strided<R: bytes::Buf>(
        &self,
        start: usize,
        n: usize,
        window: &mut R,
        op: Option<&ReduceOp<T>>,
    ) {
        for cell in self.strided_cells(start, n) {
            merge(cell, T::get_be(window), op);
        }
    }
}
