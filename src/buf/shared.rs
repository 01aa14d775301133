use bytes::BufMut;

use crate::cell::SharedArray;
use crate::index::ArrayMap;
use crate::range::Range;
use crate::{Item, ReduceOp};

/// A slice of a [`SharedArray`]. Every access is a single atomic operation
/// on one element; a reducing write uses the element's atomic `reduce`.
pub struct SharedArrayBuf<'a, T: Item> {
    pub(crate) array: &'a SharedArray<T>,
    pub(crate) range: Range,
    pub(crate) map: ArrayMap,
}

impl<'a, T: Item> SharedArrayBuf<'a, T> {
    pub(crate) fn new(array: &'a SharedArray<T>, range: Range) -> Self {
        Self {
            array,
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
    fn slot(&self, i: usize) -> usize {
        assert!(
            i < self.map.len,
            "index {} out of bounds for buffer of length {}",
            i,
            self.map.len
        );
        self.map.offset(i)
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> T {
        self.array.get(self.slot(i))
    }

    #[inline]
    fn store_slot(&self, slot: usize, value: T, op: Option<&ReduceOp<T>>) {
        match op {
            None => self.array.set(slot, value),
            Some(op) => {
                self.array.reduce(slot, value, op);
            }
        }
    }

    #[inline]
    pub(crate) fn store(&self, i: usize, value: T, op: Option<&ReduceOp<T>>) {
        self.store_slot(self.slot(i), value, op);
    }

    pub(crate) fn pack_dense<W: BufMut>(&self, start: usize, n: usize, window: &mut W) {
        let first = self.map.offset + start;
        for slot in first..first + n {
            self.array.get(slot).put_be(window);
        }
    }

    pub(crate) fn pack_strided<W: BufMut>(&self, start: usize, n: usize, window: &mut W) {
        let first = self.map.offset(start);
        for slot in (first..).step_by(self.map.stride).take(n) {
            self.array.get(slot).put_be(window);
        }
    }

    pub(crate) fn receive_dense<R: bytes::Buf>(
        &self,
        start: usize,
        n: usize,
        window: &mut R,
        op: Option<&ReduceOp<T>>,
    ) {
        let first = self.map.offset + start;
        for slot in first..first + n {
            self.store_slot(slot, T::get_be(window), op);
        }
    }

    pub(crate) fn receive_strided<R: bytes::Buf>(
        &self,
        start: usize,
        n: usize,
        window: &mut R,
        op: Option<&ReduceOp<T>>,
    ) {
        let first = self.map.offset(start);
        for slot in (first..).step_by(self.map.stride).take(n) {
            self.store_slot(slot, T::get_be(window), op);
        }
    }
}
