//! Lock-free shared cells.
//!
//! A [`SharedCell`] (or each element of a [`SharedArray`]) stores the bit
//! pattern of an item in a [`crossbeam_utils::atomic::AtomicCell`]. The
//! cell's own atomics are the only synchronization a shared-cell buffer
//! relies on: `get`/`set` are single atomic loads/stores and `reduce` is a
//! compare-and-swap loop, so a reduction is linearizable without any lock.

use std::fmt;

use crossbeam_utils::atomic::AtomicCell;

use crate::{Item, ReduceOp};

#[inline]
fn reduce_bits<T: Item>(bits: &AtomicCell<T::Bits>, value: T, op: &ReduceOp<T>) -> T {
    let mut current = bits.load();
    loop {
        let next = op.apply(T::from_bits(current), value);
        match bits.compare_exchange(current, next.to_bits()) {
            Ok(_) => return next,
            Err(actual) => current = actual,
        }
    }
}

/// A single item shared between threads.
pub struct SharedCell<T: Item> {
    bits: AtomicCell<T::Bits>,
}

impl<T: Item> SharedCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            bits: AtomicCell::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn get(&self) -> T {
        T::from_bits(self.bits.load())
    }

    #[inline]
    pub fn set(&self, value: T) {
        self.bits.store(value.to_bits());
    }

    /// Atomically replace the value, returning the previous one.
    pub fn get_and_set(&self, value: T) -> T {
        T::from_bits(self.bits.swap(value.to_bits()))
    }

    /// Atomically set to `update` if the current bit pattern equals
    /// `expect`'s.
    pub fn compare_and_set(&self, expect: T, update: T) -> bool {
        self.bits
            .compare_exchange(expect.to_bits(), update.to_bits())
            .is_ok()
    }

    /// Atomically store `op(current, value)` and return the stored result.
    pub fn reduce(&self, value: T, op: &ReduceOp<T>) -> T {
        reduce_bits(&self.bits, value, op)
    }

    /// Whether the underlying atomic avoids an internal lock on this
    /// platform.
    pub fn is_lock_free() -> bool {
        AtomicCell::<T::Bits>::is_lock_free()
    }
}

impl<T: Item> Default for SharedCell<T> {
    fn default() -> Self {
        Self::new(T::zero())
    }
}

impl<T: Item> fmt::Debug for SharedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedCell").field(&self.get()).finish()
    }
}

/// A fixed-length array of independently atomic items.
pub struct SharedArray<T: Item> {
    cells: Box<[AtomicCell<T::Bits>]>,
}

impl<T: Item> SharedArray<T> {
    /// Array of `len` zero items.
    pub fn new(len: usize) -> Self {
        Self::from_fn(len, |_| T::zero())
    }

    pub fn from_fn(len: usize, mut f: impl FnMut(usize) -> T) -> Self {
        Self {
            cells: (0..len).map(|i| AtomicCell::new(f(i).to_bits())).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// # Panics
    /// If `i >= self.len()`.
    #[inline]
    pub fn get(&self, i: usize) -> T {
        T::from_bits(self.cells[i].load())
    }

    /// # Panics
    /// If `i >= self.len()`.
    #[inline]
    pub fn set(&self, i: usize, value: T) {
        self.cells[i].store(value.to_bits());
    }

    /// Atomically store `op(self[i], value)` and return the stored result.
    pub fn reduce(&self, i: usize, value: T, op: &ReduceOp<T>) -> T {
        reduce_bits(&self.cells[i], value, op)
    }

    /// Snapshot of every element (each load is atomic, the whole is not).
    pub fn to_vec(&self) -> Vec<T> {
        self.cells.iter().map(|c| T::from_bits(c.load())).collect()
    }
}

impl<T: Item> From<&[T]> for SharedArray<T> {
    fn from(values: &[T]) -> Self {
        Self::from_fn(values.len(), |i| values[i])
    }
}

impl<T: Item> fmt::Debug for SharedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}
