//! Buffer views and the capability they share.
//!
//! [`Buffer`] is a closed set of storage variants. Array, matrix and
//! shared-array views come in a dense flavor (every stride is 1, inner loops
//! walk contiguous memory) and a strided flavor (explicit stride arithmetic
//! per step). The factory functions pick the flavor; the two are
//! indistinguishable apart from throughput.
//!
//! Plain storage is borrowed as `&[Cell<T>]`, so `get`/`put` take `&self`
//! and several views may alias one array. That also makes array and matrix
//! buffers `!Send + !Sync`: a receive holds exclusive access to its storage
//! for as long as the buffer lives.

mod array;
mod matrix;
mod shared;

use std::cell::Cell;
use std::fmt;

use bytes::BufMut;

use crate::cell::SharedCell;
use crate::reduce_arrays;
use crate::reduction::ReductionBuffer;
use crate::{Item, ItemType, ReduceOp, Result};

pub use array::ArrayBuf;
pub use matrix::{Matrix, MatrixBuf};
pub use shared::SharedArrayBuf;

// ============================================================================
// Storage
// ============================================================================

/// Caller-owned storage viewed as cells.
///
/// Converting from `&mut [T]` is zero-copy; the exclusive borrow lasts as
/// long as any view built from it.
pub struct Storage<'a, T>(&'a [Cell<T>]);

impl<T> fmt::Debug for Storage<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage").field("len", &self.0.len()).finish()
    }
}

impl<T> Clone for Storage<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Storage<'_, T> {}

impl<'a, T> Storage<'a, T> {
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn cells(&self) -> &'a [Cell<T>] {
        self.0
    }
}

impl<'a, T> From<&'a mut [T]> for Storage<'a, T> {
    fn from(data: &'a mut [T]) -> Self {
        Storage(Cell::from_mut(data).as_slice_of_cells())
    }
}

impl<'a, T> From<&'a mut Vec<T>> for Storage<'a, T> {
    fn from(data: &'a mut Vec<T>) -> Self {
        Storage::from(data.as_mut_slice())
    }
}

impl<'a, T, const N: usize> From<&'a mut [T; N]> for Storage<'a, T> {
    fn from(data: &'a mut [T; N]) -> Self {
        Storage::from(&mut data[..])
    }
}

impl<'a, T> From<&'a [Cell<T>]> for Storage<'a, T> {
    fn from(cells: &'a [Cell<T>]) -> Self {
        Storage(cells)
    }
}

// ============================================================================
// Capability
// ============================================================================

pub(crate) mod sealed {
    use super::Buffer;
    use crate::range::Range;
    use crate::Item;

    /// Identity of a view: storage address plus shape, plus whether writes
    /// fold. Two views with equal keys read and write the same items.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ViewKey {
        pub(crate) storage: usize,
        pub(crate) first: Option<Range>,
        pub(crate) second: Option<Range>,
        pub(crate) reducing: bool,
    }

    pub trait Sealed<T: Item> {
        fn view_key(&self) -> ViewKey;

        /// The plain view whose storage backs this buffer.
        fn plain(&self) -> &Buffer<'_, T>;
    }
}

/// Operations every buffer supports.
///
/// Indices are logical, `0..len()`, in canonical row-major order. An index
/// outside that range is a contract violation and panics.
pub trait BufOps<T: Item>: sealed::Sealed<T> {
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn item_type(&self) -> ItemType {
        T::TYPE
    }

    /// Read logical item `i`. O(1), never blocks.
    fn get(&self, i: usize) -> T;

    /// Write logical item `i` (or fold into it, for a reduction buffer).
    fn put(&self, i: usize, value: T);

    /// Copy `min(self.len(), src.len())` items from `src` in canonical
    /// order. Copying a view onto itself does nothing.
    fn copy_from<S: BufOps<T>>(&self, src: &S);

    /// Put `value`, or the item type's zero, at every index.
    fn fill(&self, value: Option<T>) {
        let value = value.unwrap_or_else(T::zero);
        for i in 0..self.len() {
            self.put(i, value);
        }
    }

    /// Encode items starting at logical index `start` while whole items fit
    /// in `window`; returns the number written. The window advances past
    /// the written bytes.
    ///
    /// # Panics
    /// If `start > self.len()`.
    fn pack<W: BufMut>(&self, start: usize, window: &mut W) -> usize;

    /// Decode up to `max_items` items from `window` into logical indices
    /// `start..`; returns the number consumed. Only whole items are read;
    /// [`crate::Unpacker`] carries a split item over to the next window.
    ///
    /// # Panics
    /// If `start > self.len()`.
    fn unpack<R: bytes::Buf>(&self, start: usize, max_items: usize, window: &mut R) -> usize;

    /// A view over the same storage whose writes fold with `op`.
    ///
    /// Fails with [`crate::MpError::UnsupportedOperation`] on a buffer that
    /// is already reducing.
    fn reduction(&self, op: ReduceOp<T>) -> Result<ReductionBuffer<'_, '_, T>>;
}

/// Element-by-element copy in canonical order.
pub(crate) fn default_copy<T: Item, S: BufOps<T>, D: BufOps<T>>(src: &S, dst: &D) {
    let n = src.len().min(dst.len());
    for i in 0..n {
        dst.put(i, src.get(i));
    }
}

/// Store `value` into `cell`, folding with `op` when given.
#[inline(always)]
pub(crate) fn merge<T: Item>(cell: &Cell<T>, value: T, op: Option<&ReduceOp<T>>) {
    match op {
        None => cell.set(value),
        Some(op) => cell.set(op.apply(cell.get(), value)),
    }
}

/// Number of whole items that fit in `bytes`.
#[inline(always)]
pub(crate) fn items_in<T: Item>(bytes: usize) -> usize {
    bytes / T::WIDTH
}

// ============================================================================
// Buffer
// ============================================================================

/// A typed, fixed-length view over some storage.
///
/// Construct through the factory functions ([`Buffer::whole_array`],
/// [`Buffer::array_slice`], [`Buffer::patch`], [`Buffer::shared_cell`], ...).
pub enum Buffer<'a, T: Item> {
    /// No items.
    Empty,
    /// Contiguous array slice.
    DenseArray(ArrayBuf<'a, T>),
    /// Array slice with stride > 1.
    StridedArray(ArrayBuf<'a, T>),
    /// Matrix patch with unit row and column strides.
    DenseMatrix(MatrixBuf<'a, T>),
    /// Matrix patch with a row or column stride > 1.
    StridedMatrix(MatrixBuf<'a, T>),
    /// A single item owned by the buffer.
    Scalar(Cell<T>),
    /// A single item in an externally shared cell.
    Shared(&'a SharedCell<T>),
    /// Contiguous slice of a shared array.
    DenseSharedArray(SharedArrayBuf<'a, T>),
    /// Strided slice of a shared array.
    StridedSharedArray(SharedArrayBuf<'a, T>),
}

impl<T: Item> fmt::Debug for Buffer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("variant", &self.variant_name())
            .field("item_type", &T::TYPE)
            .field("len", &self.len())
            .finish()
    }
}

impl<'a, T: Item> Buffer<'a, T> {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Buffer::Empty => "empty",
            Buffer::DenseArray(_) => "dense_array",
            Buffer::StridedArray(_) => "strided_array",
            Buffer::DenseMatrix(_) => "dense_matrix",
            Buffer::StridedMatrix(_) => "strided_matrix",
            Buffer::Scalar(_) => "scalar",
            Buffer::Shared(_) => "shared",
            Buffer::DenseSharedArray(_) => "dense_shared_array",
            Buffer::StridedSharedArray(_) => "strided_shared_array",
        }
    }

    /// Whether this view uses the unit-stride fast path.
    pub fn is_dense(&self) -> bool {
        matches!(
            self,
            Buffer::DenseArray(_) | Buffer::DenseMatrix(_) | Buffer::DenseSharedArray(_)
        )
    }

    /// Current value of a scalar or shared-cell buffer.
    pub fn item(&self) -> Option<T> {
        match self {
            Buffer::Scalar(cell) => Some(cell.get()),
            Buffer::Shared(cell) => Some(cell.get()),
            _ => None,
        }
    }

    /// Write logical item `i`, folding with `op` when given. Shared storage
    /// folds through the cell's own atomic `reduce`.
    #[inline]
    pub(crate) fn store(&self, i: usize, value: T, op: Option<&ReduceOp<T>>) {
        match self {
            Buffer::Empty => out_of_bounds(i, 0),
            Buffer::DenseArray(a) | Buffer::StridedArray(a) => merge(a.cell(i), value, op),
            Buffer::DenseMatrix(m) | Buffer::StridedMatrix(m) => merge(m.cell(i), value, op),
            Buffer::Scalar(cell) => {
                check_single(i);
                merge(cell, value, op)
            }
            Buffer::Shared(cell) => {
                check_single(i);
                match op {
                    None => cell.set(value),
                    Some(op) => {
                        cell.reduce(value, op);
                    }
                }
            }
            Buffer::DenseSharedArray(s) | Buffer::StridedSharedArray(s) => s.store(i, value, op),
        }
    }

    /// Decode into `start..`, folding with `op` when given.
    pub(crate) fn receive<R: bytes::Buf>(
        &self,
        start: usize,
        max_items: usize,
        window: &mut R,
        op: Option<&ReduceOp<T>>,
    ) -> usize {
        let len = self.len();
        assert!(start <= len, "start {} past buffer length {}", start, len);
        let n = max_items
            .min(len - start)
            .min(items_in::<T>(window.remaining()));
        if n == 0 {
            return 0;
        }
        match self {
            Buffer::Empty => {}
            Buffer::DenseArray(a) => a.receive_dense(start, n, window, op),
            Buffer::StridedArray(a) => a.receive_strided(start, n, window, op),
            Buffer::DenseMatrix(m) => m.receive_dense(start, n, window, op),
            Buffer::StridedMatrix(m) => m.receive_strided(start, n, window, op),
            Buffer::Scalar(_) | Buffer::Shared(_) => self.store(0, T::get_be(window), op),
            Buffer::DenseSharedArray(s) => s.receive_dense(start, n, window, op),
            Buffer::StridedSharedArray(s) => s.receive_strided(start, n, window, op),
        }
        tracing::trace!(
            variant = self.variant_name(),
            start,
            items = n,
            reducing = op.is_some(),
            "unpacked window"
        );
        n
    }

    fn storage_addr(&self) -> usize {
        match self {
            Buffer::Empty => 0,
            Buffer::DenseArray(a) | Buffer::StridedArray(a) => a.cells.as_ptr() as usize,
            Buffer::DenseMatrix(m) | Buffer::StridedMatrix(m) => {
                m.matrix.cells().as_ptr() as usize
            }
            Buffer::Scalar(cell) => cell as *const Cell<T> as usize,
            Buffer::Shared(cell) => *cell as *const SharedCell<T> as usize,
            Buffer::DenseSharedArray(s) | Buffer::StridedSharedArray(s) => {
                s.array as *const _ as usize
            }
        }
    }
}

#[cold]
#[inline(never)]
fn out_of_bounds(i: usize, len: usize) -> ! {
    panic!("index {} out of bounds for buffer of length {}", i, len)
}

#[inline(always)]
fn check_single(i: usize) {
    if i != 0 {
        out_of_bounds(i, 1);
    }
}

impl<T: Item> sealed::Sealed<T> for Buffer<'_, T> {
    fn view_key(&self) -> sealed::ViewKey {
        let (first, second) = match self {
            Buffer::DenseArray(a) | Buffer::StridedArray(a) => (Some(a.range), None),
            Buffer::DenseMatrix(m) | Buffer::StridedMatrix(m) => (Some(m.rows), Some(m.cols)),
            Buffer::DenseSharedArray(s) | Buffer::StridedSharedArray(s) => (Some(s.range), None),
            Buffer::Empty | Buffer::Scalar(_) | Buffer::Shared(_) => (None, None),
        };
        sealed::ViewKey {
            storage: self.storage_addr(),
            first,
            second,
            reducing: false,
        }
    }

    fn plain(&self) -> &Buffer<'_, T> {
        self
    }
}

impl<T: Item> BufOps<T> for Buffer<'_, T> {
    #[inline]
    fn len(&self) -> usize {
        match self {
            Buffer::Empty => 0,
            Buffer::DenseArray(a) | Buffer::StridedArray(a) => a.len(),
            Buffer::DenseMatrix(m) | Buffer::StridedMatrix(m) => m.len(),
            Buffer::Scalar(_) | Buffer::Shared(_) => 1,
            Buffer::DenseSharedArray(s) | Buffer::StridedSharedArray(s) => s.len(),
        }
    }

    #[inline]
    fn get(&self, i: usize) -> T {
        match self {
            Buffer::Empty => out_of_bounds(i, 0),
            Buffer::DenseArray(a) | Buffer::StridedArray(a) => a.cell(i).get(),
            Buffer::DenseMatrix(m) | Buffer::StridedMatrix(m) => m.cell(i).get(),
            Buffer::Scalar(cell) => {
                check_single(i);
                cell.get()
            }
            Buffer::Shared(cell) => {
                check_single(i);
                cell.get()
            }
            Buffer::DenseSharedArray(s) | Buffer::StridedSharedArray(s) => s.get(i),
        }
    }

    #[inline]
    fn put(&self, i: usize, value: T) {
        self.store(i, value, None);
    }

    fn copy_from<S: BufOps<T>>(&self, src: &S) {
        use sealed::Sealed;
        if src.view_key() == self.view_key() {
            return;
        }
        if reduce_arrays::lockstep(src.plain(), self, None) {
            return;
        }
        default_copy(src, self);
    }

    fn pack<W: BufMut>(&self, start: usize, window: &mut W) -> usize {
        let len = self.len();
        assert!(start <= len, "start {} past buffer length {}", start, len);
        let n = (len - start).min(items_in::<T>(window.remaining_mut()));
        if n == 0 {
            return 0;
        }
        match self {
            Buffer::Empty => {}
            Buffer::DenseArray(a) => a.pack_dense(start, n, window),
            Buffer::StridedArray(a) => a.pack_strided(start, n, window),
            Buffer::DenseMatrix(m) => m.pack_dense(start, n, window),
            Buffer::StridedMatrix(m) => m.pack_strided(start, n, window),
            Buffer::Scalar(cell) => cell.get().put_be(window),
            Buffer::Shared(cell) => cell.get().put_be(window),
            Buffer::DenseSharedArray(s) => s.pack_dense(start, n, window),
            Buffer::StridedSharedArray(s) => s.pack_strided(start, n, window),
        }
        tracing::trace!(variant = self.variant_name(), start, items = n, "packed window");
        n
    }

    fn unpack<R: bytes::Buf>(&self, start: usize, max_items: usize, window: &mut R) -> usize {
        self.receive(start, max_items, window, None)
    }

    fn reduction(&self, op: ReduceOp<T>) -> Result<ReductionBuffer<'_, '_, T>> {
        Ok(ReductionBuffer::new(self, op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MpError, Op, OpTable, Range, SharedArray};

    #[test]
    fn test_storage_views_caller_memory() {
        let mut data = vec![1i32, 2, 3];
        let storage = Storage::from(&mut data);
        storage.cells()[1].set(20);
        assert_eq!(storage.len(), 3);
        assert_eq!(data, vec![1, 20, 3]);
    }

    #[test]
    fn test_storage_debug_reports_length() {
        let mut data = vec![String::from("a"), String::from("b")];
        let storage = Storage::from(&mut data);
        assert_eq!(format!("{storage:?}"), "Storage { len: 2 }");
    }

    #[test]
    fn test_scalar_get_put() {
        let b = Buffer::scalar(Some(3.5f64));
        assert_eq!(b.len(), 1);
        assert_eq!(b.get(0), 3.5);
        b.put(0, -1.0);
        assert_eq!(b.item(), Some(-1.0));
        assert_eq!(b.item_type(), ItemType::Float64);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_scalar_index_one_panics() {
        Buffer::scalar(Some(1i8)).get(1);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_empty_get_panics() {
        Buffer::<i32>::empty().get(0);
    }

    #[test]
    fn test_fill_default_is_zero() {
        let mut data = [5i16; 4];
        let b = Buffer::whole_array(&mut data);
        b.fill(Some(9));
        assert_eq!(b.get(3), 9);
        b.fill(None);
        assert_eq!(data, [0; 4]);
    }

    #[test]
    fn test_pack_stops_at_whole_items() {
        let mut data = [0x0102_0304i32, 0x0506_0708];
        let b = Buffer::whole_array(&mut data);
        let mut bytes = [0u8; 7];
        let mut window = &mut bytes[..];
        assert_eq!(b.pack(0, &mut window), 1);
        assert_eq!(window.len(), 3);
        assert_eq!(&bytes[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_pack_at_end_writes_nothing() {
        let mut data = [1u16, 2];
        let b = Buffer::whole_array(&mut data);
        let mut out = Vec::new();
        assert_eq!(b.pack(2, &mut out), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_shared_cell_put_assigns_and_reduction_folds() {
        let cell = SharedCell::new(4i64);
        let b = Buffer::shared_cell(&cell);
        b.put(0, 10);
        assert_eq!(cell.get(), 10);
        let sum = OpTable::<i64>::new().get(Op::Sum).unwrap();
        let r = b.reduction(sum).unwrap();
        r.put(0, 5);
        assert_eq!(cell.get(), 15);
        let mut wire = Vec::new();
        7i64.put_be(&mut wire);
        assert_eq!(r.unpack(0, 1, &mut &wire[..]), 1);
        assert_eq!(cell.get(), 22);
    }

    #[test]
    fn test_copy_onto_same_view_is_noop() {
        let shared = SharedArray::from(&[1i32, 2, 3, 4][..]);
        let a = Buffer::shared_array(&shared);
        let b = Buffer::shared_array(&shared);
        let sum = OpTable::<i32>::new().get(Op::Sum).unwrap();
        a.copy_from(&b);
        a.copy_from(&a);
        assert_eq!(shared.to_vec(), vec![1, 2, 3, 4]);

        // A reducing view is a different view: folding onto itself doubles.
        let r = a.reduction(sum).unwrap();
        r.copy_from(&b);
        assert_eq!(shared.to_vec(), vec![2, 4, 6, 8]);
        r.copy_from(&r);
        assert_eq!(shared.to_vec(), vec![2, 4, 6, 8]);
    }

    #[test]
    fn test_nested_reduction_rejected() {
        let mut data = [0i32; 2];
        let b = Buffer::whole_array(&mut data);
        let max = OpTable::<i32>::new().get(Op::Max).unwrap();
        let r = b.reduction(max).unwrap();
        assert!(matches!(
            r.reduction(max),
            Err(MpError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_debug_names_variant() {
        let mut data = [0u16; 6];
        let b = Buffer::array_slice(&mut data, Range::with_stride(0, 4, 2).unwrap()).unwrap();
        let text = format!("{b:?}");
        assert!(text.contains("strided_array"));
        assert!(text.contains("Char"));
    }
}
