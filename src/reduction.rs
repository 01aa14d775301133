use bytes::BufMut;

use crate::buf::sealed::{Sealed, ViewKey};
use crate::buf::{default_copy, BufOps, Buffer};
use crate::reduce_arrays;
use crate::{Item, MpError, ReduceOp, Result};

/// A view that folds every write into its base buffer's storage.
///
/// Reads delegate to the base. `put(i, v)` stores `op(get(i), v)`, and an
/// `unpack` folds each decoded item the same way, so reduction fragments
/// may arrive in any order and any chunking. A shared-cell base folds
/// through the cell's atomic `reduce`.
pub struct ReductionBuffer<'r, 'a, T: Item> {
    base: &'r Buffer<'a, T>,
    op: ReduceOp<T>,
}

impl<'r, 'a, T: Item> ReductionBuffer<'r, 'a, T> {
    pub(crate) fn new(base: &'r Buffer<'a, T>, op: ReduceOp<T>) -> Self {
        tracing::debug!(
            variant = base.variant_name(),
            item_type = %T::TYPE,
            len = base.len(),
            op = op.name(),
            "created reduction buffer"
        );
        Self { base, op }
    }

    pub fn base(&self) -> &'r Buffer<'a, T> {
        self.base
    }

    pub fn op(&self) -> ReduceOp<T> {
        self.op
    }
}

impl<T: Item> std::fmt::Debug for ReductionBuffer<'_, '_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReductionBuffer")
            .field("base", self.base)
            .field("op", &self.op)
            .finish()
    }
}

impl<T: Item> Sealed<T> for ReductionBuffer<'_, '_, T> {
    fn view_key(&self) -> ViewKey {
        ViewKey {
            reducing: true,
            ..self.base.view_key()
        }
    }

    fn plain(&self) -> &Buffer<'_, T> {
        self.base
    }
}

impl<T: Item> BufOps<T> for ReductionBuffer<'_, '_, T> {
    #[inline]
    fn len(&self) -> usize {
        self.base.len()
    }

    #[inline]
    fn get(&self, i: usize) -> T {
        self.base.get(i)
    }

    #[inline]
    fn put(&self, i: usize, value: T) {
        self.base.store(i, value, Some(&self.op));
    }

    fn copy_from<S: BufOps<T>>(&self, src: &S) {
        if src.view_key() == self.view_key() {
            return;
        }
        if reduce_arrays::lockstep(src.plain(), self.base, Some(&self.op)) {
            return;
        }
        default_copy(src, self);
    }

    fn pack<W: BufMut>(&self, start: usize, window: &mut W) -> usize {
        self.base.pack(start, window)
    }

    fn unpack<R: bytes::Buf>(&self, start: usize, max_items: usize, window: &mut R) -> usize {
        self.base.receive(start, max_items, window, Some(&self.op))
    }

    fn reduction(&self, _op: ReduceOp<T>) -> Result<ReductionBuffer<'_, '_, T>> {
        Err(MpError::UnsupportedOperation(
            "reduction of a reduction buffer",
        ))
    }
}
