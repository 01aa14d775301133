//! Typed, strided message-passing buffers with in-place reduction.
//!
//! A buffer is a fixed-length logical view over caller-owned storage (a
//! dense or strided array slice, a row/column/patch of a row-major matrix,
//! a scalar, or a lock-free shared cell). The communication engine drains a
//! buffer into successive byte windows with [`BufOps::pack`] and fills one
//! from successive windows with [`BufOps::unpack`]. Wrapping the destination
//! in a [`ReductionBuffer`] folds each received item into storage with an
//! associative operator instead of overwriting it.
//!
//! # Core Types
//!
//! - [`Range`]: immutable `(lower, upper, stride)` index set
//! - [`Buffer`]: closed set of storage variants behind the [`BufOps`] capability
//! - [`ReductionBuffer`]: write-path decorator applying a [`ReduceOp`]
//! - [`SharedCell`] / [`SharedArray`]: lock-free cells with atomic `reduce`
//! - [`DynBuffer`]: runtime-typed buffer reporting [`MpError::TypeMismatch`]
//! - [`ObjectBuf`]: serializable values, encoded lazily (feature `object`)
//!
//! # Canonical Order
//!
//! Every variant visits items in row-major order: logical index `i` of a
//! matrix view is row `i / cols`, column `i % cols`. Two peers that build
//! the "same" view therefore agree on the byte stream.
//!
//! # Example
//!
//! ```rust
//! use strided_mp::{BufOps, Buffer, Matrix, Op, OpTable, Range};
//!
//! let mut data = vec![1, 2, 3, 4, 5, 6, 7, 8, 9];
//! let m = Matrix::new(&mut data, 3, 3).unwrap();
//! let patch = Buffer::patch(m, Range::new(0, 1).unwrap(), Range::new(1, 2).unwrap()).unwrap();
//!
//! let mut wire = Vec::new();
//! assert_eq!(patch.pack(0, &mut wire), 4);
//!
//! let mut target = vec![0; 4];
//! let dst = Buffer::whole_array(&mut target);
//! let max = OpTable::<i32>::new().get(Op::Max).unwrap();
//! let reducing = dst.reduction(max).unwrap();
//! reducing.unpack(0, 4, &mut &wire[..]);
//! assert_eq!(target, vec![2, 3, 5, 6]);
//! ```

mod buf;
mod cell;
mod dyn_buf;
mod factory;
mod index;
#[cfg(feature = "object")]
mod object;
mod range;
pub mod reduce_arrays;
mod reduction;
mod transfer;

// ============================================================================
// Item types and operators
// ============================================================================
pub use strided_mp_traits::{Item, ItemType, Op, OpTable, ReduceOp, Reducible};

// ============================================================================
// Views
// ============================================================================
pub use buf::{ArrayBuf, BufOps, Buffer, Matrix, MatrixBuf, SharedArrayBuf, Storage};
pub use index::{map_array_index, map_matrix_index, ArrayMap, MatrixMap};
pub use range::Range;
pub use reduction::ReductionBuffer;

// ============================================================================
// Shared storage
// ============================================================================
pub use cell::{SharedArray, SharedCell};

// ============================================================================
// Transfer and runtime typing
// ============================================================================
pub use dyn_buf::{DynBuffer, DynItem, Registry, Value};
pub use transfer::{skip_items, Packer, Unpacker};

#[cfg(feature = "object")]
pub use object::{ObjectBuf, ObjectReductionBuf};

// ============================================================================
// Error types
// ============================================================================

/// Errors raised while building or combining buffers.
///
/// All of them are local, synchronous contract failures reported to the
/// immediate caller; nothing in this crate retries.
#[derive(Debug, thiserror::Error)]
pub enum MpError {
    /// Malformed range bounds or stride.
    #[error("invalid range: lower={lower}, upper={upper}, stride={stride}")]
    InvalidRange { lower: i64, upper: i64, stride: i64 },

    /// A requested slice does not lie within the backing storage.
    #[error("{what} {range} does not fit storage extent {extent}")]
    IndexOutOfBounds {
        what: &'static str,
        range: Range,
        extent: usize,
    },

    /// Matrix storage length disagrees with its declared shape.
    #[error("matrix storage of {len} items cannot hold {rows}x{cols}")]
    ShapeMismatch { len: usize, rows: usize, cols: usize },

    /// Two patches combined element-wise have different shapes.
    #[error("patch shape mismatch: {src:?} vs {dst:?}")]
    PatchShapeMismatch {
        src: (usize, usize),
        dst: (usize, usize),
    },

    /// Item types of two buffers, or of a buffer and a value, differ.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: ItemType,
        found: ItemType,
    },

    /// The operation is not composable with this buffer or item type.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// Encoding an object buffer failed.
    #[error("object encoding failed: {0}")]
    Encode(String),

    /// An incoming object message could not be decoded.
    #[error("object decoding failed: {0}")]
    Decode(String),
}

/// Result type for buffer operations.
pub type Result<T> = std::result::Result<T, MpError>;
