//! Runtime-typed buffers.
//!
//! A transport that learns the item type from a message header cannot name
//! `T` statically. [`DynBuffer`] dispatches over the primitive item types at
//! runtime and reports a type disagreement as [`MpError::TypeMismatch`]
//! instead of refusing to compile.

use bytes::BufMut;

use crate::buf::{BufOps, Buffer};
use crate::{ItemType, MpError, Op, OpTable, Reducible, Result};

/// A single item of any primitive type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Char(u16),
}

impl Value {
    pub fn item_type(&self) -> ItemType {
        match self {
            Value::Bool(_) => ItemType::Bool,
            Value::Int8(_) => ItemType::Int8,
            Value::Int16(_) => ItemType::Int16,
            Value::Int32(_) => ItemType::Int32,
            Value::Int64(_) => ItemType::Int64,
            Value::Float32(_) => ItemType::Float32,
            Value::Float64(_) => ItemType::Float64,
            Value::Char(_) => ItemType::Char,
        }
    }
}

/// A buffer whose item type is known only at runtime.
#[derive(Debug)]
pub enum DynBuffer<'a> {
    Bool(Buffer<'a, bool>),
    Int8(Buffer<'a, i8>),
    Int16(Buffer<'a, i16>),
    Int32(Buffer<'a, i32>),
    Int64(Buffer<'a, i64>),
    Float32(Buffer<'a, f32>),
    Float64(Buffer<'a, f64>),
    Char(Buffer<'a, u16>),
}

/// Operator tables for every primitive item type.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    bool: OpTable<bool>,
    int8: OpTable<i8>,
    int16: OpTable<i16>,
    int32: OpTable<i32>,
    int64: OpTable<i64>,
    float32: OpTable<f32>,
    float64: OpTable<f64>,
    char: OpTable<u16>,
}

/// An item type a [`DynBuffer`] can hold.
pub trait DynItem: Reducible {
    fn table(registry: &Registry) -> &OpTable<Self>;

    fn table_mut(registry: &mut Registry) -> &mut OpTable<Self>;

    fn value(self) -> Value;

    fn from_value(value: Value) -> Option<Self>;

    fn wrap(buf: Buffer<'_, Self>) -> DynBuffer<'_>;

    fn unwrap_ref<'b, 'a>(buf: &'b DynBuffer<'a>) -> Option<&'b Buffer<'a, Self>>;
}

macro_rules! impl_dyn_item {
    ($($t:ty => $variant:ident, $field:ident;)*) => {
        $(
            impl DynItem for $t {
                fn table(registry: &Registry) -> &OpTable<Self> {
                    &registry.$field
                }

                fn table_mut(registry: &mut Registry) -> &mut OpTable<Self> {
                    &mut registry.$field
                }

                fn value(self) -> Value {
                    Value::$variant(self)
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn wrap(buf: Buffer<'_, Self>) -> DynBuffer<'_> {
                    DynBuffer::$variant(buf)
                }

                fn unwrap_ref<'b, 'a>(buf: &'b DynBuffer<'a>) -> Option<&'b Buffer<'a, Self>> {
                    match buf {
                        DynBuffer::$variant(b) => Some(b),
                        _ => None,
                    }
                }
            }

            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }

            impl<'a> From<Buffer<'a, $t>> for DynBuffer<'a> {
                fn from(buf: Buffer<'a, $t>) -> Self {
                    DynBuffer::$variant(buf)
                }
            }
        )*
    };
}

impl_dyn_item! {
    bool => Bool, bool;
    i8 => Int8, int8;
    i16 => Int16, int16;
    i32 => Int32, int32;
    i64 => Int64, int64;
    f32 => Float32, float32;
    f64 => Float64, float64;
    u16 => Char, char;
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table<T: DynItem>(&self) -> &OpTable<T> {
        T::table(self)
    }

    /// Install or replace the implementation of `op` for `T`.
    pub fn register<T: DynItem>(&mut self, op: Op, f: fn(T, T) -> T) {
        T::table_mut(self).register(op, f);
    }
}

/// Run `$body` with `$b` bound to the typed buffer inside `$buf`.
macro_rules! with_buf {
    ($buf:expr, |$b:ident| $body:expr) => {
        match $buf {
            DynBuffer::Bool($b) => $body,
            DynBuffer::Int8($b) => $body,
            DynBuffer::Int16($b) => $body,
            DynBuffer::Int32($b) => $body,
            DynBuffer::Int64($b) => $body,
            DynBuffer::Float32($b) => $body,
            DynBuffer::Float64($b) => $body,
            DynBuffer::Char($b) => $body,
        }
    };
}

/// Run `$body` when both buffers hold the same item type.
macro_rules! with_pair {
    ($dst:expr, $src:expr, |$d:ident, $s:ident| $body:expr) => {
        match ($dst, $src) {
            (DynBuffer::Bool($d), DynBuffer::Bool($s)) => $body,
            (DynBuffer::Int8($d), DynBuffer::Int8($s)) => $body,
            (DynBuffer::Int16($d), DynBuffer::Int16($s)) => $body,
            (DynBuffer::Int32($d), DynBuffer::Int32($s)) => $body,
            (DynBuffer::Int64($d), DynBuffer::Int64($s)) => $body,
            (DynBuffer::Float32($d), DynBuffer::Float32($s)) => $body,
            (DynBuffer::Float64($d), DynBuffer::Float64($s)) => $body,
            (DynBuffer::Char($d), DynBuffer::Char($s)) => $body,
            (d, s) => Err(MpError::TypeMismatch {
                expected: d.item_type(),
                found: s.item_type(),
            }),
        }
    };
}

fn typed_value<T: DynItem>(value: Value) -> Result<T> {
    T::from_value(value).ok_or(MpError::TypeMismatch {
        expected: T::TYPE,
        found: value.item_type(),
    })
}

fn lookup<T: DynItem>(registry: &Registry, op: Op) -> Result<crate::ReduceOp<T>> {
    registry.table::<T>().get(op).ok_or_else(|| {
        tracing::warn!(op = %op, item_type = %T::TYPE, "operator not defined");
        MpError::UnsupportedOperation("operator not defined for this item type")
    })
}

fn reduce_typed<T: DynItem>(
    dst: &Buffer<'_, T>,
    src: &Buffer<'_, T>,
    op: Op,
    registry: &Registry,
) -> Result<()> {
    let f = lookup::<T>(registry, op)?;
    dst.reduction(f)?.copy_from(src);
    Ok(())
}

fn unpack_reduce_typed<T: DynItem, R: bytes::Buf>(
    dst: &Buffer<'_, T>,
    start: usize,
    max_items: usize,
    window: &mut R,
    op: Op,
    registry: &Registry,
) -> Result<usize> {
    let f = lookup::<T>(registry, op)?;
    Ok(dst.reduction(f)?.unpack(start, max_items, window))
}

impl<'a> DynBuffer<'a> {
    pub fn new<T: DynItem>(buf: Buffer<'a, T>) -> Self {
        T::wrap(buf)
    }

    pub fn item_type(&self) -> ItemType {
        with_buf!(self, |b| b.item_type())
    }

    pub fn len(&self) -> usize {
        with_buf!(self, |b| b.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the typed buffer, if this holds `T` items.
    pub fn downcast<T: DynItem>(&self) -> Result<&Buffer<'a, T>> {
        T::unwrap_ref(self).ok_or(MpError::TypeMismatch {
            expected: T::TYPE,
            found: self.item_type(),
        })
    }

    pub fn get(&self, i: usize) -> Value {
        with_buf!(self, |b| b.get(i).value())
    }

    pub fn put(&self, i: usize, value: Value) -> Result<()> {
        with_buf!(self, |b| {
            b.put(i, typed_value(value)?);
            Ok(())
        })
    }

    /// Typed copy; fails without touching storage when item types differ.
    pub fn copy_from(&self, src: &DynBuffer<'_>) -> Result<()> {
        with_pair!(self, src, |d, s| {
            d.copy_from(s);
            Ok(())
        })
    }

    pub fn fill(&self, value: Option<Value>) -> Result<()> {
        match value {
            None => with_buf!(self, |b| b.fill(None)),
            Some(v) => with_buf!(self, |b| b.fill(Some(typed_value(v)?))),
        }
        Ok(())
    }

    /// Fold `src` into `self` with `op` from `registry`.
    pub fn reduce_from(&self, src: &DynBuffer<'_>, op: Op, registry: &Registry) -> Result<()> {
        with_pair!(self, src, |d, s| reduce_typed(d, s, op, registry))
    }

    pub fn pack<W: BufMut>(&self, start: usize, window: &mut W) -> usize {
        with_buf!(self, |b| b.pack(start, window))
    }

    pub fn unpack<R: bytes::Buf>(&self, start: usize, max_items: usize, window: &mut R) -> usize {
        with_buf!(self, |b| b.unpack(start, max_items, window))
    }

    /// Decode and fold into storage with `op`.
    pub fn unpack_reduce<R: bytes::Buf>(
        &self,
        start: usize,
        max_items: usize,
        window: &mut R,
        op: Op,
        registry: &Registry,
    ) -> Result<usize> {
        with_buf!(self, |b| unpack_reduce_typed(
            b, start, max_items, window, op, registry
        ))
    }
}
