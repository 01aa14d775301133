//! Associative reduction operators keyed by primitive type.
//!
//! A reduction folds an incoming value into the stored one:
//! `stored = op(stored, incoming)`. Fragments of one message may arrive in
//! any order across peers, so every operator here is associative and, for
//! the built-in set, commutative.
//!
//! Operators are plain `fn(T, T) -> T` pointers: they cannot capture state.
//!
//! ```text
//!   family          | Sum Product Min Max | And Or Xor | LogicalAnd LogicalOr
//! ------------------|---------------------|------------|---------------------
//!   i8 i16 i32 i64  |  x     x     x   x  |  x   x  x  |
//!   u16 (char)      |  x     x     x   x  |  x   x  x  |
//!   f32 f64         |  x     x     x   x  |            |
//!   bool            |                     |  x   x  x  |     x          x
//! ```
//!
//! Integer sum and product wrap on overflow. Float operators follow IEEE
//! arithmetic; `min` and `max` propagate NaN, so a NaN from any peer
//! survives the reduction.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor};

use num_traits::{Float, WrappingAdd, WrappingMul};

use crate::item::Item;

/// Built-in operator names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Sum,
    Product,
    Min,
    Max,
    And,
    Or,
    Xor,
    LogicalAnd,
    LogicalOr,
}

impl Op {
    pub const COUNT: usize = 9;

    pub const ALL: [Op; Op::COUNT] = [
        Op::Sum,
        Op::Product,
        Op::Min,
        Op::Max,
        Op::And,
        Op::Or,
        Op::Xor,
        Op::LogicalAnd,
        Op::LogicalOr,
    ];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Op::Sum => "sum",
            Op::Product => "product",
            Op::Min => "min",
            Op::Max => "max",
            Op::And => "and",
            Op::Or => "or",
            Op::Xor => "xor",
            Op::LogicalAnd => "logical_and",
            Op::LogicalOr => "logical_or",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named binary operator over `T`.
pub struct ReduceOp<T> {
    name: &'static str,
    f: fn(T, T) -> T,
}

impl<T> Clone for ReduceOp<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReduceOp<T> {}

impl<T> fmt::Debug for ReduceOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReduceOp").field("name", &self.name).finish()
    }
}

impl<T> ReduceOp<T> {
    /// Wrap a caller-supplied operator. It must be associative and total
    /// over every representable `T`.
    pub const fn custom(name: &'static str, f: fn(T, T) -> T) -> Self {
        Self { name, f }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline(always)]
    pub fn apply(&self, stored: T, incoming: T) -> T {
        (self.f)(stored, incoming)
    }

    #[inline]
    pub fn as_fn(&self) -> fn(T, T) -> T {
        self.f
    }
}

/// Item types with a built-in operator set.
pub trait Reducible: Item {
    /// The implementation of `op` for this type, or `None` when the type
    /// family does not define it.
    fn operator(op: Op) -> Option<fn(Self, Self) -> Self>;
}

/// Explicit operator-to-function mapping for one item type.
///
/// Built once (typically at startup) and handed by reference to whatever
/// constructs reduction buffers; there is no global registry.
pub struct OpTable<T> {
    entries: [Option<fn(T, T) -> T>; Op::COUNT],
}

impl<T> Clone for OpTable<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries,
        }
    }
}

impl<T> fmt::Debug for OpTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Op::ALL
            .iter()
            .filter(|op| self.entries[op.index()].is_some())
            .map(|op| op.name())
            .collect();
        f.debug_struct("OpTable").field("ops", &names).finish()
    }
}

impl<T: Reducible> OpTable<T> {
    pub fn new() -> Self {
        let mut entries: [Option<fn(T, T) -> T>; Op::COUNT] = [None; Op::COUNT];
        for op in Op::ALL {
            entries[op.index()] = T::operator(op);
        }
        Self { entries }
    }
}

impl<T: Reducible> Default for OpTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OpTable<T> {
    /// Look up `op`; `None` when the item family does not support it.
    pub fn get(&self, op: Op) -> Option<ReduceOp<T>> {
        self.entries[op.index()].map(|f| ReduceOp::custom(op.name(), f))
    }

    pub fn supports(&self, op: Op) -> bool {
        self.entries[op.index()].is_some()
    }

    /// Replace (or add) the function behind `op`.
    pub fn register(&mut self, op: Op, f: fn(T, T) -> T) {
        self.entries[op.index()] = Some(f);
    }

    pub fn supported(&self) -> impl Iterator<Item = Op> + '_ {
        Op::ALL
            .into_iter()
            .filter(move |op| self.entries[op.index()].is_some())
    }
}

// ---------------------------------------------------------------------------
// Generic operator bodies
// ---------------------------------------------------------------------------

#[inline(always)]
fn wrapping_sum<T: WrappingAdd>(a: T, b: T) -> T {
    a.wrapping_add(&b)
}

#[inline(always)]
fn wrapping_product<T: WrappingMul>(a: T, b: T) -> T {
    a.wrapping_mul(&b)
}

#[inline(always)]
fn ord_min<T: Ord>(a: T, b: T) -> T {
    std::cmp::min(a, b)
}

#[inline(always)]
fn ord_max<T: Ord>(a: T, b: T) -> T {
    std::cmp::max(a, b)
}

#[inline(always)]
fn float_sum<T: Float>(a: T, b: T) -> T {
    a + b
}

#[inline(always)]
fn float_product<T: Float>(a: T, b: T) -> T {
    a * b
}

#[inline(always)]
fn float_min<T: Float>(a: T, b: T) -> T {
    if a.is_nan() || b.is_nan() {
        T::nan()
    } else {
        a.min(b)
    }
}

#[inline(always)]
fn float_max<T: Float>(a: T, b: T) -> T {
    if a.is_nan() || b.is_nan() {
        T::nan()
    } else {
        a.max(b)
    }
}

#[inline(always)]
fn bit_and<T: BitAnd<Output = T>>(a: T, b: T) -> T {
    a & b
}

#[inline(always)]
fn bit_or<T: BitOr<Output = T>>(a: T, b: T) -> T {
    a | b
}

#[inline(always)]
fn bit_xor<T: BitXor<Output = T>>(a: T, b: T) -> T {
    a ^ b
}

macro_rules! impl_reducible_int {
    ($($t:ty),*) => {
        $(
            impl Reducible for $t {
                fn operator(op: Op) -> Option<fn(Self, Self) -> Self> {
                    let f: fn($t, $t) -> $t = match op {
                        Op::Sum => wrapping_sum::<$t>,
                        Op::Product => wrapping_product::<$t>,
                        Op::Min => ord_min::<$t>,
                        Op::Max => ord_max::<$t>,
                        Op::And => bit_and::<$t>,
                        Op::Or => bit_or::<$t>,
                        Op::Xor => bit_xor::<$t>,
                        Op::LogicalAnd | Op::LogicalOr => return None,
                    };
                    Some(f)
                }
            }
        )*
    };
}

impl_reducible_int!(i8, i16, i32, i64, u16);

macro_rules! impl_reducible_float {
    ($($t:ty),*) => {
        $(
            impl Reducible for $t {
                fn operator(op: Op) -> Option<fn(Self, Self) -> Self> {
                    let f: fn($t, $t) -> $t = match op {
                        Op::Sum => float_sum::<$t>,
                        Op::Product => float_product::<$t>,
                        Op::Min => float_min::<$t>,
                        Op::Max => float_max::<$t>,
                        _ => return None,
                    };
                    Some(f)
                }
            }
        )*
    };
}

impl_reducible_float!(f32, f64);

fn logical_and(a: bool, b: bool) -> bool {
    a && b
}

fn logical_or(a: bool, b: bool) -> bool {
    a || b
}

impl Reducible for bool {
    fn operator(op: Op) -> Option<fn(Self, Self) -> Self> {
        let f: fn(bool, bool) -> bool = match op {
            Op::And => bit_and::<bool>,
            Op::Or => bit_or::<bool>,
            Op::Xor => bit_xor::<bool>,
            Op::LogicalAnd => logical_and,
            Op::LogicalOr => logical_or,
            Op::Sum | Op::Product | Op::Min | Op::Max => return None,
        };
        Some(f)
    }
}
