//! Primitive item types and their wire encoding.
//!
//! Every item crosses the wire most-significant-byte first with a fixed
//! width and no tag, so both peers must agree on the item type beforehand:
//!
//! ```text
//!   type    | Rust | bytes
//! ----------|------|------
//!   Bool    | bool | 1
//!   Int8    | i8   | 1
//!   Int16   | i16  | 2
//!   Int32   | i32  | 4
//!   Int64   | i64  | 8
//!   Float32 | f32  | 4
//!   Float64 | f64  | 8
//!   Char    | u16  | 2   (UTF-16 code unit)
//! ```
//!
//! `Object` items have no fixed width; they are encoded as a whole message
//! by the object buffers of the root crate.

use std::fmt;

/// Tag naming the item type carried by a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Char,
    Object,
}

impl ItemType {
    /// Encoded width in bytes, or `None` for variable-size object items.
    pub const fn width(self) -> Option<usize> {
        match self {
            ItemType::Bool | ItemType::Int8 => Some(1),
            ItemType::Int16 | ItemType::Char => Some(2),
            ItemType::Int32 | ItemType::Float32 => Some(4),
            ItemType::Int64 | ItemType::Float64 => Some(8),
            ItemType::Object => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ItemType::Bool => "bool",
            ItemType::Int8 => "int8",
            ItemType::Int16 => "int16",
            ItemType::Int32 => "int32",
            ItemType::Int64 => "int64",
            ItemType::Float32 => "float32",
            ItemType::Float64 => "float64",
            ItemType::Char => "char",
            ItemType::Object => "object",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fixed-width primitive that can be stored in a buffer and sent over
/// the wire.
///
/// `Bits` is the representation used for lock-free shared storage: the
/// item itself for integers and `bool`, the IEEE bit pattern for floats.
/// Compare-and-swap on `Bits` is exact even for NaN payloads.
pub trait Item: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Wire type tag.
    const TYPE: ItemType;

    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Bit representation usable with atomic compare-and-swap.
    type Bits: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    /// The value `fill(None)` stores.
    fn zero() -> Self;

    fn to_bits(self) -> Self::Bits;

    fn from_bits(bits: Self::Bits) -> Self;

    /// Write `self` big-endian, advancing `dst` by [`Self::WIDTH`] bytes.
    ///
    /// The caller guarantees `dst.remaining_mut() >= Self::WIDTH`.
    fn put_be<B: bytes::BufMut>(self, dst: &mut B);

    /// Read one big-endian item, advancing `src` by [`Self::WIDTH`] bytes.
    ///
    /// The caller guarantees `src.remaining() >= Self::WIDTH`.
    fn get_be<B: bytes::Buf>(src: &mut B) -> Self;
}

impl Item for bool {
    const TYPE: ItemType = ItemType::Bool;
    const WIDTH: usize = 1;
    type Bits = bool;

    #[inline(always)]
    fn zero() -> Self {
        false
    }

    #[inline(always)]
    fn to_bits(self) -> bool {
        self
    }

    #[inline(always)]
    fn from_bits(bits: bool) -> Self {
        bits
    }

    #[inline(always)]
    fn put_be<B: bytes::BufMut>(self, dst: &mut B) {
        dst.put_u8(self as u8);
    }

    #[inline(always)]
    fn get_be<B: bytes::Buf>(src: &mut B) -> Self {
        src.get_u8() != 0
    }
}

// Integers: the bit representation is the value itself.
macro_rules! impl_item_int {
    ($($t:ty => $tag:ident, $put:ident, $get:ident;)*) => {
        $(
            impl Item for $t {
                const TYPE: ItemType = ItemType::$tag;
                const WIDTH: usize = std::mem::size_of::<$t>();
                type Bits = $t;

                #[inline(always)]
                fn zero() -> Self {
                    0
                }

                #[inline(always)]
                fn to_bits(self) -> $t {
                    self
                }

                #[inline(always)]
                fn from_bits(bits: $t) -> Self {
                    bits
                }

                #[inline(always)]
                fn put_be<B: bytes::BufMut>(self, dst: &mut B) {
                    dst.$put(self);
                }

                #[inline(always)]
                fn get_be<B: bytes::Buf>(src: &mut B) -> Self {
                    src.$get()
                }
            }
        )*
    };
}

impl_item_int! {
    i8 => Int8, put_i8, get_i8;
    i16 => Int16, put_i16, get_i16;
    i32 => Int32, put_i32, get_i32;
    i64 => Int64, put_i64, get_i64;
    u16 => Char, put_u16, get_u16;
}

macro_rules! impl_item_float {
    ($($t:ty => $tag:ident, $bits:ty, $put:ident, $get:ident;)*) => {
        $(
            impl Item for $t {
                const TYPE: ItemType = ItemType::$tag;
                const WIDTH: usize = std::mem::size_of::<$t>();
                type Bits = $bits;

                #[inline(always)]
                fn zero() -> Self {
                    0.0
                }

                #[inline(always)]
                fn to_bits(self) -> $bits {
                    <$t>::to_bits(self)
                }

                #[inline(always)]
                fn from_bits(bits: $bits) -> Self {
                    <$t>::from_bits(bits)
                }

                #[inline(always)]
                fn put_be<B: bytes::BufMut>(self, dst: &mut B) {
                    dst.$put(self);
                }

                #[inline(always)]
                fn get_be<B: bytes::Buf>(src: &mut B) -> Self {
                    src.$get()
                }
            }
        )*
    };
}

impl_item_float! {
    f32 => Float32, u32, put_f32, get_f32;
    f64 => Float64, u64, put_f64, get_f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: Item>(value: T) -> Vec<u8> {
        let mut out = Vec::new();
        value.put_be(&mut out);
        out
    }

    #[test]
    fn test_widths_match_tags() {
        fn check<T: Item>() {
            assert_eq!(T::TYPE.width(), Some(T::WIDTH), "{}", T::TYPE);
        }
        check::<bool>();
        check::<i8>();
        check::<i16>();
        check::<i32>();
        check::<i64>();
        check::<f32>();
        check::<f64>();
        check::<u16>();
        assert_eq!(ItemType::Object.width(), None);
    }

    #[test]
    fn test_most_significant_byte_first() {
        assert_eq!(encode(0x0102_i16), vec![0x01, 0x02]);
        assert_eq!(encode(0x0102_0304_i32), vec![0x01, 0x02, 0x03, 0x04]);
        assert_eq!(
            encode(0x0102_0304_0506_0708_i64),
            vec![1, 2, 3, 4, 5, 6, 7, 8]
        );
        assert_eq!(encode(-1_i8), vec![0xff]);
        assert_eq!(encode(true), vec![1]);
        assert_eq!(encode(1.0_f64), vec![0x3f, 0xf0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(encode(1.0_f32), vec![0x3f, 0x80, 0, 0]);
        assert_eq!(encode(b'A' as u16), vec![0x00, 0x41]);
    }

    #[test]
    fn test_decode_advances_source() {
        let bytes = [0x00u8, 0x2a, 0xff, 0xfe];
        let mut src = &bytes[..];
        assert_eq!(i16::get_be(&mut src), 42);
        assert_eq!(src.len(), 2);
        assert_eq!(i16::get_be(&mut src), -2);
        assert!(src.is_empty());
    }

    #[test]
    fn test_nonzero_byte_decodes_as_true() {
        let mut src = &[7u8][..];
        assert!(bool::get_be(&mut src));
    }

    #[test]
    fn test_float_bits_preserve_nan() {
        let nan = f64::from_bits(0x7ff8_0000_0000_1234);
        let back = <f64 as Item>::from_bits(<f64 as Item>::to_bits(nan));
        assert_eq!(back.to_bits(), nan.to_bits());
    }
}
