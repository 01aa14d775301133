//! Resumable transfer of one buffer across many byte windows.
//!
//! A transport hands out fixed-capacity windows one at a time. [`Packer`]
//! and [`Unpacker`] remember the next logical index so each call simply
//! continues where the previous window stopped. The receive side also
//! carries the bytes of an item split across two windows, so the incoming
//! stream may be chunked at any byte boundary.

use bytes::BufMut;

use crate::buf::BufOps;
use crate::Item;

/// Send-side cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packer {
    next: usize,
    len: usize,
}

impl Packer {
    /// Cursor for a buffer of `len` items.
    pub fn new(len: usize) -> Self {
        Self { next: 0, len }
    }

    pub fn for_buffer<T: Item, B: BufOps<T>>(buf: &B) -> Self {
        Self::new(buf.len())
    }

    /// Pack the next run of items into `window`; returns the count.
    pub fn pack_into<T: Item, B: BufOps<T>, W: BufMut>(&mut self, buf: &B, window: &mut W) -> usize {
        debug_assert_eq!(buf.len(), self.len, "packer used with a different buffer");
        let n = buf.pack(self.next, window);
        self.next += n;
        n
    }

    /// Items sent so far.
    pub fn position(&self) -> usize {
        self.next
    }

    pub fn remaining(&self) -> usize {
        self.len - self.next
    }

    pub fn is_done(&self) -> bool {
        self.next == self.len
    }
}

/// Receive-side cursor. `expected` is the item count announced by the
/// sender, which may exceed the receiving buffer's length; the surplus is
/// read off the wire and dropped.
///
/// Fewer than one item's worth of trailing bytes in a window are held in
/// `pending` and completed by the next window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpacker {
    next: usize,
    len: usize,
    expected: usize,
    pending: Vec<u8>,
}

impl Unpacker {
    pub fn new(len: usize) -> Self {
        Self::with_expected(len, len)
    }

    pub fn with_expected(len: usize, expected: usize) -> Self {
        Self {
            next: 0,
            len,
            expected,
            pending: Vec::new(),
        }
    }

    /// Unpack as much of `window` as belongs to this message; returns the
    /// number of items completed (stored or skipped), including one whose
    /// leading bytes arrived in an earlier window.
    pub fn unpack_from<T: Item, B: BufOps<T>, R: bytes::Buf>(
        &mut self,
        buf: &B,
        window: &mut R,
    ) -> usize {
        debug_assert_eq!(buf.len(), self.len, "unpacker used with a different buffer");
        let mut consumed = 0;
        if !self.pending.is_empty() {
            let have = self.pending.len();
            let take = (T::WIDTH - have).min(window.remaining());
            self.pending.resize(have + take, 0);
            window.copy_to_slice(&mut self.pending[have..]);
            if self.pending.len() < T::WIDTH {
                return 0;
            }
            let mut carried = std::mem::take(&mut self.pending);
            consumed += self.place::<T, B, &[u8]>(buf, &mut &carried[..]);
            carried.clear();
            self.pending = carried;
        }
        consumed += self.place(buf, window);

        let tail = window.remaining();
        if !self.is_done() && tail > 0 && tail < T::WIDTH {
            self.pending.resize(tail, 0);
            window.copy_to_slice(&mut self.pending);
            tracing::trace!(bytes = tail, position = self.next, "holding split item");
        }
        consumed
    }

    /// Bytes of a split item waiting for the next window.
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    fn place<T: Item, B: BufOps<T>, R: bytes::Buf>(&mut self, buf: &B, window: &mut R) -> usize {
        let mut consumed = 0;
        if self.next < self.len {
            let n = buf.unpack(self.next, self.expected.min(self.len) - self.next, window);
            self.next += n;
            consumed += n;
        }
        if self.next >= self.len && self.next < self.expected {
            let n = skip_items::<T, R>(self.expected - self.next, window);
            self.next += n;
            consumed += n;
        }
        consumed
    }

    /// Items consumed so far, including skipped surplus.
    pub fn position(&self) -> usize {
        self.next
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.expected
    }
}

/// Discard up to `n` whole `T` items from `window`; returns how many were
/// dropped.
pub fn skip_items<T: Item, R: bytes::Buf>(n: usize, window: &mut R) -> usize {
    let n = n.min(window.remaining() / T::WIDTH);
    window.advance(n * T::WIDTH);
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Buffer, Range};

    #[test]
    fn test_packer_spans_windows() {
        let mut data: Vec<i32> = (0..10).collect();
        let b = Buffer::array_slice(&mut data, Range::with_stride(1, 9, 2).unwrap()).unwrap();
        let mut packer = Packer::for_buffer(&b);
        let mut wire = Vec::new();
        let mut counts = Vec::new();
        while !packer.is_done() {
            let mut window = [0u8; 9];
            let mut w = &mut window[..];
            counts.push(packer.pack_into(&b, &mut w));
            let used = 9 - w.len();
            wire.extend_from_slice(&window[..used]);
        }
        assert_eq!(counts, vec![2, 2, 1]);
        assert_eq!(packer.remaining(), 0);
        let values: Vec<i32> = wire
            .chunks(4)
            .map(|c| i32::from_be_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(values, vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_unpacker_skips_surplus() {
        let wire: Vec<u8> = [1i16, 2, 3, 4, 5].iter().flat_map(|v| v.to_be_bytes()).collect();
        let mut data = [0i16; 3];
        {
            let b = Buffer::whole_array(&mut data);
            let mut unpacker = Unpacker::with_expected(3, 5);
            let mut total = 0;
            for chunk in wire.chunks(4) {
                let mut window = chunk;
                total += unpacker.unpack_from(&b, &mut window);
                assert!(window.is_empty());
            }
            assert_eq!(total, 5);
            assert!(unpacker.is_done());
        }
        assert_eq!(data, [1, 2, 3]);
    }

    #[test]
    fn test_unpacker_joins_items_split_across_windows() {
        let wire: Vec<u8> = [1i32, 2, 3].iter().flat_map(|v| v.to_be_bytes()).collect();
        for size in [1, 3, 5, 7] {
            let mut data = [0i32; 3];
            {
                let b = Buffer::whole_array(&mut data);
                let mut unpacker = Unpacker::new(3);
                let mut total = 0;
                for chunk in wire.chunks(size) {
                    let mut window = chunk;
                    total += unpacker.unpack_from(&b, &mut window);
                    assert!(window.is_empty());
                }
                assert_eq!(total, 3, "window size {size}");
                assert!(unpacker.is_done());
                assert_eq!(unpacker.pending_bytes(), 0);
            }
            assert_eq!(data, [1, 2, 3], "window size {size}");
        }
    }

    #[test]
    fn test_unpacker_skips_split_surplus() {
        let wire: Vec<u8> = [7i64, 8, 9].iter().flat_map(|v| v.to_be_bytes()).collect();
        let mut data = [0i64; 1];
        {
            let b = Buffer::whole_array(&mut data);
            let mut unpacker = Unpacker::with_expected(1, 3);
            for chunk in wire.chunks(5) {
                let mut window = chunk;
                unpacker.unpack_from(&b, &mut window);
            }
            assert_eq!(unpacker.position(), 3);
            assert!(unpacker.is_done());
        }
        assert_eq!(data, [7]);
    }

    #[test]
    fn test_skip_items_whole_only() {
        let bytes = [0u8; 7];
        let mut window = &bytes[..];
        assert_eq!(skip_items::<i32, _>(5, &mut window), 1);
        assert_eq!(window.len(), 3);
    }
}
