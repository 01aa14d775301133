//! Buffers of serializable values.
//!
//! Object items have no fixed width, so an object buffer travels as one
//! message:
//!
//! ```text
//! +----------------+------------------------------------------+
//! | len: u32 (BE)  | bincode(items of the view, row-major)    |
//! +----------------+------------------------------------------+
//! ```
//!
//! The encoding is produced on the first `pack` and cached until the view
//! is mutated. A receive accumulates bytes across windows and decodes only
//! once the announced length is complete; a decode failure leaves storage
//! untouched.

use bytes::BufMut;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::index::ArrayMap;
use crate::range::Range;
use crate::{ItemType, MpError, Result};

const HEADER: usize = 4;

/// A view over a slice of serializable values.
pub struct ObjectBuf<'a, T> {
    items: &'a mut [T],
    range: Option<Range>,
    map: ArrayMap,
    encoded: Option<Vec<u8>>,
    pending: Vec<u8>,
}

impl<'a, T> ObjectBuf<'a, T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// All of `items`.
    pub fn whole(items: &'a mut [T]) -> Self {
        let range = Range::covering(items.len());
        Self::with_range(items, range)
    }

    /// The members of `range` in `items`.
    pub fn slice(items: &'a mut [T], range: Range) -> Result<Self> {
        if !range.fits_within(items.len()) {
            return Err(MpError::IndexOutOfBounds {
                what: "object array",
                range,
                extent: items.len(),
            });
        }
        Ok(Self::with_range(items, Some(range)))
    }

    fn with_range(items: &'a mut [T], range: Option<Range>) -> Self {
        let map = match &range {
            Some(r) => ArrayMap::new(r),
            None => ArrayMap {
                offset: 0,
                stride: 1,
                len: 0,
            },
        };
        Self {
            items,
            range,
            map,
            encoded: None,
            pending: Vec::new(),
        }
    }

    pub fn range(&self) -> Option<Range> {
        self.range
    }

    pub fn len(&self) -> usize {
        self.map.len
    }

    pub fn is_empty(&self) -> bool {
        self.map.len == 0
    }

    pub fn item_type(&self) -> ItemType {
        ItemType::Object
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

    pub fn get(&self, i: usize) -> &T {
        &self.items[self.slot(i)]
    }

    pub fn put(&mut self, i: usize, value: T) {
        let slot = self.slot(i);
        self.items[slot] = value;
        self.encoded = None;
    }

    /// Clone `min(self.len(), src.len())` items from `src`.
    pub fn copy_from(&mut self, src: &ObjectBuf<'_, T>) {
        let n = self.len().min(src.len());
        for i in 0..n {
            let slot = self.map.offset(i);
            self.items[slot] = src.get(i).clone();
        }
        self.encoded = None;
    }

    /// Whether an encoding is cached.
    pub fn is_encoded(&self) -> bool {
        self.encoded.is_some()
    }

    /// Bytes in the whole message, header included.
    pub fn encoded_len(&mut self) -> Result<usize> {
        Ok(self.encoding()?.len())
    }

    fn encoding(&mut self) -> Result<&[u8]> {
        if self.encoded.is_none() {
            let view: Vec<&T> = (0..self.len()).map(|i| self.get(i)).collect();
            let payload = bincode::serialize(&view).map_err(|e| MpError::Encode(e.to_string()))?;
            let len = u32::try_from(payload.len())
                .map_err(|_| MpError::Encode(format!("{} byte payload", payload.len())))?;
            let mut message = Vec::with_capacity(HEADER + payload.len());
            message.put_u32(len);
            message.extend_from_slice(&payload);
            tracing::debug!(items = self.len(), bytes = message.len(), "encoded object buffer");
            self.encoded = Some(message);
        }
        Ok(self.encoded.as_deref().unwrap_or_default())
    }

    /// Write message bytes starting at byte `offset` while `window` has
    /// room; returns the number of bytes written.
    pub fn pack<W: BufMut>(&mut self, offset: usize, window: &mut W) -> Result<usize> {
        let message = self.encoding()?;
        assert!(
            offset <= message.len(),
            "offset {} past message length {}",
            offset,
            message.len()
        );
        let n = (message.len() - offset).min(window.remaining_mut());
        window.put_slice(&message[offset..offset + n]);
        Ok(n)
    }

    /// Consume message bytes from `window`. Returns `Ok(Some(items))` once
    /// the message is complete and stored, `Ok(None)` while more bytes are
    /// needed.
    pub fn unpack<R: bytes::Buf>(&mut self, window: &mut R) -> Result<Option<usize>> {
        self.receive(window, None)
    }

    /// Drop any partially received message.
    pub fn reset_receive(&mut self) {
        self.pending.clear();
    }

    /// Fold writes with `combine` instead of assigning.
    pub fn reduction(&mut self, combine: fn(T, T) -> T) -> ObjectReductionBuf<'_, 'a, T> {
        ObjectReductionBuf {
            base: self,
            combine,
        }
    }

    fn take_bytes<R: bytes::Buf>(&mut self, n: usize, window: &mut R) {
        let n = n.min(window.remaining());
        let start = self.pending.len();
        self.pending.resize(start + n, 0);
        window.copy_to_slice(&mut self.pending[start..]);
    }

    fn receive<R: bytes::Buf>(
        &mut self,
        window: &mut R,
        combine: Option<fn(T, T) -> T>,
    ) -> Result<Option<usize>> {
        if self.pending.len() < HEADER {
            self.take_bytes(HEADER - self.pending.len(), window);
            if self.pending.len() < HEADER {
                return Ok(None);
            }
        }
        let mut header = &self.pending[..HEADER];
        let total = HEADER + bytes::Buf::get_u32(&mut header) as usize;
        self.take_bytes(total - self.pending.len(), window);
        if self.pending.len() < total {
            return Ok(None);
        }

        let decoded: Vec<T> = match bincode::deserialize(&self.pending[HEADER..]) {
            Ok(v) => v,
            Err(e) => {
                self.pending.clear();
                tracing::warn!(error = %e, bytes = total, "failed to decode object buffer");
                return Err(MpError::Decode(e.to_string()));
            }
        };
        self.pending.clear();

        let n = self.len().min(decoded.len());
        for (i, value) in decoded.into_iter().take(n).enumerate() {
            let slot = self.map.offset(i);
            self.items[slot] = match combine {
                None => value,
                Some(f) => f(self.items[slot].clone(), value),
            };
        }
        self.encoded = None;
        tracing::debug!(items = n, bytes = total, reducing = combine.is_some(), "decoded object buffer");
        Ok(Some(n))
    }
}

impl<T> ObjectBuf<'_, T>
where
    T: Serialize + DeserializeOwned + Clone + Default,
{
    /// Put `value`, or `T::default()`, at every index.
    pub fn fill(&mut self, value: Option<T>) {
        let value = value.unwrap_or_default();
        for i in 0..self.len() {
            let slot = self.map.offset(i);
            self.items[slot] = value.clone();
        }
        self.encoded = None;
    }
}

/// An object buffer whose writes fold with a caller-supplied combine.
pub struct ObjectReductionBuf<'b, 'a, T> {
    base: &'b mut ObjectBuf<'a, T>,
    combine: fn(T, T) -> T,
}

impl<T> ObjectReductionBuf<'_, '_, T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    pub fn get(&self, i: usize) -> &T {
        self.base.get(i)
    }

    /// Store `combine(self[i], value)`.
    pub fn put(&mut self, i: usize, value: T) {
        let current = self.base.get(i).clone();
        self.base.put(i, (self.combine)(current, value));
    }

    pub fn copy_from(&mut self, src: &ObjectBuf<'_, T>) {
        let n = self.len().min(src.len());
        for i in 0..n {
            self.put(i, src.get(i).clone());
        }
    }

    pub fn pack<W: BufMut>(&mut self, offset: usize, window: &mut W) -> Result<usize> {
        self.base.pack(offset, window)
    }

    /// As [`ObjectBuf::unpack`], folding each decoded item into storage.
    pub fn unpack<R: bytes::Buf>(&mut self, window: &mut R) -> Result<Option<usize>> {
        self.base.receive(window, Some(self.combine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        label: String,
    }

    fn pt(x: i32, label: &str) -> Point {
        Point {
            x,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_encoding_cached_until_mutation() {
        let mut items = vec![pt(1, "a"), pt(2, "b")];
        let mut buf = ObjectBuf::whole(&mut items);
        assert!(!buf.is_encoded());
        let len = buf.encoded_len().unwrap();
        assert!(buf.is_encoded());
        buf.put(0, pt(10, "longer label"));
        assert!(!buf.is_encoded());
        assert!(buf.encoded_len().unwrap() > len);
    }

    #[test]
    fn test_header_announces_payload() {
        let mut items = vec![String::from("hello")];
        let mut buf = ObjectBuf::whole(&mut items);
        let mut wire = Vec::new();
        let n = buf.pack(0, &mut wire).unwrap();
        assert_eq!(n, wire.len());
        let announced = u32::from_be_bytes(wire[..4].try_into().unwrap()) as usize;
        assert_eq!(announced + 4, wire.len());
    }

    #[test]
    fn test_transfer_across_small_windows() {
        let mut src_items = vec![pt(1, "one"), pt(2, "two"), pt(3, "three"), pt(4, "four")];
        let mut src = ObjectBuf::slice(&mut src_items, Range::with_stride(0, 3, 2).unwrap()).unwrap();
        let mut wire = Vec::new();
        let mut offset = 0;
        loop {
            let mut window = [0u8; 5];
            let mut w = &mut window[..];
            let n = src.pack(offset, &mut w).unwrap();
            if n == 0 {
                break;
            }
            wire.extend_from_slice(&window[..n]);
            offset += n;
        }

        let mut dst_items = vec![Point::default(); 3];
        let mut dst = ObjectBuf::whole(&mut dst_items);
        let mut result = None;
        for chunk in wire.chunks(3) {
            let mut window = chunk;
            if let Some(n) = dst.unpack(&mut window).unwrap() {
                result = Some(n);
            }
        }
        assert_eq!(result, Some(2));
        assert_eq!(dst_items, vec![pt(1, "one"), pt(3, "three"), Point::default()]);
    }

    #[test]
    fn test_decode_failure_leaves_storage() {
        let mut items = vec![7u64, 8];
        let mut buf = ObjectBuf::whole(&mut items);
        // Announces 3 bytes, too short for the sequence length bincode expects.
        let wire = [0u8, 0, 0, 3, 1, 2, 3];
        let err = buf.unpack(&mut &wire[..]).unwrap_err();
        assert!(matches!(err, MpError::Decode(_)));
        assert_eq!(*buf.get(0), 7);
        assert_eq!(items, vec![7, 8]);
    }

    #[test]
    fn test_reduction_combines() {
        let mut acc = vec![1i64, 2, 3];
        let mut incoming = vec![10i64, 20];
        let mut wire = Vec::new();
        ObjectBuf::whole(&mut incoming).pack(0, &mut wire).unwrap();

        let mut buf = ObjectBuf::whole(&mut acc);
        {
            let mut sum = buf.reduction(|a, b| a + b);
            assert_eq!(sum.unpack(&mut &wire[..]).unwrap(), Some(2));
            sum.put(2, 100);
            assert_eq!(*sum.get(2), 103);
        }
        assert_eq!(acc, vec![11, 22, 103]);
    }

    #[test]
    fn test_fill_and_copy() {
        let mut a = vec![String::from("x"); 3];
        let mut b = vec![String::new(); 2];
        let mut src = ObjectBuf::whole(&mut a);
        src.fill(Some("y".to_string()));
        let mut dst = ObjectBuf::whole(&mut b);
        dst.copy_from(&src);
        assert_eq!(dst.get(1), "y");
        dst.fill(None);
        assert_eq!(b, vec![String::new(), String::new()]);
    }

    #[test]
    fn test_slice_bounds_checked() {
        let mut items = vec![0u8; 2];
        assert!(ObjectBuf::slice(&mut items, Range::new(0, 2).unwrap()).is_err());
        let mut none: Vec<u8> = Vec::new();
        let buf = ObjectBuf::whole(&mut none);
        assert!(buf.is_empty());
        assert_eq!(buf.item_type(), ItemType::Object);
    }
}
