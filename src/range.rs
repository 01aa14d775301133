use std::fmt;

use crate::{MpError, Result};

/// Immutable index set `lower, lower + stride, ..., upper`.
///
/// Construction requires `lower <= upper` and a positive stride. When
/// `upper - lower` is not a multiple of the stride, the upper bound snaps
/// down to the last member, so `map_index(length() - 1) == ub()` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    lower: i64,
    upper: i64,
    stride: i64,
    length: usize,
}

impl Range {
    /// Contiguous range `lower..=upper`.
    pub fn new(lower: i64, upper: i64) -> Result<Self> {
        Self::with_stride(lower, upper, 1)
    }

    /// Strided range `lower..=upper` stepping by `stride`.
    ///
    /// `upper` snaps down to the last member actually reached:
    ///
    /// ```rust
    /// use strided_mp::Range;
    ///
    /// let r = Range::with_stride(1, 6, 2).unwrap();
    /// assert_eq!(r.length(), 3);
    /// assert_eq!(r.ub(), 5);
    /// assert_eq!(r.map_index(r.length() - 1), r.ub());
    /// ```
    pub fn with_stride(lower: i64, upper: i64, stride: i64) -> Result<Self> {
        if stride <= 0 || lower > upper {
            return Err(MpError::InvalidRange {
                lower,
                upper,
                stride,
            });
        }
        let span = upper
            .checked_sub(lower)
            .ok_or(MpError::InvalidRange {
                lower,
                upper,
                stride,
            })?;
        let steps = span / stride;
        let length = usize::try_from(steps)
            .ok()
            .and_then(|s| s.checked_add(1))
            .ok_or(MpError::InvalidRange {
                lower,
                upper,
                stride,
            })?;
        let last = lower + steps * stride;
        if last != upper {
            tracing::debug!(lower, upper, stride, last, "range upper bound snapped to last member");
        }
        Ok(Self {
            lower,
            upper: last,
            stride,
            length,
        })
    }

    /// Contiguous range covering `0..len`, or `None` when `len == 0`.
    pub fn covering(len: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        Self::new(0, len as i64 - 1).ok()
    }

    #[inline]
    pub fn lb(&self) -> i64 {
        self.lower
    }

    #[inline]
    pub fn ub(&self) -> i64 {
        self.upper
    }

    #[inline]
    pub fn stride(&self) -> i64 {
        self.stride
    }

    /// Number of members: `(upper - lower) / stride + 1`.
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.stride == 1
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.lower && value <= self.upper && (value - self.lower) % self.stride == 0
    }

    /// Physical index of logical member `i`.
    ///
    /// # Panics
    /// If `i >= self.length()`.
    #[inline]
    pub fn map_index(&self, i: usize) -> i64 {
        assert!(
            i < self.length,
            "logical index {} out of bounds for range of length {}",
            i,
            self.length
        );
        self.lower + i as i64 * self.stride
    }

    /// Whether every member lies in `0..extent`.
    pub(crate) fn fits_within(&self, extent: usize) -> bool {
        self.lower >= 0 && (self.upper as u64) < extent as u64
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stride == 1 {
            write!(f, "{}..{}", self.lower, self.upper)
        } else {
            write!(f, "{}..{};{}", self.lower, self.upper, self.stride)
        }
    }
}
