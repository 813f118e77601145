//! Fixed-width signal shapes and two's-complement wrapping.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Widest signal the simulator accepts.
///
/// Values are stored as `i64`, so an unsigned signal may use at most 63 bits.
pub const MAX_WIDTH: u32 = 63;

/// Width and signedness of a signal.
///
/// A `Shape` never holds an invalid width: construction goes through
/// [`Shape::new`], which the store validates again on signal creation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawShape")]
pub struct Shape {
    width: u32,
    signed: bool,
}

#[derive(Deserialize)]
struct RawShape {
    width: u32,
    signed: bool,
}

impl TryFrom<RawShape> for Shape {
    type Error = String;

    fn try_from(raw: RawShape) -> Result<Self, Self::Error> {
        Shape::new(raw.width, raw.signed)
            .ok_or_else(|| format!("width {} outside 1..={}", raw.width, MAX_WIDTH))
    }
}

impl Shape {
    /// A single unsigned bit.
    pub const BIT: Shape = Shape { width: 1, signed: false };

    /// Create a shape. Returns `None` if `width` is 0 or above [`MAX_WIDTH`].
    pub const fn new(width: u32, signed: bool) -> Option<Self> {
        if width == 0 || width > MAX_WIDTH {
            None
        } else {
            Some(Self { width, signed })
        }
    }

    /// Shape for an unsigned value.
    pub const fn unsigned(width: u32) -> Option<Self> {
        Self::new(width, false)
    }

    /// Shape for a two's-complement signed value.
    pub const fn signed(width: u32) -> Option<Self> {
        Self::new(width, true)
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn is_signed(&self) -> bool {
        self.signed
    }

    /// Smallest representable value.
    pub const fn min(&self) -> i64 {
        if self.signed {
            -(1i64 << (self.width - 1))
        } else {
            0
        }
    }

    /// Largest representable value.
    pub const fn max(&self) -> i64 {
        if self.signed {
            (1i64 << (self.width - 1)) - 1
        } else {
            ((1i128 << self.width) - 1) as i64
        }
    }

    /// Reduce an arbitrary integer into this shape, modulo `2^width`.
    ///
    /// Unsigned shapes keep the low `width` bits. Signed shapes additionally
    /// reinterpret the top bit as the sign.
    pub fn wrap(&self, value: i128) -> i64 {
        let modulus = 1i128 << self.width;
        let low = value & (modulus - 1);
        if self.signed && low >= modulus >> 1 {
            (low - modulus) as i64
        } else {
            low as i64
        }
    }

    /// Clamp an arbitrary integer into this shape's range.
    pub fn saturate(&self, value: i128) -> i64 {
        value.clamp(self.min() as i128, self.max() as i128) as i64
    }

    /// Check whether `value` is representable without wrapping.
    pub fn contains(&self, value: i128) -> bool {
        value >= self.min() as i128 && value <= self.max() as i128
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.signed { 's' } else { 'u' };
        write!(f, "{}{}", kind, self.width)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Number of bits needed to store `value`.
///
/// For non-negative values this is the unsigned width (1 for 0). For negative
/// values it is the two's-complement width including the sign bit.
///
/// ```
/// use gatesim::logic::bits_for;
/// assert_eq!(bits_for(7), 3);
/// assert_eq!(bits_for(8), 4);
/// assert_eq!(bits_for(-4), 3);
/// ```
pub fn bits_for(value: i64) -> u32 {
    if value < 0 {
        // !value is the magnitude minus one; add the sign bit
        64 - (!value).leading_zeros() + 1
    } else if value == 0 {
        1
    } else {
        64 - value.leading_zeros()
    }
}
