//! On-disk element types, byte decoding, and BSCALE/BZERO scaling.

use alloc::vec::Vec;

use bytemuck::pod_collect_to_vec;

use crate::array::ArrayData;
use crate::error::{Error, Result};
use crate::header::{card_float, card_integer, Card};

/// Storage element type, as selected by BITPIX.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

/// Byte order of stored elements. FITS data on disk is always big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

/// Element type plus byte order of a stored data segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DType {
    pub element: ElementType,
    pub order: ByteOrder,
}

impl DType {
    /// The big-endian storage type for a BITPIX value.
    pub fn from_bitpix(bitpix: i64) -> Result<Self> {
        let element = match bitpix {
            8 => ElementType::U8,
            16 => ElementType::I16,
            32 => ElementType::I32,
            64 => ElementType::I64,
            -32 => ElementType::F32,
            -64 => ElementType::F64,
            other => return Err(Error::InvalidBitpix(other)),
        };
        Ok(DType {
            element,
            order: ByteOrder::Big,
        })
    }

    /// Bytes per element.
    pub fn size(&self) -> usize {
        match self.element {
            ElementType::U8 => 1,
            ElementType::I16 => 2,
            ElementType::I32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::F64 => 8,
        }
    }

    pub fn bitpix(&self) -> i64 {
        match self.element {
            ElementType::U8 => 8,
            ElementType::I16 => 16,
            ElementType::I32 => 32,
            ElementType::I64 => 64,
            ElementType::F32 => -32,
            ElementType::F64 => -64,
        }
    }

    /// NumPy-style name, with a `>` or `<` prefix for multi-byte types.
    pub fn name(&self) -> &'static str {
        match (self.element, self.order) {
            (ElementType::U8, _) => "uint8",
            (ElementType::I16, ByteOrder::Big) => ">i2",
            (ElementType::I16, ByteOrder::Little) => "<i2",
            (ElementType::I32, ByteOrder::Big) => ">i4",
            (ElementType::I32, ByteOrder::Little) => "<i4",
            (ElementType::I64, ByteOrder::Big) => ">i8",
            (ElementType::I64, ByteOrder::Little) => "<i8",
            (ElementType::F32, ByteOrder::Big) => ">f4",
            (ElementType::F32, ByteOrder::Little) => "<f4",
            (ElementType::F64, ByteOrder::Big) => ">f8",
            (ElementType::F64, ByteOrder::Little) => "<f8",
        }
    }
}

fn collect_swapped<T: bytemuck::Pod>(raw: &[u8], swap: impl Fn(T) -> T) -> Vec<T> {
    let mut values: Vec<T> = pod_collect_to_vec(raw);
    for v in &mut values {
        *v = swap(*v);
    }
    values
}

/// Decode raw stored bytes into native-endian typed elements.
///
/// `raw.len()` must be a whole multiple of the element size.
pub fn decode(raw: &[u8], dtype: &DType) -> Result<ArrayData> {
    if raw.len() % dtype.size() != 0 {
        return Err(Error::ShapeMismatch {
            expected: raw.len() / dtype.size() + 1,
            actual: raw.len() / dtype.size(),
        });
    }
    let big = dtype.order == ByteOrder::Big;
    Ok(match dtype.element {
        ElementType::U8 => ArrayData::U8(raw.to_vec()),
        ElementType::I16 => ArrayData::I16(collect_swapped(raw, |v: i16| {
            if big { i16::from_be(v) } else { i16::from_le(v) }
        })),
        ElementType::I32 => ArrayData::I32(collect_swapped(raw, |v: i32| {
            if big { i32::from_be(v) } else { i32::from_le(v) }
        })),
        ElementType::I64 => ArrayData::I64(collect_swapped(raw, |v: i64| {
            if big { i64::from_be(v) } else { i64::from_le(v) }
        })),
        ElementType::F32 => ArrayData::F32(collect_swapped(raw, |v: f32| {
            let bits = v.to_bits();
            f32::from_bits(if big { u32::from_be(bits) } else { u32::from_le(bits) })
        })),
        ElementType::F64 => ArrayData::F64(collect_swapped(raw, |v: f64| {
            let bits = v.to_bits();
            f64::from_bits(if big { u64::from_be(bits) } else { u64::from_le(bits) })
        })),
    })
}

/// Stored representation of an array: BITPIX, BZERO offset, and big-endian bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub bitpix: i64,
    pub bzero: Option<f64>,
    pub bytes: Vec<u8>,
}

fn to_be_bytes<T: bytemuck::Pod>(values: &[T], swap: impl Fn(T) -> T) -> Vec<u8> {
    let swapped: Vec<T> = values.iter().map(|&v| swap(v)).collect();
    pod_collect_to_vec(&swapped)
}

/// Encode elements as big-endian FITS data.
///
/// Unsigned 16/32/64-bit and signed 8-bit arrays use the standard BZERO
/// offset conventions so they round-trip through [`Scaling::apply`].
pub fn encode(data: &ArrayData) -> Encoded {
    let (bitpix, bzero, bytes) = match data {
        ArrayData::U8(v) => (8, None, v.clone()),
        ArrayData::I8(v) => (8, Some(-128.0), v.iter().map(|&x| (x as u8) ^ 0x80).collect()),
        ArrayData::I16(v) => (16, None, to_be_bytes(v, i16::to_be)),
        ArrayData::U16(v) => {
            let shifted: Vec<i16> = v.iter().map(|&x| (x ^ 0x8000) as i16).collect();
            (16, Some(32768.0), to_be_bytes(&shifted, i16::to_be))
        }
        ArrayData::I32(v) => (32, None, to_be_bytes(v, i32::to_be)),
        ArrayData::U32(v) => {
            let shifted: Vec<i32> = v.iter().map(|&x| (x ^ 0x8000_0000) as i32).collect();
            (32, Some(2_147_483_648.0), to_be_bytes(&shifted, i32::to_be))
        }
        ArrayData::I64(v) => (64, None, to_be_bytes(v, i64::to_be)),
        ArrayData::U64(v) => {
            let shifted: Vec<i64> = v.iter().map(|&x| (x ^ (1 << 63)) as i64).collect();
            (64, Some(9_223_372_036_854_775_808.0), to_be_bytes(&shifted, i64::to_be))
        }
        ArrayData::F32(v) => (
            -32,
            None,
            to_be_bytes(v, |x: f32| f32::from_bits(x.to_bits().to_be())),
        ),
        ArrayData::F64(v) => (
            -64,
            None,
            to_be_bytes(v, |x: f64| f64::from_bits(x.to_bits().to_be())),
        ),
    };
    Encoded {
        bitpix,
        bzero,
        bytes,
    }
}

/// Linear scaling from stored to physical values: `bzero + bscale * stored`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub bscale: f64,
    pub bzero: f64,
    /// Stored integer value marking undefined pixels (BLANK).
    pub blank: Option<i64>,
}

impl Default for Scaling {
    fn default() -> Self {
        Scaling::IDENTITY
    }
}

impl Scaling {
    pub const IDENTITY: Scaling = Scaling {
        bscale: 1.0,
        bzero: 0.0,
        blank: None,
    };

    /// Reads BSCALE, BZERO and BLANK, defaulting to the identity.
    pub fn from_cards(cards: &[Card]) -> Self {
        Scaling {
            bscale: card_float(cards, "BSCALE").unwrap_or(1.0),
            bzero: card_float(cards, "BZERO").unwrap_or(0.0),
            blank: card_integer(cards, "BLANK"),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.bscale == 1.0 && self.bzero == 0.0
    }

    /// Converts stored elements to physical values.
    ///
    /// The unsigned-integer BZERO conventions produce exact integer arrays.
    /// Any other non-identity scaling produces `f32` for 8 and 16-bit storage
    /// and `f64` otherwise, with BLANK pixels mapped to NaN.
    pub fn apply(&self, data: ArrayData) -> ArrayData {
        if self.is_identity() {
            return data;
        }
        if self.bscale == 1.0 {
            match (data, self.bzero) {
                (ArrayData::U8(v), z) if z == -128.0 => {
                    return ArrayData::I8(v.into_iter().map(|x| (x ^ 0x80) as i8).collect())
                }
                (ArrayData::I16(v), z) if z == 32768.0 => {
                    return ArrayData::U16(v.into_iter().map(|x| (x as u16) ^ 0x8000).collect())
                }
                (ArrayData::I32(v), z) if z == 2_147_483_648.0 => {
                    return ArrayData::U32(
                        v.into_iter().map(|x| (x as u32) ^ 0x8000_0000).collect(),
                    )
                }
                (ArrayData::I64(v), z) if z == 9_223_372_036_854_775_808.0 => {
                    return ArrayData::U64(v.into_iter().map(|x| (x as u64) ^ (1 << 63)).collect())
                }
                (other, _) => return self.to_float(other),
            }
        }
        self.to_float(data)
    }

    fn physical(&self, stored: f64, raw: Option<i64>) -> f64 {
        match (self.blank, raw) {
            (Some(b), Some(r)) if b == r => f64::NAN,
            _ => self.bzero + self.bscale * stored,
        }
    }

    fn to_float(&self, data: ArrayData) -> ArrayData {
        match data {
            ArrayData::U8(v) => ArrayData::F32(
                v.into_iter()
                    .map(|x| self.physical(x as f64, Some(x as i64)) as f32)
                    .collect(),
            ),
            ArrayData::I16(v) => ArrayData::F32(
                v.into_iter()
                    .map(|x| self.physical(x as f64, Some(x as i64)) as f32)
                    .collect(),
            ),
            ArrayData::F32(v) => ArrayData::F32(
                v.into_iter()
                    .map(|x| self.physical(x as f64, None) as f32)
                    .collect(),
            ),
            ArrayData::I32(v) => ArrayData::F64(
                v.into_iter()
                    .map(|x| self.physical(x as f64, Some(x as i64)))
                    .collect(),
            ),
            ArrayData::I64(v) => ArrayData::F64(
                v.into_iter()
                    .map(|x| self.physical(x as f64, Some(x)))
                    .collect(),
            ),
            other => ArrayData::F64(
                other
                    .to_f64_vec()
                    .into_iter()
                    .map(|x| self.physical(x, None))
                    .collect(),
            ),
        }
    }
}
