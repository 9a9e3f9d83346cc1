//! Fixed-width integer and IEEE-754 float encoding in a chosen byte order.
//!
//! Encoding never fails: integers that do not fit the declared width wrap
//! per two's complement, keeping streaming paths free of overflow errors.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

/// Byte order of multi-byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    #[default]
    #[serde(rename = "BE")]
    BigEndian,
    #[serde(rename = "LE")]
    LittleEndian,
}

/// Numeric data types a FIELD or ADDRESS element can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Float32,
    Float64,
}

impl DataType {
    /// Encoded width in bytes.
    pub fn width(self) -> usize {
        match self {
            Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Uint64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

/// A numeric value on its way into the encoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i128),
    Float(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// Integer view; floats are truncated toward zero.
    pub fn as_i128(self) -> i128 {
        match self {
            Self::Integer(v) => v,
            Self::Float(v) => v.trunc() as i128,
        }
    }
}

impl From<i64> for Numeric {
    fn from(value: i64) -> Self {
        Self::Integer(i128::from(value))
    }
}

impl From<u64> for Numeric {
    fn from(value: u64) -> Self {
        Self::Integer(i128::from(value))
    }
}

impl From<f64> for Numeric {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// A decoded numeric value, kept in the widest lossless representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl NumericValue {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Unsigned(v) => v as f64,
            Self::Signed(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    pub fn as_u64(self) -> Option<u64> {
        match self {
            Self::Unsigned(v) => Some(v),
            Self::Signed(v) => u64::try_from(v).ok(),
            Self::Float(_) => None,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            Self::Unsigned(v) => i64::try_from(v).ok(),
            Self::Signed(v) => Some(v),
            Self::Float(_) => None,
        }
    }
}

impl From<NumericValue> for Numeric {
    fn from(value: NumericValue) -> Self {
        match value {
            NumericValue::Unsigned(v) => Self::Integer(i128::from(v)),
            NumericValue::Signed(v) => Self::Integer(i128::from(v)),
            NumericValue::Float(v) => Self::Float(v),
        }
    }
}

/// Encode `value` as `data_type` in `order`.
pub fn encode_numeric(value: Numeric, data_type: DataType, order: ByteOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(data_type.width());
    match data_type {
        DataType::Float32 => {
            let v = value.as_f64() as f32;
            match order {
                ByteOrder::BigEndian => out.put_f32(v),
                ByteOrder::LittleEndian => out.put_f32_le(v),
            }
        }
        DataType::Float64 => {
            let v = value.as_f64();
            match order {
                ByteOrder::BigEndian => out.put_f64(v),
                ByteOrder::LittleEndian => out.put_f64_le(v),
            }
        }
        _ => {
            // Truncating casts implement two's-complement wrap at the target width.
            let raw = value.as_i128() as u64;
            put_uint(&mut out, raw, data_type.width(), order);
        }
    }
    out
}

/// Decode a `data_type` value from the first `data_type.width()` bytes of `bytes`.
///
/// Returns `None` if `bytes` is too short.
pub fn decode_numeric(bytes: &[u8], data_type: DataType, order: ByteOrder) -> Option<NumericValue> {
    let width = data_type.width();
    if bytes.len() < width {
        return None;
    }
    let mut buf = &bytes[..width];
    let value = match data_type {
        DataType::Float32 => NumericValue::Float(f64::from(match order {
            ByteOrder::BigEndian => buf.get_f32(),
            ByteOrder::LittleEndian => buf.get_f32_le(),
        })),
        DataType::Float64 => NumericValue::Float(match order {
            ByteOrder::BigEndian => buf.get_f64(),
            ByteOrder::LittleEndian => buf.get_f64_le(),
        }),
        dt if dt.is_signed() => {
            let raw = match order {
                ByteOrder::BigEndian => buf.get_uint(width),
                ByteOrder::LittleEndian => buf.get_uint_le(width),
            };
            NumericValue::Signed(sign_extend(raw, width))
        }
        _ => NumericValue::Unsigned(match order {
            ByteOrder::BigEndian => buf.get_uint(width),
            ByteOrder::LittleEndian => buf.get_uint_le(width),
        }),
    };
    Some(value)
}

/// Encode an unsigned value at an arbitrary width (1-8 bytes), wrapping on overflow.
///
/// Widths above 8 are zero-extended on the most significant side.
pub fn encode_uint(value: u64, size: usize, order: ByteOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(size);
    put_uint(&mut out, value, size, order);
    out
}

/// Read an unsigned value from `bytes` (1-8 bytes) in `order`.
pub fn read_uint(bytes: &[u8], order: ByteOrder) -> u64 {
    let width = bytes.len().min(8);
    let mut buf = match order {
        ByteOrder::BigEndian => &bytes[bytes.len() - width..],
        ByteOrder::LittleEndian => &bytes[..width],
    };
    if width == 0 {
        return 0;
    }
    match order {
        ByteOrder::BigEndian => buf.get_uint(width),
        ByteOrder::LittleEndian => buf.get_uint_le(width),
    }
}

fn sign_extend(raw: u64, width: usize) -> i64 {
    let shift = 64 - (width as u32) * 8;
    ((raw << shift) as i64) >> shift
}

fn put_uint(out: &mut Vec<u8>, value: u64, size: usize, order: ByteOrder) {
    let width = size.min(8);
    let pad = size - width;
    let value = if width < 8 {
        value & ((1u64 << (width * 8)) - 1)
    } else {
        value
    };
    match order {
        ByteOrder::BigEndian => {
            out.put_bytes(0, pad);
            if width > 0 {
                out.put_uint(value, width);
            }
        }
        ByteOrder::LittleEndian => {
            if width > 0 {
                out.put_uint_le(value, width);
            }
            out.put_bytes(0, pad);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint16_byte_orders() {
        let be = encode_numeric(Numeric::Integer(0x1234), DataType::Uint16, ByteOrder::BigEndian);
        let le = encode_numeric(Numeric::Integer(0x1234), DataType::Uint16, ByteOrder::LittleEndian);
        assert_eq!(be, vec![0x12, 0x34]);
        assert_eq!(le, vec![0x34, 0x12]);
    }

    #[test]
    fn negative_value_wraps_for_unsigned() {
        let out = encode_numeric(Numeric::Integer(-1), DataType::Uint16, ByteOrder::BigEndian);
        assert_eq!(out, vec![0xFF, 0xFF]);
        let out = encode_numeric(Numeric::Integer(256), DataType::Uint8, ByteOrder::BigEndian);
        assert_eq!(out, vec![0x00]);
    }

    #[test]
    fn signed_roundtrip_and_sign_extension() {
        let out = encode_numeric(Numeric::Integer(-2), DataType::Int16, ByteOrder::LittleEndian);
        assert_eq!(out, vec![0xFE, 0xFF]);
        assert_eq!(
            decode_numeric(&out, DataType::Int16, ByteOrder::LittleEndian),
            Some(NumericValue::Signed(-2))
        );
        assert_eq!(
            decode_numeric(&[0x80], DataType::Int8, ByteOrder::BigEndian),
            Some(NumericValue::Signed(-128))
        );
    }

    #[test]
    fn float_is_truncated_for_integer_types() {
        let out = encode_numeric(Numeric::Float(12.9), DataType::Uint8, ByteOrder::BigEndian);
        assert_eq!(out, vec![12]);
    }

    #[test]
    fn float32_ieee754() {
        let out = encode_numeric(Numeric::Float(1.0), DataType::Float32, ByteOrder::BigEndian);
        assert_eq!(out, vec![0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(
            decode_numeric(&out, DataType::Float32, ByteOrder::BigEndian),
            Some(NumericValue::Float(1.0))
        );
    }

    #[test]
    fn uint64_full_range() {
        let out = encode_numeric(Numeric::from(u64::MAX), DataType::Uint64, ByteOrder::BigEndian);
        assert_eq!(out, vec![0xFF; 8]);
        assert_eq!(
            decode_numeric(&out, DataType::Uint64, ByteOrder::BigEndian),
            Some(NumericValue::Unsigned(u64::MAX))
        );
    }

    #[test]
    fn decode_short_buffer_is_none() {
        assert_eq!(decode_numeric(&[0x01], DataType::Uint16, ByteOrder::BigEndian), None);
    }

    #[test]
    fn arbitrary_width_uint() {
        assert_eq!(encode_uint(0x010203, 3, ByteOrder::BigEndian), vec![1, 2, 3]);
        assert_eq!(encode_uint(0x010203, 3, ByteOrder::LittleEndian), vec![3, 2, 1]);
        assert_eq!(encode_uint(0x1FF, 1, ByteOrder::BigEndian), vec![0xFF]);
        assert_eq!(read_uint(&[0x00, 0x05], ByteOrder::BigEndian), 5);
        assert_eq!(read_uint(&[0x05, 0x00], ByteOrder::LittleEndian), 5);
        assert_eq!(read_uint(&[0x01, 0, 0, 0, 0, 0, 0, 0], ByteOrder::LittleEndian), 1);
    }

    #[test]
    fn byte_order_serde_names() {
        assert_eq!(serde_json::to_string(&ByteOrder::BigEndian).unwrap(), "\"BE\"");
        let order: ByteOrder = serde_json::from_str("\"LE\"").unwrap();
        assert_eq!(order, ByteOrder::LittleEndian);
        let dt: DataType = serde_json::from_str("\"FLOAT32\"").unwrap();
        assert_eq!(dt, DataType::Float32);
    }
}
