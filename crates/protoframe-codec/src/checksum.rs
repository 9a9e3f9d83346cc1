//! Checksum algorithms used by CHECKSUM elements.
//!
//! All functions are pure and table-free so build and parse agree bit-for-bit.

use serde::{Deserialize, Serialize};

use crate::numeric::{encode_uint, ByteOrder};

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChecksumAlgorithm {
    /// Sum of all bytes modulo 256.
    Mod256,
    /// XOR-fold of all bytes.
    Xor,
    /// Longitudinal redundancy check: two's complement of the byte sum.
    Lrc,
    /// CRC-16/MODBUS: init 0xFFFF, reflected poly 0xA001.
    #[serde(rename = "CRC16_MODBUS")]
    Crc16Modbus,
    /// CRC-16/CCITT-FALSE: init 0xFFFF, poly 0x1021, not reflected.
    #[serde(rename = "CRC16_CCITT")]
    Crc16Ccitt,
}

impl ChecksumAlgorithm {
    /// Natural encoded width of the checksum in bytes.
    pub fn default_size(self) -> usize {
        match self {
            Self::Mod256 | Self::Xor | Self::Lrc => 1,
            Self::Crc16Modbus | Self::Crc16Ccitt => 2,
        }
    }

    /// Byte order the checksum is stored in when the element doesn't override it.
    ///
    /// CRC16 variants are stored low byte first, the way Modbus RTU puts them on the wire.
    pub fn default_byte_order(self) -> ByteOrder {
        match self {
            Self::Crc16Modbus | Self::Crc16Ccitt => ByteOrder::LittleEndian,
            Self::Mod256 | Self::Xor | Self::Lrc => ByteOrder::BigEndian,
        }
    }

    /// Compute the checksum value over `data`.
    pub fn compute(self, data: &[u8]) -> u64 {
        match self {
            Self::Mod256 => u64::from(mod256(data)),
            Self::Xor => u64::from(xor(data)),
            Self::Lrc => u64::from(lrc(data)),
            Self::Crc16Modbus => u64::from(crc16_modbus(data)),
            Self::Crc16Ccitt => u64::from(crc16_ccitt(data)),
        }
    }

    /// Human-readable algorithm name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Mod256 => "MOD256",
            Self::Xor => "XOR",
            Self::Lrc => "LRC",
            Self::Crc16Modbus => "CRC16_MODBUS",
            Self::Crc16Ccitt => "CRC16_CCITT",
        }
    }
}

impl std::str::FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "MOD256" | "SUM8" => Ok(Self::Mod256),
            "XOR" | "XOR8" => Ok(Self::Xor),
            "LRC" => Ok(Self::Lrc),
            "CRC16_MODBUS" | "MODBUS" => Ok(Self::Crc16Modbus),
            "CRC16_CCITT" | "CCITT" => Ok(Self::Crc16Ccitt),
            other => Err(format!("unknown checksum algorithm: {other}")),
        }
    }
}

/// Sum of all bytes modulo 256.
pub fn mod256(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Bitwise XOR of all bytes.
pub fn xor(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Two's complement of the byte sum: `(-sum) mod 256`.
pub fn lrc(data: &[u8]) -> u8 {
    mod256(data).wrapping_neg()
}

/// CRC-16/MODBUS.
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// CRC-16/CCITT-FALSE.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Compute `algorithm` over `data` and encode it at `size` bytes.
///
/// `byte_order` falls back to [`ChecksumAlgorithm::default_byte_order`].
pub fn checksum_bytes(
    algorithm: ChecksumAlgorithm,
    data: &[u8],
    size: Option<usize>,
    byte_order: Option<ByteOrder>,
) -> Vec<u8> {
    let size = size.unwrap_or_else(|| algorithm.default_size());
    let order = byte_order.unwrap_or_else(|| algorithm.default_byte_order());
    encode_uint(algorithm.compute(data), size, order)
}

/// Check that `stored` matches the checksum of `data` under the same encoding rules.
pub fn verify(
    algorithm: ChecksumAlgorithm,
    data: &[u8],
    stored: &[u8],
    byte_order: Option<ByteOrder>,
) -> bool {
    checksum_bytes(algorithm, data, Some(stored.len()), byte_order) == stored
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECK: &[u8] = b"123456789";

    #[test]
    fn crc16_modbus_check_value() {
        assert_eq!(crc16_modbus(CHECK), 0x4B37);
    }

    #[test]
    fn crc16_ccitt_check_value() {
        assert_eq!(crc16_ccitt(CHECK), 0x29B1);
    }

    #[test]
    fn crc16_modbus_read_request_is_little_endian() {
        let bytes = checksum_bytes(ChecksumAlgorithm::Crc16Modbus, &[0x01, 0x03], None, None);
        assert_eq!(bytes, vec![0x40, 0x21]);

        let read_holding = [0x01, 0x03, 0x00, 0x00, 0x00, 0x0A];
        let bytes = checksum_bytes(ChecksumAlgorithm::Crc16Modbus, &read_holding, None, None);
        assert_eq!(bytes, vec![0xC5, 0xCD]);
    }

    #[test]
    fn crc16_byte_order_override() {
        let bytes = checksum_bytes(
            ChecksumAlgorithm::Crc16Modbus,
            &[0x01, 0x03],
            None,
            Some(ByteOrder::BigEndian),
        );
        assert_eq!(bytes, vec![0x21, 0x40]);
    }

    #[test]
    fn single_byte_checksums() {
        let data = [0x10, 0x20, 0xF0];
        assert_eq!(mod256(&data), 0x20);
        assert_eq!(xor(&data), 0xC0);
        assert_eq!(lrc(&data), 0xE0);
        assert_eq!(mod256(&data).wrapping_add(lrc(&data)), 0);
    }

    #[test]
    fn empty_input() {
        assert_eq!(mod256(&[]), 0);
        assert_eq!(xor(&[]), 0);
        assert_eq!(lrc(&[]), 0);
        assert_eq!(crc16_modbus(&[]), 0xFFFF);
    }

    #[test]
    fn verify_detects_corruption() {
        assert!(verify(ChecksumAlgorithm::Crc16Modbus, &[0x01, 0x03], &[0x40, 0x21], None));
        assert!(!verify(ChecksumAlgorithm::Crc16Modbus, &[0x01, 0x03], &[0x21, 0x40], None));
        assert!(verify(ChecksumAlgorithm::Xor, &[0x0F, 0xF0], &[0xFF], None));
    }

    #[test]
    fn algorithm_names_parse() {
        assert_eq!("crc16-modbus".parse(), Ok(ChecksumAlgorithm::Crc16Modbus));
        assert_eq!("lrc".parse(), Ok(ChecksumAlgorithm::Lrc));
        assert!("crc64".parse::<ChecksumAlgorithm>().is_err());
    }

    #[test]
    fn serde_names_match_protocol_documents() {
        let alg: ChecksumAlgorithm = serde_json::from_str("\"CRC16_MODBUS\"").unwrap();
        assert_eq!(alg, ChecksumAlgorithm::Crc16Modbus);
        let alg: ChecksumAlgorithm = serde_json::from_str("\"MOD256\"").unwrap();
        assert_eq!(alg, ChecksumAlgorithm::Mod256);
    }
}
