//! Variable-length integer encoding.
//!
//! Seven payload bits per byte, least significant group first, with the high
//! bit set on every byte except the last.

use crate::error::{LoupeError, Result};

/// Encode a u64 value using variable-length encoding.
pub fn encode_u64(value: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(encoded_len(value));
    write_u64(&mut bytes, value);
    bytes
}

/// Append the variable-length encoding of `value` to `out`.
pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    let mut val = value;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80;
        }

        out.push(byte);

        if val == 0 {
            break;
        }
    }
}

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Decode a u64 value from variable-length encoding.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;
    let mut bytes_read = 0;

    for &byte in bytes {
        bytes_read += 1;

        if shift >= 64 {
            return Err(LoupeError::corruption("VarInt overflow"));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok((result, bytes_read));
        }

        shift += 7;
    }

    Err(LoupeError::corruption("Incomplete VarInt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_u64() {
        let test_values = [0, 1, 127, 128, 255, 256, 16383, 16384, u64::MAX];

        for &value in &test_values {
            let encoded = encode_u64(value);
            let (decoded, bytes_read) = decode_u64(&encoded).unwrap();

            assert_eq!(value, decoded);
            assert_eq!(encoded.len(), bytes_read);
            assert_eq!(encoded.len(), encoded_len(value));
        }
    }

    #[test]
    fn test_write_appends() {
        let mut buf = vec![0xAA];
        write_u64(&mut buf, 300);
        assert_eq!(buf, vec![0xAA, 0xAC, 0x02]);
    }

    #[test]
    fn test_encoding_efficiency() {
        assert_eq!(encode_u64(0).len(), 1);
        assert!(encode_u64(u64::MAX).len() <= 10);
    }

    #[test]
    fn test_incomplete_varint() {
        let incomplete = vec![0x80];
        assert!(decode_u64(&incomplete).is_err());
    }

    #[test]
    fn test_overflow() {
        let overflow_data = vec![0xFF; 20];
        let err = decode_u64(&overflow_data).unwrap_err();
        assert!(err.is_corruption());
    }
}
