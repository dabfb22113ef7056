//! Encode and decode varints.
//!
//! Variable length integers (_varints_) are the default encoding of integers
//! in Protocol Buffers messages, including field tags and lengths. Each byte
//! holds 7 bits of the value, least significant group first, with the high
//! bit set on every byte except the last.
//!
//! See <https://protobuf.dev/programming-guides/encoding/#varints>.

/// Maximum number of bytes for an encoded varint.
///
/// A decoded varint is a u64 value. Each byte contains 7 value bits and one
/// continuation bit. Hence we need 9 "full" bytes plus one bit from the 10th byte.
pub const MAX_VARINT_LEN: usize = 10;

#[derive(Clone, Debug, PartialEq)]
pub enum VarintError {
    /// The input ended before the final byte of the varint.
    Eof,
    /// The varint is longer than 10 bytes or its value exceeds 64 bits.
    InvalidVarint,
}

/// Decode a varint of up to 64 bits from the start of `buf`.
///
/// Returns the value and the number of bytes consumed.
///
/// Values of 32-bit types are decoded with this function and then truncated.
/// Negative `int32` values are sign-extended to 10 bytes by encoders, so
/// stopping after 5 bytes would leave the rest of the varint unread.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut value = 0;

    for (index, byte) in buf.iter().copied().take(MAX_VARINT_LEN).enumerate() {
        // High bit is continuation bit. Low 7 bits are the payload.
        value |= ((byte & 0x7f) as u64) << (index * 7);
        if byte <= 0x7f {
            // Only one value bit from the last byte may be used.
            if index + 1 == MAX_VARINT_LEN && byte > 0x01 {
                return Err(VarintError::InvalidVarint);
            }
            return Ok((value, index + 1));
        }
    }

    if buf.len() >= MAX_VARINT_LEN {
        Err(VarintError::InvalidVarint)
    } else {
        Err(VarintError::Eof)
    }
}

/// Append the varint encoding of `val` to `out`.
pub fn encode_varint(mut val: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (val & 0x7f) as u8;
        if val <= 0x7f {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
        val >>= 7;
    }
}

/// Return the number of bytes needed to encode `val` as a varint.
pub fn varint_len(val: u64) -> usize {
    let bits = 64 - (val | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

#[cfg(test)]
mod tests {
    use protowire_testing::TestCases;

    use super::{decode_varint, encode_varint, varint_len, VarintError};

    fn encode(val: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_varint(val, &mut buf);
        buf
    }

    #[test]
    fn test_decode_varint() {
        let mut values: Vec<u64> = (0..1024).collect();
        values.extend([u32::MAX as u64, i32::MIN as i64 as u64, u64::MAX]);
        for val in values {
            let buf = encode(val);
            assert_eq!(buf.len(), varint_len(val));
            let (decoded, len) = decode_varint(&buf).unwrap();
            assert_eq!(decoded, val);
            assert_eq!(len, buf.len());
        }
    }

    #[test]
    fn test_decode_varint_sequence() {
        // Example from https://protobuf.dev/programming-guides/encoding/#simple.
        let buf = [0x08, 0x96, 0x01];
        let (tag, len) = decode_varint(&buf).unwrap();
        assert_eq!((tag, len), (8, 1));
        let (val, len) = decode_varint(&buf[1..]).unwrap();
        assert_eq!((val, len), (150, 2));
        assert_eq!(decode_varint(&buf[3..]), Err(VarintError::Eof));
    }

    #[test]
    fn test_invalid_varint() {
        #[derive(Debug)]
        struct Case {
            buf: Vec<u8>,
            expected: VarintError,
        }

        let mut too_big = encode(u64::MAX);
        too_big[9] += 1;

        let mut too_long = vec![0xff; 10];
        too_long.push(0x01);

        let cases = [
            // Truncated inside the continuation bytes.
            Case {
                buf: vec![0x96],
                expected: VarintError::Eof,
            },
            // Value bits beyond 64 in the 10th byte.
            Case {
                buf: too_big,
                expected: VarintError::InvalidVarint,
            },
            // 11 bytes.
            Case {
                buf: too_long,
                expected: VarintError::InvalidVarint,
            },
        ];

        cases.test_each(|case| {
            assert_eq!(decode_varint(&case.buf), Err(case.expected.clone()));
        });
    }

    #[test]
    fn test_varint_len() {
        assert_eq!(varint_len(0), 1);
        assert_eq!(varint_len(127), 1);
        assert_eq!(varint_len(128), 2);
        assert_eq!(varint_len(u64::MAX), 10);
    }
}
