//! VM integer encoding.
//!
//! The VM stores integers as minimal two's-complement little-endian byte
//! strings: the shortest sequence whose top bit still carries the sign.

/// Encode `value` in the VM's minimal two's-complement form.
///
/// Zero encodes as a single `0x00` byte.
pub fn encode_int(value: i128) -> Vec<u8> {
    let mut bytes = value.to_le_bytes().to_vec();
    while bytes.len() > 1 {
        let last = bytes[bytes.len() - 1];
        let sign_of_next = bytes[bytes.len() - 2] & 0x80;
        let redundant = (last == 0x00 && sign_of_next == 0) || (last == 0xFF && sign_of_next != 0);
        if !redundant {
            break;
        }
        bytes.pop();
    }
    bytes
}

/// Decode a two's-complement little-endian byte string.
///
/// Returns `None` if the value does not fit an `i128`. An empty slice is
/// zero.
pub fn decode_int(bytes: &[u8]) -> Option<i128> {
    if bytes.len() > 16 {
        return None;
    }
    let negative = bytes.last().is_some_and(|b| b & 0x80 != 0);
    let mut buffer = if negative { [0xFF; 16] } else { [0x00; 16] };
    buffer[..bytes.len()].copy_from_slice(bytes);
    Some(i128::from_le_bytes(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_encodings() {
        assert_eq!(encode_int(0), vec![0x00]);
        assert_eq!(encode_int(17), vec![0x11]);
        assert_eq!(encode_int(127), vec![0x7F]);
        assert_eq!(encode_int(128), vec![0x80, 0x00]);
        assert_eq!(encode_int(255), vec![0xFF, 0x00]);
        assert_eq!(encode_int(256), vec![0x00, 0x01]);
        assert_eq!(encode_int(-2), vec![0xFE]);
        assert_eq!(encode_int(-128), vec![0x80]);
        assert_eq!(encode_int(-129), vec![0x7F, 0xFF]);
    }

    #[test]
    fn decodes_back() {
        for value in [0, 1, -1, 17, -17, 1_000_000, -65_536, i64::MAX as i128, i128::MIN] {
            assert_eq!(decode_int(&encode_int(value)), Some(value), "value {value}");
        }
        assert_eq!(decode_int(&[]), Some(0));
        assert_eq!(decode_int(&[0; 17]), None);
    }
}
