//! Perl `pack("w", ...)` BER compressed integers.
//!
//! Unlike LEB128, the most significant 7-bit group comes first. Every byte
//! except the terminal (least significant) one has the high bit set.
//!
//! ```text
//! 461  = 0b11_1001101  ->  [0x83, 0x4d]
//! 0    ->  [0x00]
//! ```

use crate::error::{CodecError, CodecResult};

const CONTINUATION: u8 = 0x80;
const GROUP_MASK: u8 = 0x7f;

/// Append the BER encoding of `value` to `buf`.
pub fn encode_into(buf: &mut Vec<u8>, mut value: u64) {
    let mut groups = [0u8; 10];
    let mut n = 0;
    loop {
        groups[n] = (value as u8) & GROUP_MASK;
        n += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let byte = if i == 0 {
            groups[i]
        } else {
            groups[i] | CONTINUATION
        };
        buf.push(byte);
    }
}

/// Encode a sequence of integers back to back.
pub fn encode(values: &[u64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(values.len() * 2);
    for &v in values {
        encode_into(&mut buf, v);
    }
    buf
}

/// Decode one integer from the front of `data`. Returns (value, bytes_consumed).
pub fn decode_one(data: &[u8]) -> CodecResult<(u64, usize)> {
    let mut acc: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if acc > u64::MAX >> 7 {
            return Err(CodecError::Malformed {
                what: "BER integer",
                reason: "value exceeds 64 bits".into(),
            });
        }
        acc = (acc << 7) | u64::from(byte & GROUP_MASK);
        if byte & CONTINUATION == 0 {
            return Ok((acc, i + 1));
        }
    }
    Err(CodecError::Truncated {
        what: "BER integer",
        reason: format!("no terminal byte in {} bytes", data.len()),
    })
}

/// Decode every integer in `data`. An unterminated tail is an error.
pub fn decode(data: &[u8]) -> CodecResult<Vec<u64>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let (value, consumed) = decode_one(&data[pos..])?;
        out.push(value);
        pos += consumed;
    }
    Ok(out)
}
