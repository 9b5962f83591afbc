//! Compress::LZF framing.
//!
//! The corpus was written by Perl's `Compress::LZF`, which prefixes the raw
//! LZF block with the uncompressed length in a UTF-8 style header:
//!
//! ```text
//! 0xxxxxxx                      len < 0x80
//! 110xxxxx 10xxxxxx             len < 0x800
//! 1110xxxx 10xxxxxx 10xxxxxx    len < 0x10000
//! ...                           up to 6 header bytes
//! 0x00 <raw bytes>              stored uncompressed
//! ```

use crate::error::{CodecError, CodecResult};

/// Header lead byte marking an uncompressed ("stored") payload.
const STORED: u8 = 0x00;

/// Largest length the 6-byte header form can express.
const MAX_FRAMED_LEN: usize = 0x7fff_ffff;

/// Parse the length header. Returns (header_len, uncompressed_len).
pub fn frame_header(data: &[u8]) -> CodecResult<(usize, usize)> {
    let lead = *data.first().ok_or_else(|| CodecError::Truncated {
        what: "LZF header",
        reason: "empty payload".into(),
    })?;
    let (mut len, extra) = match lead {
        b if b & 0x80 == 0 => (usize::from(b), 0),
        b if b & 0xe0 == 0xc0 => (usize::from(b & 0x1f), 1),
        b if b & 0xf0 == 0xe0 => (usize::from(b & 0x0f), 2),
        b if b & 0xf8 == 0xf0 => (usize::from(b & 0x07), 3),
        b if b & 0xfc == 0xf8 => (usize::from(b & 0x03), 4),
        b if b & 0xfe == 0xfc => (usize::from(b & 0x01), 5),
        b => {
            return Err(CodecError::Malformed {
                what: "LZF header",
                reason: format!("invalid lead byte {b:#04x}"),
            })
        }
    };
    if data.len() < 1 + extra {
        return Err(CodecError::Truncated {
            what: "LZF header",
            reason: format!("need {} header bytes, have {}", 1 + extra, data.len()),
        });
    }
    for &b in &data[1..=extra] {
        len = (len << 6) | usize::from(b & 0x3f);
    }
    Ok((1 + extra, len))
}

fn encode_header(buf: &mut Vec<u8>, len: usize) {
    let (lead_bits, extra) = match len {
        0..=0x7f => {
            buf.push(len as u8);
            return;
        }
        0x80..=0x7ff => (0xc0u8, 1),
        0x800..=0xffff => (0xe0, 2),
        0x1_0000..=0x1f_ffff => (0xf0, 3),
        0x20_0000..=0x3ff_ffff => (0xf8, 4),
        _ => (0xfc, 5),
    };
    buf.push(lead_bits | (len >> (6 * extra)) as u8);
    for i in (0..extra).rev() {
        buf.push(0x80 | ((len >> (6 * i)) as u8 & 0x3f));
    }
}

/// Decompress a framed payload. An empty payload decodes to empty.
pub fn decompress(data: &[u8]) -> CodecResult<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data[0] == STORED {
        return Ok(data[1..].to_vec());
    }
    let (start, len) = frame_header(data)?;
    let out = lzf::decompress(&data[start..], len)
        .map_err(|e| CodecError::Lzf(format!("{e:?}")))?;
    if out.len() != len {
        return Err(CodecError::Lzf(format!(
            "expected {len} bytes, got {}",
            out.len()
        )));
    }
    Ok(out)
}

/// Decompress, falling back to the input bytes when they are not a valid frame.
pub fn decompress_or_raw(data: &[u8]) -> Vec<u8> {
    match decompress(data) {
        Ok(out) => out,
        Err(_) => data.to_vec(),
    }
}

/// Compress into a framed payload, storing uncompressed when LZF does not help.
pub fn compress(data: &[u8]) -> CodecResult<Vec<u8>> {
    if data.len() > MAX_FRAMED_LEN {
        return Err(CodecError::Malformed {
            what: "LZF input",
            reason: format!("{} bytes exceeds frame limit", data.len()),
        });
    }
    let block = if data.is_empty() {
        None
    } else {
        lzf::compress(data).ok()
    };
    match block {
        Some(block) if block.len() < data.len() => {
            let mut buf = Vec::with_capacity(block.len() + 6);
            encode_header(&mut buf, data.len());
            buf.extend_from_slice(&block);
            Ok(buf)
        }
        _ => {
            let mut buf = Vec::with_capacity(data.len() + 1);
            buf.push(STORED);
            buf.extend_from_slice(data);
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn header_examples() {
        assert_eq!(frame_header(b"\xc4\x9b").unwrap(), (2, 283));
        assert_eq!(frame_header(b"\xc3\xa4").unwrap(), (2, 228));
        assert_eq!(frame_header(b"\xc3\x8a\x96").unwrap(), (2, 202));
        assert_eq!(frame_header(b"\x05abc").unwrap(), (1, 5));
    }

    #[test]
    fn header_rejects_continuation_lead() {
        assert!(matches!(
            frame_header(b"\x85"),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn header_rejects_missing_tail() {
        assert!(matches!(
            frame_header(b"\xe1\x80"),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn header_encoding_matches_parser() {
        for len in [0usize, 1, 127, 128, 283, 0x7ff, 0x800, 0xffff, 0x10000, 0x20_0000] {
            let mut buf = Vec::new();
            encode_header(&mut buf, len);
            assert_eq!(frame_header(&buf).unwrap(), (buf.len(), len), "len {len}");
        }
    }

    #[test]
    fn stored_payload() {
        assert_eq!(decompress(b"\x00raw").unwrap(), b"raw");
        assert_eq!(decompress(b"").unwrap(), b"");
    }

    #[test]
    fn compressible_text_shrinks() {
        let text = "README.md;".repeat(50);
        let framed = compress(text.as_bytes()).unwrap();
        assert_ne!(framed[0], STORED);
        assert!(framed.len() < text.len());
        assert_eq!(decompress(&framed).unwrap(), text.as_bytes());
    }

    #[test]
    fn incompressible_is_stored() {
        let framed = compress(b"ab").unwrap();
        assert_eq!(framed, b"\x00ab");
    }

    #[test]
    fn or_raw_falls_back() {
        assert_eq!(decompress_or_raw(b"\xffnot lzf"), b"\xffnot lzf");
    }

    proptest! {
        #[test]
        fn roundtrip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let framed = compress(&data).unwrap();
            prop_assert_eq!(decompress(&framed).unwrap(), data);
        }
    }
}
