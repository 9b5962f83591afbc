//! Decoding of text fields written by arbitrary git clients.
//!
//! File names, author strings and messages in the corpus are whatever bytes
//! the original repository contained. UTF-8 is tried first. Otherwise every
//! legacy regional encoding that decodes the bytes cleanly is scored on how
//! plausible its reading is, and the best one wins. Decoding never fails.

use encoding_rs::{Encoding, BIG5, EUC_KR, GB18030, SHIFT_JIS, WINDOWS_1251, WINDOWS_1252};

/// Legacy encodings considered after UTF-8. Earlier entries win ties.
pub const LEGACY_ENCODINGS: [&Encoding; 6] =
    [EUC_KR, GB18030, BIG5, SHIFT_JIS, WINDOWS_1251, WINDOWS_1252];

/// Decode `raw` into a string. Never fails.
pub fn decode_text(raw: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(raw) {
        return s.to_owned();
    }
    let mut best: Option<(i64, &'static Encoding, String)> = None;
    for encoding in LEGACY_ENCODINGS {
        let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(raw) else {
            continue;
        };
        let score = plausibility(encoding, raw, &text);
        if best.as_ref().map_or(true, |(top, _, _)| score > *top) {
            best = Some((score, encoding, text.into_owned()));
        }
    }
    match best {
        Some((score, encoding, text)) => {
            tracing::trace!(encoding = encoding.name(), score, "decoded legacy text");
            text
        }
        None => String::from_utf8_lossy(raw).into_owned(),
    }
}

fn plausibility(encoding: &'static Encoding, raw: &[u8], text: &str) -> i64 {
    if encoding == SHIFT_JIS {
        shift_jis_score(raw)
    } else if encoding == GB18030 || encoding == BIG5 || encoding == EUC_KR {
        double_byte_score(encoding, raw)
    } else {
        single_byte_score(text)
    }
}

/// Every multi-byte character in the common plane of the encoding earns 2,
/// one point per byte, so scores compare with the single-byte ones.
fn double_byte_score(encoding: &'static Encoding, raw: &[u8]) -> i64 {
    let mut score = 0;
    let mut i = 0;
    while i < raw.len() {
        let lead = raw[i];
        if lead < 0x80 {
            i += 1;
            continue;
        }
        let Some(&trail) = raw.get(i + 1).filter(|_| (0x81..=0xfe).contains(&lead)) else {
            score -= 1;
            i += 1;
            continue;
        };
        if encoding == GB18030 && (0x30..=0x39).contains(&trail) {
            // Four-byte sequence outside GBK.
            score -= 2;
            i += 4;
            continue;
        }
        score += if encoding == GB18030 {
            // GB2312 level 1 hanzi
            if (0xb0..=0xd7).contains(&lead) && trail >= 0xa1 {
                2
            } else {
                -1
            }
        } else if encoding == BIG5 {
            // Frequently used hanzi, then symbols
            match lead {
                0xa4..=0xc6 => 2,
                0xa1..=0xa3 => 0,
                _ => -1,
            }
        } else {
            // KS X 1001 hangul, then symbols and jamo
            match lead {
                0xb0..=0xc8 if trail >= 0xa1 => 2,
                0xa1..=0xaf if trail >= 0xa1 => 0,
                _ => -1,
            }
        };
        i += 2;
    }
    score
}

fn shift_jis_score(raw: &[u8]) -> i64 {
    let mut score = 0;
    let mut i = 0;
    while i < raw.len() {
        let lead = raw[i];
        if lead < 0x80 {
            i += 1;
        } else if matches!(lead, 0x81..=0x9f | 0xe0..=0xfc) && i + 1 < raw.len() {
            score += match lead {
                0x81 => 1,
                // kana, then level 1 kanji
                0x82 | 0x83 | 0x88..=0x98 => 2,
                _ => -1,
            };
            i += 2;
        } else {
            // half-width katakana and stray bytes
            score -= 1;
            i += 1;
        }
    }
    score
}

fn is_ascii_letter(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_ascii_alphabetic())
}

fn is_latin_letter(c: char) -> bool {
    matches!(c, '\u{c0}'..='\u{ff}' if c != '\u{d7}' && c != '\u{f7}')
        || matches!(c, 'Œ' | 'œ' | 'Š' | 'š' | 'Ÿ' | 'Ž' | 'ž')
}

fn is_russian_letter(c: char) -> bool {
    matches!(c, '\u{410}'..='\u{44f}' | '\u{401}' | '\u{451}')
}

/// Letters of the encoding's script earn 1 each. Accented latin only counts
/// inside an ASCII word, cyrillic only outside one.
fn single_byte_score(text: &str) -> i64 {
    let chars: Vec<char> = text.chars().collect();
    let mut score = 0;
    for (i, &c) in chars.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        let in_ascii_word = is_ascii_letter(prev) || is_ascii_letter(next);
        score += if c.is_ascii() {
            if c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r') {
                -5
            } else {
                0
            }
        } else if c.is_control() {
            -5
        } else if is_russian_letter(c) {
            let case_flip = c.is_uppercase()
                && prev.is_some_and(|p| !p.is_ascii() && p.is_lowercase());
            if in_ascii_word || case_flip {
                -1
            } else {
                1
            }
        } else if is_latin_letter(c) {
            i64::from(in_ascii_word)
        } else if matches!(c, '\u{2000}'..='\u{206f}' | '€') {
            0
        } else {
            -1
        };
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(s: &str, encoding: &'static Encoding) {
        let (bytes, _, unmappable) = encoding.encode(s);
        assert!(!unmappable, "{s} not representable in {}", encoding.name());
        assert_eq!(decode_text(&bytes), s, "via {}", encoding.name());
    }

    #[test]
    fn utf8_passthrough() {
        assert_eq!(decode_text("新建文件夹".as_bytes()), "新建文件夹");
        assert_eq!(decode_text(b"README.md"), "README.md");
    }

    #[test]
    fn gbk_path_segment() {
        assert_eq!(
            decode_text(b"css/\xd0\xc2\xbd\xa8\xce\xc4\xbc\xfe\xbc\xd0/images"),
            "css/新建文件夹/images"
        );
    }

    #[test]
    fn simplified_chinese() {
        roundtrip("复件 (1) - 代码文件.rar", GB18030);
        roundtrip("深层路径/源码/测试/最终版_v2.c", GB18030);
    }

    #[test]
    fn japanese_shift_jis() {
        roundtrip("新しいフォルダー", SHIFT_JIS);
        roundtrip("デスクトップ/ソースコード.txt", SHIFT_JIS);
    }

    #[test]
    fn traditional_chinese_big5() {
        roundtrip("新增資料夾", BIG5);
        roundtrip("專案備份/未命名.bmp", BIG5);
    }

    #[test]
    fn korean() {
        roundtrip("공지사항.hwp", EUC_KR);
    }

    #[test]
    fn cyrillic() {
        roundtrip("Новая папка", WINDOWS_1251);
        roundtrip("C:/Program Files/Разное/readme.txt", WINDOWS_1251);
    }

    #[test]
    fn western_european() {
        roundtrip("Nouveau dossier/Crédit Agricole.pdf", WINDOWS_1252);
        roundtrip("München_Straße.jpg", WINDOWS_1252);
        roundtrip("Price_€500.txt", WINDOWS_1252);
    }

    proptest! {
        #[test]
        fn never_panics(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode_text(&raw);
        }
    }
}
