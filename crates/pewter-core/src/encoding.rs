//! Decoding of received lines.
//!
//! Lines are tried as UTF-8 first. Invalid input is decoded with the
//! configured legacy encoding; anything that encoding cannot map becomes
//! U+FFFD. Decoding never fails.

use std::borrow::Cow;

pub use encoding_rs::Encoding;

/// Default legacy encoding for servers that are not UTF-8 clean.
pub const DEFAULT_FALLBACK: &Encoding = encoding_rs::WINDOWS_1252;

/// Looks up an encoding by its WHATWG label (`"latin1"`, `"shift_jis"`, ...).
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Decodes one line.
pub fn decode_line<'a>(bytes: &'a [u8], fallback: &'static Encoding) -> Cow<'a, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, had_errors) = fallback.decode_without_bom_handling(bytes);
            if had_errors {
                tracing::debug!(encoding = fallback.name(), "Line contained unmappable bytes");
            }
            text
        }
    }
}
