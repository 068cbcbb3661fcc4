//! Plain text and CSV decoding.

const UTF8_BOM: &[u8] = &[0xef, 0xbb, 0xbf];

/// Best-effort UTF-8 decode. Invalid sequences become U+FFFD.
pub(super) fn decode(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    String::from_utf8_lossy(body).into_owned()
}
