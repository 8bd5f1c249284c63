//! Slice text normalization and hashing.

/// Strip surrounding whitespace and drop every ASCII space.
///
/// Two slices that differ only in spacing normalize to the same string.
pub fn normalize_text(text: &str) -> String {
    text.trim().replace(' ', "")
}

/// Hex digest of the normalized text; the dedup key inside one document.
pub fn text_hash(text: &str) -> String {
    blake3::hash(normalize_text(text).as_bytes())
        .to_hex()
        .to_string()
}

/// Reranker input for one slice: `《title》:text`.
pub fn title_text(title: &str, text: &str) -> String {
    format!("《{title}》:{text}")
}
