//! Key normalization
//!
//! A key is a normalized relative path identifying the same logical
//! object on both sides of a sync pair. Both backends must produce keys
//! through [`normalize`] so the union of the two listings lines up.

/// A normalized relative path, unique within a sync pair.
pub type Key = String;

/// Normalize a raw path into a key.
///
/// - backslashes become forward slashes
/// - leading slashes and `./` prefixes are stripped
/// - empty and `.` segments are collapsed
pub fn normalize(raw: &str) -> Key {
    raw.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Append a trailing separator if absent.
///
/// Both targets of a sync pair are normalized to directory semantics so
/// prefix matching on the remote side cannot falsely include sibling
/// keys (`photos` must not match `photos-old/...`).
pub fn ensure_trailing_slash(raw: &str) -> String {
    if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    }
}
