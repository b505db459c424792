//! Shared text normalization helpers.

/// Trim an optional string and drop empty values.
///
/// # Returns
/// `None` when the input is missing or whitespace-only; otherwise the trimmed
/// string.
pub fn normalize_optional_nonempty(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Count characters the way length limits are expressed (scalar values, not bytes).
pub fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Lowercased extension of `filename` including the leading dot, if any.
pub fn lowercase_extension(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}
