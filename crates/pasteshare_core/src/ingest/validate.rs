//! Pre-upload attachment checks.

use crate::config::Limits;
use crate::error::AppError;
use crate::models::paste::IncomingFile;
use crate::text::lowercase_extension;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

/// A file that passed every check and is ready to upload.
#[derive(Debug)]
pub struct ValidatedFile {
    pub filename: String,
    /// Lowercased extension with leading dot.
    pub extension: String,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Validate a whole batch. Nothing is returned unless every file passes.
///
/// # Errors
/// Returns [`AppError::BadRequest`] naming the first offending file.
pub fn validate_all(
    files: Vec<IncomingFile>,
    limits: &Limits,
) -> Result<Vec<ValidatedFile>, AppError> {
    if files.len() > limits.max_attachment_count {
        return Err(AppError::BadRequest(format!(
            "too many attachments: {} (max {})",
            files.len(),
            limits.max_attachment_count
        )));
    }
    files
        .into_iter()
        .map(|file| validate_file(file, limits))
        .collect()
}

fn validate_file(file: IncomingFile, limits: &Limits) -> Result<ValidatedFile, AppError> {
    let IncomingFile {
        filename,
        content_type,
        bytes,
    } = file;

    if bytes.is_empty() {
        return Err(AppError::BadRequest(format!("'{}' is empty", filename)));
    }
    if bytes.len() as u64 > limits.max_attachment_bytes {
        return Err(AppError::BadRequest(format!(
            "'{}' exceeds the {} byte attachment limit",
            filename, limits.max_attachment_bytes
        )));
    }

    let extension = lowercase_extension(&filename).ok_or_else(|| {
        AppError::BadRequest(format!("'{}' has no file extension", filename))
    })?;
    let (mime_type, format) = match extension.as_str() {
        ".jpg" | ".jpeg" => ("image/jpeg", Some(ImageFormat::Jpeg)),
        ".png" => ("image/png", Some(ImageFormat::Png)),
        ".gif" => ("image/gif", Some(ImageFormat::Gif)),
        ".webp" => ("image/webp", Some(ImageFormat::WebP)),
        ".svg" => ("image/svg+xml", None),
        _ => {
            return Err(AppError::BadRequest(format!(
                "'{}' is not an allowed image type",
                filename
            )))
        }
    };

    if let Some(declared) = content_type.as_deref() {
        if !declared_type_matches(declared, mime_type) {
            return Err(AppError::BadRequest(format!(
                "'{}' was sent as {} but is named as {}",
                filename, declared, mime_type
            )));
        }
    }

    let (width, height) = match format {
        Some(expected) => raster_dimensions(&bytes, expected),
        None => svg_dimensions(&bytes),
    }
    .ok_or_else(|| AppError::BadRequest(format!("'{}' is not a readable image", filename)))?;

    Ok(ValidatedFile {
        filename,
        extension,
        mime_type,
        width,
        height,
        bytes,
    })
}

/// A client-declared type agrees with `mime_type` when it names the same
/// type, a common alias, or nothing specific.
fn declared_type_matches(declared: &str, mime_type: &str) -> bool {
    let essence = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "" | "application/octet-stream" => true,
        "image/jpg" | "image/pjpeg" => mime_type == "image/jpeg",
        other => other == mime_type,
    }
}

/// Header-only decode; the sniffed format must agree with the extension.
fn raster_dimensions(bytes: &[u8], expected: ImageFormat) -> Option<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    if reader.format() != Some(expected) {
        return None;
    }
    reader.into_dimensions().ok()
}

/// Size of the root `<svg>` element from `width`/`height`, else `viewBox`.
pub(crate) fn svg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let text = std::str::from_utf8(bytes).ok()?;
    let tag = svg_start_tag(text)?;

    let explicit = attribute(tag, "width")
        .and_then(parse_length)
        .zip(attribute(tag, "height").and_then(parse_length));
    if explicit.is_some() {
        return explicit;
    }

    let view_box = attribute(tag, "viewBox")?;
    let parts: Vec<f64> = view_box
        .split(|c: char| c.is_ascii_whitespace() || c == ',')
        .filter(|p| !p.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [_, _, w, h] => to_pixels(*w).zip(to_pixels(*h)),
        _ => None,
    }
}

/// Attributes of the first `<svg` start tag outside comments, without the
/// element name or closing `>`.
fn svg_start_tag(text: &str) -> Option<&str> {
    let mut pos = 0;
    while let Some(found) = text[pos..].find('<') {
        let at = pos + found;
        let markup = &text[at..];
        if let Some(comment) = markup.strip_prefix("<!--") {
            pos = at + 4 + comment.find("-->")? + 3;
            continue;
        }
        if let Some(rest) = markup.strip_prefix("<svg") {
            if rest.starts_with(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/') {
                return Some(&rest[..start_tag_end(rest)?]);
            }
        }
        pos = at + 1;
    }
    None
}

/// Offset of the `>` closing a start tag, ignoring any inside quoted values.
fn start_tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    for (index, c) in tag.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(open), _) if c == open => quote = None,
            (None, '>') => return Some(index),
            _ => {}
        }
    }
    None
}

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut search = 0;
    while let Some(pos) = tag[search..].find(name) {
        let at = search + pos;
        search = at + name.len();
        let preceded_by_space = tag[..at]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_whitespace());
        let rest = tag[search..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        if !preceded_by_space {
            continue;
        }
        let rest = rest.trim_start();
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let body = &rest[1..];
        let end = body.find(quote)?;
        return Some(&body[..end]);
    }
    None
}

fn parse_length(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed);
    to_pixels(number.trim().parse().ok()?)
}

fn to_pixels(value: f64) -> Option<u32> {
    if value.is_finite() && value > 0.0 && value <= u32::MAX as f64 {
        Some(value.round().max(1.0) as u32)
    } else {
        None
    }
}
