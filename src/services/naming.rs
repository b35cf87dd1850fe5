//! src/services/naming.rs
//!
//! Name generation for stored uploads and submissions.
//!
//! Stored files are named `{unix_millis}-{12 hex chars}{ext}`: the random
//! part carries 48 bits, so two uploads landing in the same millisecond
//! collide with negligible probability. Nothing here checks for existing
//! entries; uniqueness is purely probabilistic.

use chrono::Utc;

/// Number of random bytes in a stored file name (48 bits).
const FILE_NAME_RANDOM_BYTES: usize = 6;

/// Number of random bytes in a submission id (96 bits, 24 hex chars).
const SUBMISSION_ID_BYTES: usize = 12;

/// Longest extension we are willing to carry over from client input.
const MAX_EXTENSION_LEN: usize = 16;

/// Build a collision-resistant file name for an upload.
///
/// The extension comes from `original_name` when it has one, otherwise from
/// the subtype of `mime_type` (`image/png` -> `.png`). Candidates containing
/// anything other than ASCII alphanumerics, `+`, `-` or `_` are dropped, so
/// the result can never contain a path separator.
pub fn unique_file_name(original_name: Option<&str>, mime_type: Option<&str>) -> String {
    let ts = Utc::now().timestamp_millis();
    let rand = hex::encode(rand::random::<[u8; FILE_NAME_RANDOM_BYTES]>());
    let ext = original_name
        .and_then(extension_of)
        .or_else(|| mime_type.and_then(extension_from_mime))
        .unwrap_or_default();
    format!("{ts}-{rand}{ext}")
}

/// Generate a fresh submission id: 96 random bits, lowercase hex.
pub fn submission_id() -> String {
    hex::encode(rand::random::<[u8; SUBMISSION_ID_BYTES]>())
}

/// Extension of the final path component, including the leading dot.
///
/// Follows the usual "extname" rules: `photo.tar.gz` -> `.gz`, a leading dot
/// (`.bashrc`) does not start an extension, and a trailing dot yields `.`.
fn extension_of(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let idx = base.rfind('.')?;
    if base[..idx].bytes().all(|b| b == b'.') {
        return None;
    }
    let ext = &base[idx..];
    sanitize_extension(ext)
}

fn extension_from_mime(mime: &str) -> Option<String> {
    let subtype = mime.split(';').next()?.trim().split('/').nth(1)?;
    if subtype.is_empty() {
        return None;
    }
    sanitize_extension(&format!(".{subtype}"))
}

fn sanitize_extension(ext: &str) -> Option<String> {
    if ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    let ok = ext[1..]
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'_'));
    ok.then(|| ext.to_string())
}
