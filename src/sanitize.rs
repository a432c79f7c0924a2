//! Channel-name sanitization for filesystem artifacts.
//!
//! Raw channel identifiers come straight out of device logs and can contain
//! spaces, path separators, degree signs and worse. Any component that writes
//! a per-channel artifact to disk goes through [`sanitize_channel_name`]
//! first.

use crate::state::{MAX_SANITIZED_NAME_LEN, TRUNCATION_MARKER};

/// Make a channel name safe to use as a filesystem path component.
///
/// Spaces, hyphens and path separators become underscores; every other
/// non-alphanumeric, non-underscore character is stripped. The result is
/// truncated to [`MAX_SANITIZED_NAME_LEN`] characters with a trailing
/// [`TRUNCATION_MARKER`] when truncation happened.
pub fn sanitize_channel_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            ' ' | '-' | '/' | '\\' => out.push('_'),
            c if c.is_ascii_alphanumeric() || c == '_' => out.push(c),
            _ => {}
        }
    }

    if out.len() > MAX_SANITIZED_NAME_LEN {
        out.truncate(MAX_SANITIZED_NAME_LEN);
        out.push_str(TRUNCATION_MARKER);
    }
    out
}
