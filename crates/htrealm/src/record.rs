//! Line-level helpers shared by the flat-file sources.

use std::borrow::Cow;

/// Splits `line` on its first `:` into a key and the raw remainder.
///
/// Returns `None` when the line carries no colon at all.
pub fn split_key_data(line: &str) -> Option<(&str, &str)> {
    line.split_once(':')
}

/// Reduces `text` to its ASCII alphanumeric characters.
///
/// Borrows the input untouched when nothing had to be removed.
pub fn sanitize_identifier(text: &str) -> Cow<'_, str> {
    if text.bytes().all(|b| b.is_ascii_alphanumeric()) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(char::is_ascii_alphanumeric).collect())
    }
}

/// Whether a raw line is a `#` comment.
pub(crate) fn is_comment(line: &str) -> bool {
    line.starts_with('#')
}
