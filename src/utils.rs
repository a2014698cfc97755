//! Utility functions for file names and file removal

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Characters that are not allowed in output file or directory names
const RESERVED_CHARS_PATTERN: &str = r#"[/\\?%*:|"<>]"#;

#[allow(clippy::expect_used)]
fn reserved_chars() -> &'static Regex {
    static RESERVED: OnceLock<Regex> = OnceLock::new();
    RESERVED.get_or_init(|| {
        Regex::new(RESERVED_CHARS_PATTERN).expect("reserved character pattern is valid")
    })
}

/// Make a metadata string safe to use as a single path component
///
/// Every reserved character (`/ \ ? % * : | " < >`) is replaced with `-` and
/// surrounding whitespace is trimmed. Names that would still resolve to the
/// current or parent directory (empty, `.`, `..`) become `_`.
///
/// # Examples
///
/// ```
/// use media_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("AC/DC"), "AC-DC");
/// assert_eq!(sanitize_filename("  What?  "), "What-");
/// assert_eq!(sanitize_filename(".."), "_");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced = reserved_chars().replace_all(name, "-");
    let trimmed = replaced.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return "_".to_string();
    }
    trimmed.to_string()
}

/// Remove a file if it exists
///
/// Returns `Ok(true)` if a file was removed and `Ok(false)` if there was
/// nothing to remove. Any other failure is returned to the caller, which
/// decides whether it matters.
pub async fn remove_file_if_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
