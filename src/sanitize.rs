//! Gallery Vault - Name Sanitizer
//!
//! Maps user supplied names onto identifiers every common filesystem accepts.

/// Placeholder for characters that cannot appear in a path segment
pub const PLACEHOLDER: char = '_';

/// Extension every page is stored under
pub const PAGE_EXTENSION: &str = "jpg";

fn is_forbidden(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*' | '/' | '\\')
}

/// Replace characters illegal in common filesystems and trim whitespace.
///
/// Idempotent: the placeholder is never forbidden and trimming a trimmed
/// string is a no-op.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if is_forbidden(c) { PLACEHOLDER } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sanitize a name that becomes a single directory or file in the vault.
///
/// Rejects results that are empty or that the filesystem would interpret
/// as a relative reference.
pub fn sanitize_segment(name: &str) -> Option<String> {
    let clean = sanitize_name(name);
    if clean.is_empty() || clean == "." || clean == ".." {
        None
    } else {
        Some(clean)
    }
}

/// Sanitize a page file name and swap its extension for the stored one
pub fn page_file_name(file_name: &str) -> Option<String> {
    let stem = match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    };
    sanitize_segment(stem).map(|stem| format!("{}.{}", stem, PAGE_EXTENSION))
}
