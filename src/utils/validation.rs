use once_cell::sync::Lazy;
use regex::Regex;

static PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([a-zA-Z0-9_-]+/?)*$").expect("path pattern is valid"));

static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("segment pattern is valid"));

static FILENAME_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_.-]+").expect("filename pattern is valid"));

/// Absolute directory path made of `[a-zA-Z0-9_-]+` segments, e.g. `/`, `/docs`, `/a/b/`.
pub fn is_valid_path(path: &str) -> bool {
    PATH_RE.is_match(path)
}

/// A single directory name, usable as a path segment.
pub fn is_valid_segment(name: &str) -> bool {
    SEGMENT_RE.is_match(name)
}

/// Spaces become underscores, then everything outside `[a-zA-Z0-9_.-]` is dropped.
/// The result may be empty.
pub fn sanitize_filename(name: &str) -> String {
    let name = name.replace(' ', "_");
    FILENAME_STRIP_RE.replace_all(&name, "").into_owned()
}
