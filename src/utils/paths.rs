// Entries are addressed by a parent directory path plus their own name:
//
//	/                  root entry, stored as { path: "/", name: "/" }
//	├── docs           { path: "/",     name: "docs" }
//	│   └── a.txt      { path: "/docs", name: "a.txt" }
//	└── b.bin          { path: "/",     name: "b.bin" }
//
// Full paths are only ever built and split through the helpers below so the
// root never yields `//name`.

pub const ROOT: &str = "/";

/// Collapses repeated slashes and strips the trailing one, unless the path is the root.
pub fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", parts.join("/"))
}

/// Returns the full path of `name` inside the directory `parent`,
/// (e.g. `/docs` + `a.txt` = `/docs/a.txt`).
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = normalize_path(parent);
    if parent == ROOT {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Splits a full path into its parent directory path and its own name.
/// The root splits into itself: `("/", "/")`.
pub fn split_path(path: &str) -> (String, String) {
    let path = normalize_path(path);
    if path == ROOT {
        return (ROOT.to_string(), ROOT.to_string());
    }
    match path.rsplit_once('/') {
        Some(("", name)) => (ROOT.to_string(), name.to_string()),
        Some((parent, name)) => (parent.to_string(), name.to_string()),
        None => (ROOT.to_string(), path),
    }
}

/// Whether `path` is `ancestor` itself or lies somewhere below it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    let path = normalize_path(path);
    let ancestor = normalize_path(ancestor);
    ancestor == ROOT || path == ancestor || path.starts_with(&format!("{ancestor}/"))
}
