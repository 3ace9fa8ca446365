//! Lexical path normalization for repo-relative file comparisons.

/// Normalize a path lexically: unify separators to `/`, collapse repeated
/// separators, drop `.` segments and resolve `..` against the preceding
/// segment. A rooted path never climbs above `/`. An empty result is `.`.
pub fn clean(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let rooted = unified.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.last().is_some_and(|last| return *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if rooted {
        return format!("/{joined}");
    }
    if joined.is_empty() {
        return ".".to_string();
    }
    return joined;
}
