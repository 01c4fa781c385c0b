//! Forward-slash project path helpers
//!
//! All paths inside the file set are project-relative and use `/` separators,
//! regardless of platform. These helpers work on that representation directly
//! instead of going through `std::path`, which would reintroduce platform
//! separators.

/// Normalize a project path: convert backslashes, resolve `.` and `..`
/// components, and collapse repeated separators.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();

    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                // Pop a real component; keep leading `..` for paths that
                // escape the project root.
                match parts.last() {
                    Some(&"..") | None => parts.push(".."),
                    Some(_) => {
                        parts.pop();
                    }
                }
            }
            other => parts.push(other),
        }
    }

    parts.join("/")
}

/// Join a base directory and a relative path, normalizing the result.
pub fn join(base: &str, rel: &str) -> String {
    if base.is_empty() {
        return normalize(rel);
    }
    normalize(&format!("{}/{}", base, rel))
}

/// Directory portion of a project path (empty string for bare file names).
pub fn dir_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// File-name portion of a project path.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Strip the final extension (including the dot) from a path, if any.
pub fn strip_extension(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &path[..path.len() - (name.len() - idx)],
        _ => path,
    }
}

/// Express `reference_file` relative to the directory containing `from_file`.
///
/// Used when a rewritten stylesheet needs to point at a sprite sheet: both
/// arguments are project paths sharing the same root.
pub fn relative_reference(reference_file: &str, from_file: &str) -> String {
    let ref_dir = dir_name(reference_file);
    let from_dir = dir_name(from_file);

    let ref_parts: Vec<&str> = ref_dir.split('/').filter(|p| !p.is_empty()).collect();
    let from_parts: Vec<&str> = from_dir.split('/').filter(|p| !p.is_empty()).collect();

    let common = ref_parts
        .iter()
        .zip(from_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..from_parts.len() {
        parts.push("..");
    }
    parts.extend(&ref_parts[common..]);
    parts.push(file_name(reference_file));

    parts.join("/")
}

/// Whether a `url()` value refers to a local project file (as opposed to an
/// absolute URL, a protocol-relative URL, or inline data).
pub fn is_local_url(url: &str) -> bool {
    !(url.is_empty()
        || url.starts_with("//")
        || url.starts_with("data:")
        || url.starts_with('#')
        || url.contains("://"))
}
