use glob::Pattern;
use std::path::Path;

/// Checks if a file carries one of the corpus suffixes (case-insensitive)
pub fn has_valid_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Checks a path, relative to its shard root, against the ignore globs
pub fn should_ignore(relative: &Path, ignore_patterns: &[String]) -> bool {
    let normalized = relative.to_string_lossy().replace('\\', "/");
    ignore_patterns.iter().any(|pattern| match Pattern::new(pattern) {
        Ok(p) => p.matches(&normalized),
        Err(_) => false,
    })
}

/// Determines if a discovered file belongs to the corpus
pub fn should_include_file(
    path: &Path,
    relative: &Path,
    extensions: &[String],
    ignore_patterns: &[String],
) -> bool {
    has_valid_extension(path, extensions) && !should_ignore(relative, ignore_patterns)
}
