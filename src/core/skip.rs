use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

use super::error::CoreError;

/// Builds a matcher for `.gitignore`-style skip patterns anchored at `root`.
///
/// Blank lines and `#` comments are ignored, `target/` only matches
/// directories, and patterns without a slash match at any depth.
pub fn build_skip_matcher(root: &Path, patterns: &[String]) -> Result<Gitignore, CoreError> {
    let mut builder = GitignoreBuilder::new(root);

    for pattern in patterns {
        let trimmed_pattern = pattern.trim();
        if trimmed_pattern.is_empty() || trimmed_pattern.starts_with('#') {
            continue;
        }
        builder.add_line(None, trimmed_pattern)?;
    }

    Ok(builder.build()?)
}

/// Returns true when `path` is excluded by `matcher`.
pub fn is_skipped(matcher: &Gitignore, path: &Path, is_dir: bool) -> bool {
    matcher.matched(path, is_dir).is_ignore()
}
