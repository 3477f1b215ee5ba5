//! Path Helpers
//!
//! Result paths are written into manifests and marker files that are read
//! on other hosts (or inside containers) where the home directory may be
//! mounted under a different physical path. Paths below the home directory
//! are therefore reported relative to `$HOME`'s symbolic form.

use std::env;
use std::path::{Path, PathBuf};

/// Expands `$VAR` and `${VAR}` references from the environment.
/// Unknown variables are left untouched.
pub fn expand_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match (name.is_empty(), env::var(name)) {
            (false, Ok(value)) => out.push_str(&value),
            _ => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}

/// Returns the home directory as given by `$HOME`, if set.
pub fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

/// Replaces the physical (canonical) home prefix of `path` with the
/// symbolic `$HOME` form. Paths outside the home directory are returned
/// unchanged.
pub fn symbolic_home(path: &Path) -> PathBuf {
    let Some(home) = home_dir() else {
        return path.to_path_buf();
    };
    let physical = home.canonicalize().unwrap_or_else(|_| home.clone());

    match path.strip_prefix(&physical) {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Resolves a path for reporting: variables expanded, made absolute
/// against `working_dir`, home prefix normalized.
pub fn resolve(path: &str, working_dir: &Path) -> PathBuf {
    let expanded = PathBuf::from(expand_vars(path));
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        working_dir.join(expanded)
    };
    symbolic_home(&absolute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_vars_known_and_unknown() {
        env::set_var("RNASEQDE_TEST_REF", "/ref");
        assert_eq!(expand_vars("$RNASEQDE_TEST_REF/star"), "/ref/star");
        assert_eq!(expand_vars("${RNASEQDE_TEST_REF}/star"), "/ref/star");
        assert_eq!(
            expand_vars("$RNASEQDE_TEST_UNSET_VAR/x"),
            "$RNASEQDE_TEST_UNSET_VAR/x"
        );
        assert_eq!(expand_vars("cost $5"), "cost $5");
        assert_eq!(expand_vars("${unterminated"), "${unterminated");
    }

    #[test]
    fn test_resolve_relative_against_working_dir() {
        let resolved = resolve("out/a.bam", Path::new("/data/run"));
        assert_eq!(resolved, PathBuf::from("/data/run/out/a.bam"));
    }

    #[test]
    fn test_symbolic_home_outside_home_is_unchanged() {
        let path = Path::new("/nonexistent-root/x.bam");
        assert_eq!(symbolic_home(path), path);
    }
}
