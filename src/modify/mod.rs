//! Code modification and validation pipeline.
//!
//! The interactor sequences the stage adapters in a fixed order:
//! analysis, planning, validation (with bounded feedback retries),
//! diffing, and documentation; the patch applier then writes the result
//! to the working tree. Analyzer output always precedes modifier input,
//! which precedes validator input, which precedes diffing input.

pub mod analyzer;
pub mod diffing;
pub mod docs;
pub mod interactor;
pub mod modifier;
pub mod patcher;
pub mod transforms;
pub mod validator;

pub use analyzer::{AnalyzerAdapter, SECURITY_KEYWORDS};
pub use diffing::DiffingAdapter;
pub use docs::DocumentationAdapter;
pub use interactor::{DEFAULT_MAX_RETRIES, ModifyCodeInteractor};
pub use modifier::ModifierAdapter;
pub use patcher::PatchApplier;
pub use validator::{CHECK_CATEGORIES, ValidatorAdapter};

use crate::error::{ModifyError, Result};
use std::path::{Component, Path, PathBuf};

/// Resolves a project-relative path against the root, rejecting any path
/// that escapes it after normalization.
///
/// Absolute paths and `..` components that climb above the root fail
/// with `PathEscape`. The check is lexical; the target need not exist.
///
/// # Errors
///
/// Returns `ModifyError::PathEscape` for unsafe paths.
pub fn resolve_in_root(project_root: &Path, relative: &str) -> Result<PathBuf> {
    let escape = || ModifyError::PathEscape {
        path: relative.to_string(),
    };

    let candidate = Path::new(relative);
    if candidate.is_absolute() {
        return Err(escape().into());
    }

    let mut normalized = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(escape().into());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(escape().into()),
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(escape().into());
    }

    Ok(project_root.join(normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_relative_path_resolves() {
        let root = Path::new("/tmp/project");
        let resolved = resolve_in_root(root, "src/app.py").unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/project/src/app.py"));
    }

    #[test]
    fn test_curdir_components_collapse() {
        let root = Path::new("/tmp/project");
        let resolved = resolve_in_root(root, "./src/./app.py").unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/project/src/app.py"));
    }

    #[test]
    fn test_internal_parent_dir_allowed() {
        let root = Path::new("/tmp/project");
        let resolved = resolve_in_root(root, "src/../app.py").unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/project/app.py"));
    }

    #[test]
    fn test_leading_parent_dir_rejected() {
        let root = Path::new("/tmp/project");
        assert!(resolve_in_root(root, "../outside.py").is_err());
        assert!(resolve_in_root(root, "src/../../outside.py").is_err());
    }

    #[test]
    fn test_absolute_path_rejected() {
        let root = Path::new("/tmp/project");
        assert!(resolve_in_root(root, "/etc/passwd").is_err());
    }

    #[test]
    fn test_empty_path_rejected() {
        let root = Path::new("/tmp/project");
        assert!(resolve_in_root(root, "").is_err());
        assert!(resolve_in_root(root, ".").is_err());
    }

    #[test]
    fn test_resolved_path_has_root_prefix() {
        let root = Path::new("/tmp/project");
        for rel in ["a.py", "deep/nested/b.py", "./c.py"] {
            let resolved = resolve_in_root(root, rel).unwrap();
            assert!(resolved.starts_with(root));
        }
    }
}
