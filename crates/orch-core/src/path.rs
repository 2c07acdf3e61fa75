use std::fmt;
use std::path::{Component, Path, PathBuf};

#[derive(Debug)]
pub enum PathError {
    EscapesWorkspace { candidate: String },
    Absolute { candidate: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::EscapesWorkspace { candidate } => {
                write!(f, "path escapes workspace via '..': {candidate}")
            }
            PathError::Absolute { candidate } => {
                write!(f, "absolute path outside workspace: {candidate}")
            }
        }
    }
}

impl std::error::Error for PathError {}

/// Resolve `candidate` against `workspace_root`, rejecting anything that
/// would land outside the workspace: `..` segments that climb past the
/// root, and absolute paths that don't themselves live under the root.
///
/// This is the boundary `FileChangeTracker::capture_before_tool_call`
/// relies on before snapshotting any tool argument that looks like a path.
pub fn resolve_in_workspace(workspace_root: &Path, candidate: &str) -> Result<PathBuf, PathError> {
    let candidate_path = Path::new(candidate);

    let joined = if candidate_path.is_absolute() {
        candidate_path.to_path_buf()
    } else {
        workspace_root.join(candidate_path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(PathError::EscapesWorkspace {
                        candidate: candidate.to_string(),
                    });
                }
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }

    if !normalized.starts_with(workspace_root) {
        return Err(PathError::Absolute {
            candidate: candidate.to_string(),
        });
    }

    Ok(normalized)
}

/// Root directory for runtime configuration and skill discovery, honoring
/// `XDG_CONFIG_HOME` with a fallback to the platform config directory.
pub fn config_root() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg);
        }
    }
    dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_dir_escape() {
        let root = PathBuf::from("/workspace/project");
        let err = resolve_in_workspace(&root, "../../etc/passwd").unwrap_err();
        assert!(matches!(err, PathError::EscapesWorkspace { .. }));
    }

    #[test]
    fn rejects_absolute_path_outside_workspace() {
        let root = PathBuf::from("/workspace/project");
        let err = resolve_in_workspace(&root, "/etc/passwd").unwrap_err();
        assert!(matches!(err, PathError::Absolute { .. }));
    }

    #[test]
    fn accepts_relative_path_inside_workspace() {
        let root = PathBuf::from("/workspace/project");
        let resolved = resolve_in_workspace(&root, "src/main.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/workspace/project/src/main.rs"));
    }

    #[test]
    fn accepts_nested_parent_dir_that_stays_inside() {
        let root = PathBuf::from("/workspace/project");
        let resolved = resolve_in_workspace(&root, "src/../lib.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/workspace/project/lib.rs"));
    }

    #[test]
    fn accepts_absolute_path_already_inside_workspace() {
        let root = PathBuf::from("/workspace/project");
        let resolved = resolve_in_workspace(&root, "/workspace/project/src/main.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/workspace/project/src/main.rs"));
    }
}
