use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Serde(serde_json::Error),
    Yaml(serde_yaml::Error),
    Path(orch_core::PathError),
    Store(orch_store::Error),
    RestoreFailed { reason: String, failed_paths: Vec<String> },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {err}"),
            Error::Serde(err) => write!(f, "serialization error: {err}"),
            Error::Yaml(err) => write!(f, "skill frontmatter parse error: {err}"),
            Error::Path(err) => write!(f, "path error: {err}"),
            Error::Store(err) => write!(f, "store error: {err}"),
            Error::RestoreFailed { reason, failed_paths } => {
                write!(f, "rollback failed: {reason} (paths: {})", failed_paths.join(", "))
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Serde(err) => Some(err),
            Error::Yaml(err) => Some(err),
            Error::Path(err) => Some(err),
            Error::Store(err) => Some(err),
            Error::RestoreFailed { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err)
    }
}

impl From<orch_core::PathError> for Error {
    fn from(err: orch_core::PathError) -> Self {
        Error::Path(err)
    }
}

impl From<orch_store::Error> for Error {
    fn from(err: orch_store::Error) -> Self {
        Error::Store(err)
    }
}
