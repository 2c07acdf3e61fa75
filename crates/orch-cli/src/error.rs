use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level CLI error. Distinct from `orch_sdk::Error` so exit codes stay
/// a CLI concern rather than leaking into the library surface.
#[derive(Debug)]
pub enum Error {
    Sdk(orch_sdk::Error),
    Argument(String),
    NoSessionSpecified,
    WorkspaceNotFound(std::path::PathBuf),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Sdk(err) => write!(f, "{err}"),
            Error::Argument(msg) => write!(f, "{msg}"),
            Error::NoSessionSpecified => write!(f, "no session id given and none can be inferred; pass --session"),
            Error::WorkspaceNotFound(path) => write!(f, "workspace not found: {}", path.display()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Sdk(err) => Some(err),
            Error::Argument(_) | Error::NoSessionSpecified | Error::WorkspaceNotFound(_) => None,
        }
    }
}

impl From<orch_sdk::Error> for Error {
    fn from(err: orch_sdk::Error) -> Self {
        Error::Sdk(err)
    }
}

impl Error {
    /// Maps to the exit codes the CLI promises: 0 success, 1 generic
    /// failure, 2 argument error. 130/143 are assigned by `main` directly
    /// on signal receipt, not through this path.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Argument(_) | Error::NoSessionSpecified | Error::WorkspaceNotFound(_) => 2,
            Error::Sdk(_) => 1,
        }
    }
}
