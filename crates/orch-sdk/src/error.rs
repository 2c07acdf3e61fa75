use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Store(orch_store::Error),
    Runtime(orch_runtime::Error),
    UnknownSession(String),
    Busy,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "store error: {err}"),
            Error::Runtime(err) => write!(f, "runtime error: {err}"),
            Error::UnknownSession(id) => write!(f, "session not hydrated: {id}"),
            Error::Busy => write!(f, "no parallel slot available"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Runtime(err) => Some(err),
            Error::UnknownSession(_) | Error::Busy => None,
        }
    }
}

impl From<orch_store::Error> for Error {
    fn from(err: orch_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<orch_runtime::Error> for Error {
    fn from(err: orch_runtime::Error) -> Self {
        Error::Runtime(err)
    }
}
