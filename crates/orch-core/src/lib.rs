//! Workspace path resolution, content hashing, and atomic file I/O shared
//! by every component that touches disk.

pub mod atomic;
pub mod hash;
pub mod path;
pub mod tokens;

pub use atomic::write_atomic;
pub use hash::{canonical_json, sha256_hex};
pub use path::{config_root, resolve_in_workspace, PathError};
pub use tokens::{CharBasedEstimator, TokenEstimator};
