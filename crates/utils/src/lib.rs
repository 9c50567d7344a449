//! Shared utilities for callcache
//!
//! Filesystem helpers (XDG locations, atomic writes and copies) and the
//! tracing bootstrap used by the command line tool.

pub mod atomic_file;
pub mod tracing;
pub mod xdg;

pub use atomic_file::*;
pub use xdg::*;
