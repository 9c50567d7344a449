//! Cache operations

mod get;
mod maintenance;
mod remove;
