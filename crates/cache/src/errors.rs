//! Error handling for the cache engine
//!
//! Every failure carries a recovery hint so callers (and the orchestrator
//! itself) can decide between falling back, retrying or surfacing the error.

mod conversions;
mod display;
mod recovery;
mod types;

pub use types::*;
