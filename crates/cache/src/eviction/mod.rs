//! Eviction of cached files
//!
//! The cache-files area is bounded by deleting whole entries, least valuable
//! first under an [`EvictionPolicy`], together with every file their values
//! reference. Blobs no entry references can be swept first.

mod accounting;
mod engine;
mod filter;
mod policy;

pub use accounting::SizeLedger;
pub use engine::{CleanOptions, CleanReport, Evictor};
pub use filter::{TagFilter, TagList};
pub use policy::EvictionPolicy;
