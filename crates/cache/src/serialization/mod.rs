//! Value serialization
//!
//! Values are stored as JSON. Literals map onto JSON directly; everything
//! else is written as a deferred-reconstruction record naming the decoder
//! that rebuilds it.

mod builtin;
mod codec;
mod record;
mod registry;

pub use builtin::{
    BYTES_TARGET, DATETIME_TARGET, DATE_TARGET, DURATION_TARGET, FILE_TARGET, MAP_TARGET,
};
pub use codec::{Codec, DecodeContext, EncodeContext, EncodeMode};
pub use record::{DeferredCall, RECORD_KIND};
pub use registry::{CodecRegistry, DecodeFn, EncodeFn};
