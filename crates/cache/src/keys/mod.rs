//! Cache key derivation
//!
//! A call is reduced to a canonical JSON document naming the callable and its
//! bound, encoded arguments. The SHA3-224 of that document is the cache key.

mod callable;
pub mod hash;
mod signature;
mod tests;

pub use callable::{Callable, Function};
pub use signature::{BoundArguments, Parameter, ParameterKind, Signature};

use crate::errors::Result;
use crate::serialization::{Codec, DeferredCall};
use crate::value::{Kwargs, Value};
use serde_json::{Map, Value as Json};
use std::fmt;

/// A call reduced to its canonical, encoded form
#[derive(Debug, Clone, PartialEq)]
pub struct CallSignature {
    pub callable_id: String,
    pub args: Vec<Json>,
    pub kwargs: Map<String, Json>,
}

impl CallSignature {
    /// Compact JSON with sorted keys
    pub fn canonical_json(&self) -> String {
        DeferredCall {
            target: self.callable_id.clone(),
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
        }
        .to_json()
        .to_string()
    }
}

/// Hex digest identifying a canonicalized call
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Bind and encode a call
///
/// File-backed arguments are checksummed, never copied into the cache.
pub fn canonicalize(
    codec: &Codec,
    callable: &dyn Callable,
    args: &[Value],
    kwargs: &Kwargs,
) -> Result<CallSignature> {
    let callable_id = callable.qualified_name().to_string();
    let bound = match callable.signature() {
        Some(signature) => signature.bind(&callable_id, args.to_vec(), kwargs.clone())?,
        None => BoundArguments {
            args: args.to_vec(),
            kwargs: kwargs.clone(),
        },
    };

    let args = bound
        .args
        .iter()
        .map(|value| codec.encode_for_key(value))
        .collect::<Result<Vec<_>>>()?;
    let kwargs = bound
        .kwargs
        .iter()
        .map(|(name, value)| Ok((name.clone(), codec.encode_for_key(value)?)))
        .collect::<Result<Map<_, _>>>()?;

    Ok(CallSignature {
        callable_id,
        args,
        kwargs,
    })
}

/// SHA3-224 of the canonical form
pub fn digest(signature: &CallSignature) -> CacheKey {
    CacheKey(hash::sha3_224_hex(signature.canonical_json().as_bytes()))
}

/// Canonicalize and digest in one step
pub fn hexdigest(
    codec: &Codec,
    callable: &dyn Callable,
    args: &[Value],
    kwargs: &Kwargs,
) -> Result<CacheKey> {
    canonicalize(codec, callable, args, kwargs).map(|signature| digest(&signature))
}
