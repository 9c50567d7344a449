//! Encoder and decoder registration

use super::builtin;
use super::codec::{DecodeContext, EncodeContext};
use super::record::DeferredCall;
use crate::errors::{CacheError, Result};
use crate::value::{Object, Value};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as Json;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type EncodeFn = Arc<dyn Fn(&Object, &EncodeContext<'_>) -> Result<Json> + Send + Sync>;
pub type DecodeFn = Arc<dyn Fn(&DeferredCall, &DecodeContext<'_>) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct EncoderEntry {
    pub(crate) encode: EncodeFn,
}

#[derive(Clone)]
pub(crate) struct DecoderEntry {
    pub(crate) decode: DecodeFn,
    pub(crate) file_backed: bool,
}

/// Encoders keyed by Rust type, decoders keyed by record target
#[derive(Clone, Default)]
pub struct CodecRegistry {
    encoders: HashMap<TypeId, EncoderEntry>,
    encoder_names: HashMap<TypeId, &'static str>,
    decoders: HashMap<String, DecoderEntry>,
}

impl CodecRegistry {
    /// An empty registry; only literals can be encoded
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in encoders for bytes, times, durations and files
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        builtin::register_defaults(&mut registry);
        registry
    }

    /// Register how values of type `T` are encoded
    pub fn register_encoder<T, F>(&mut self, encoder: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &EncodeContext<'_>) -> Result<Json> + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let encode: EncodeFn = Arc::new(move |object: &Object, ctx: &EncodeContext<'_>| {
            match object.downcast_ref::<T>() {
                Some(value) => encoder(value, ctx),
                None => Err(CacheError::encode(
                    object.type_name(),
                    format!("encoder registered for '{type_name}'"),
                )),
            }
        });
        self.encoders
            .insert(TypeId::of::<T>(), EncoderEntry { encode });
        self.encoder_names.insert(TypeId::of::<T>(), type_name);
        self
    }

    /// Register the decoder invoked for records with `target`
    pub fn register_decoder<F>(&mut self, target: impl Into<String>, decode: F) -> &mut Self
    where
        F: Fn(&DeferredCall, &DecodeContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.insert_decoder(target.into(), Arc::new(decode), false)
    }

    /// Register a decoder whose first argument is a file descriptor
    ///
    /// Records with this target own files in the cache-files area; deleting
    /// an entry deletes them too.
    pub fn register_file_decoder<F>(&mut self, target: impl Into<String>, decode: F) -> &mut Self
    where
        F: Fn(&DeferredCall, &DecodeContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.insert_decoder(target.into(), Arc::new(decode), true)
    }

    /// Register a serde-serializable type under `target`
    pub fn register_serde<T>(&mut self, target: impl Into<String>) -> &mut Self
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let target = target.into();
        let encode_target = target.clone();
        self.register_encoder::<T, _>(move |value, _ctx| {
            let json = serde_json::to_value(value)
                .map_err(|e| CacheError::encode(std::any::type_name::<T>(), e.to_string()))?;
            Ok(DeferredCall::new(encode_target.clone()).arg(json).to_json())
        });
        let decode_target = target.clone();
        self.register_decoder(target, move |record, _ctx| {
            let json = record.args.first().cloned().ok_or_else(|| {
                CacheError::decode(&decode_target, "expected one argument")
            })?;
            let value: T = serde_json::from_value(json)
                .map_err(|e| CacheError::decode(&decode_target, e.to_string()))?;
            Ok(Value::object(value))
        })
    }

    pub fn has_encoder<T: Any>(&self) -> bool {
        self.encoders.contains_key(&TypeId::of::<T>())
    }

    pub fn has_decoder(&self, target: &str) -> bool {
        self.decoders.contains_key(target)
    }

    /// Whether records with `target` carry a file descriptor
    pub fn is_file_backed(&self, target: &str) -> bool {
        self.decoders
            .get(target)
            .is_some_and(|entry| entry.file_backed)
    }

    pub(crate) fn encoder(&self, type_id: TypeId) -> Option<&EncoderEntry> {
        self.encoders.get(&type_id)
    }

    pub(crate) fn decoder(&self, target: &str) -> Option<&DecoderEntry> {
        self.decoders.get(target)
    }

    fn insert_decoder(&mut self, target: String, decode: DecodeFn, file_backed: bool) -> &mut Self {
        self.decoders.insert(
            target,
            DecoderEntry {
                decode,
                file_backed,
            },
        );
        self
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut encoders: Vec<_> = self.encoder_names.values().collect();
        encoders.sort();
        let mut decoders: Vec<_> = self.decoders.keys().collect();
        decoders.sort();
        f.debug_struct("CodecRegistry")
            .field("encoders", &encoders)
            .field("decoders", &decoders)
            .finish()
    }
}
