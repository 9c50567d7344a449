//! JSON codec for cache values

use super::builtin::MAP_TARGET;
use super::record::DeferredCall;
use super::registry::CodecRegistry;
use crate::errors::{CacheError, Result};
use crate::storage::{FileDescriptor, FileStore};
use crate::value::Value;
use serde_json::{Map, Number, Value as Json};
use std::sync::Arc;

/// What an encoding is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    /// Persisting a result; file-backed values are copied into the cache
    Store,
    /// Deriving a cache key; file-backed values are only checksummed
    Key,
}

/// Handed to encoders, lets them recurse and reach the file store
pub struct EncodeContext<'a> {
    codec: &'a Codec,
    mode: EncodeMode,
}

impl<'a> EncodeContext<'a> {
    pub fn mode(&self) -> EncodeMode {
        self.mode
    }

    pub fn is_key(&self) -> bool {
        self.mode == EncodeMode::Key
    }

    pub fn files(&self) -> Result<&'a FileStore> {
        self.codec
            .files
            .as_ref()
            .ok_or_else(|| CacheError::encode("file", "no cache files area is configured"))
    }

    /// Encode a nested value with the same mode
    pub fn encode(&self, value: &Value) -> Result<Json> {
        self.codec.encode_with(value, self.mode)
    }
}

/// Handed to decoders, lets them recurse and reach the file store
pub struct DecodeContext<'a> {
    codec: &'a Codec,
}

impl<'a> DecodeContext<'a> {
    pub fn files(&self) -> Result<&'a FileStore> {
        self.codec
            .files
            .as_ref()
            .ok_or_else(|| CacheError::decode("file", "no cache files area is configured"))
    }

    /// Decode a nested encoded value
    pub fn decode(&self, json: &Json) -> Result<Value> {
        self.codec.decode(json)
    }
}

/// Converts [`Value`]s to and from their JSON representation
#[derive(Debug, Clone)]
pub struct Codec {
    registry: Arc<CodecRegistry>,
    files: Option<FileStore>,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(CodecRegistry::with_defaults())
    }
}

impl Codec {
    pub fn new(registry: CodecRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            files: None,
        }
    }

    pub fn with_file_store(mut self, files: FileStore) -> Self {
        self.files = Some(files);
        self
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn files(&self) -> Option<&FileStore> {
        self.files.as_ref()
    }

    /// Encode a value for storage
    pub fn encode(&self, value: &Value) -> Result<Json> {
        self.encode_with(value, EncodeMode::Store)
    }

    /// Encode a value as part of a cache key
    pub fn encode_for_key(&self, value: &Value) -> Result<Json> {
        self.encode_with(value, EncodeMode::Key)
    }

    pub fn encode_with(&self, value: &Value, mode: EncodeMode) -> Result<Json> {
        match value {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Int(i) => Ok(Json::Number((*i).into())),
            Value::Float(x) => Number::from_f64(*x).map(Json::Number).ok_or_else(|| {
                CacheError::encode("f64", format!("{x} is not representable in JSON"))
            }),
            Value::String(s) => Ok(Json::String(s.clone())),
            Value::List(items) => items
                .iter()
                .map(|item| self.encode_with(item, mode))
                .collect::<Result<Vec<_>>>()
                .map(Json::Array),
            Value::Map(map) => {
                let fields = map
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.encode_with(v, mode)?)))
                    .collect::<Result<Map<_, _>>>()
                    .map(Json::Object)?;
                // A literal map that reads as a record is wrapped so it decodes as a map
                if DeferredCall::from_json(&fields).is_some() {
                    Ok(DeferredCall::new(MAP_TARGET).arg(fields).to_json())
                } else {
                    Ok(fields)
                }
            }
            Value::Object(object) => {
                let entry = self.registry.encoder(object.value_type_id()).ok_or_else(|| {
                    CacheError::encode(object.type_name(), "no encoder registered for this type")
                })?;
                let ctx = EncodeContext { codec: self, mode };
                (entry.encode)(object, &ctx).map_err(|e| {
                    if e.is_encode() {
                        e
                    } else {
                        CacheError::encode(object.type_name(), e.to_string())
                    }
                })
            }
        }
    }

    /// Rebuild a value from its JSON representation
    pub fn decode(&self, json: &Json) -> Result<Value> {
        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => Ok(match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Array(items) => items
                .iter()
                .map(|item| self.decode(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Json::Object(map) => match DeferredCall::from_json(json) {
                Some(record) => self.decode_record(&record),
                None => self.decode_fields(map),
            },
        }
    }

    fn decode_fields(&self, map: &Map<String, Json>) -> Result<Value> {
        map.iter()
            .map(|(k, v)| Ok((k.clone(), self.decode(v)?)))
            .collect::<Result<_>>()
            .map(Value::Map)
    }

    fn decode_record(&self, record: &DeferredCall) -> Result<Value> {
        if record.target == MAP_TARGET {
            return match (record.args.as_slice(), record.kwargs.is_empty()) {
                ([Json::Object(fields)], true) => self.decode_fields(fields),
                _ => Err(CacheError::decode(MAP_TARGET, "expected a single object argument")),
            };
        }
        let entry = self
            .registry
            .decoder(&record.target)
            .ok_or_else(|| CacheError::decode(&record.target, "no decoder registered"))?;
        let ctx = DecodeContext { codec: self };
        (entry.decode)(record, &ctx).map_err(|e| {
            if e.is_decode() {
                e
            } else {
                CacheError::decode(&record.target, e.to_string())
            }
        })
    }

    /// Encode for storage and render as compact JSON text
    pub fn dumps(&self, value: &Value) -> Result<String> {
        let json = self.encode(value)?;
        serde_json::to_string(&json).map_err(|e| CacheError::encode("json", e.to_string()))
    }

    /// Parse stored JSON text and decode it
    pub fn loads(&self, text: &str) -> Result<Value> {
        let json: Json =
            serde_json::from_str(text).map_err(|e| CacheError::decode("json", e.to_string()))?;
        self.decode(&json)
    }

    /// File descriptors referenced by file-backed records anywhere in `json`
    pub fn file_descriptors(&self, json: &Json) -> Vec<FileDescriptor> {
        let mut found = Vec::new();
        self.collect_descriptors(json, &mut found);
        found
    }

    fn collect_descriptors(&self, json: &Json, found: &mut Vec<FileDescriptor>) {
        match json {
            Json::Array(items) => {
                for item in items {
                    self.collect_descriptors(item, found);
                }
            }
            Json::Object(map) => {
                if let Some(record) = DeferredCall::from_json(json) {
                    if record.target == MAP_TARGET {
                        // Only the wrapped map's values can hold records
                        if let Some(Json::Object(fields)) = record.args.first() {
                            for value in fields.values() {
                                self.collect_descriptors(value, found);
                            }
                        }
                        return;
                    }
                    if self.registry.is_file_backed(&record.target) {
                        if let Some(descriptor) = record
                            .args
                            .first()
                            .and_then(|arg| serde_json::from_value(arg.clone()).ok())
                        {
                            found.push(descriptor);
                        }
                    }
                }
                for value in map.values() {
                    self.collect_descriptors(value, found);
                }
            }
            _ => {}
        }
    }
}
