//! Encoders registered by default

use super::record::DeferredCall;
use super::registry::CodecRegistry;
use crate::errors::{CacheError, Result};
use crate::storage::{CachedFile, FileDescriptor};
use crate::value::Value;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value as Json;
use std::path::PathBuf;
use std::time::Duration;

pub const BYTES_TARGET: &str = "callcache::bytes";
pub const DATETIME_TARGET: &str = "callcache::datetime";
pub const DATE_TARGET: &str = "callcache::date";
pub const DURATION_TARGET: &str = "callcache::duration";
pub const FILE_TARGET: &str = "callcache::file";
/// Wraps a literal map whose fields would otherwise read as a record
pub const MAP_TARGET: &str = "callcache::map";

pub(crate) fn register_defaults(registry: &mut CodecRegistry) {
    registry
        .register_encoder::<Vec<u8>, _>(|bytes, _ctx| {
            Ok(DeferredCall::new(BYTES_TARGET).arg(STANDARD.encode(bytes)).to_json())
        })
        .register_decoder(BYTES_TARGET, |record, _ctx| {
            let text = single_str(record)?;
            let bytes = STANDARD
                .decode(text)
                .map_err(|e| CacheError::decode(BYTES_TARGET, e.to_string()))?;
            Ok(Value::bytes(bytes))
        });

    registry
        .register_encoder::<DateTime<Utc>, _>(|at, _ctx| {
            Ok(DeferredCall::new(DATETIME_TARGET)
                .arg(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
                .to_json())
        })
        .register_decoder(DATETIME_TARGET, |record, _ctx| {
            let at = DateTime::parse_from_rfc3339(single_str(record)?)
                .map_err(|e| CacheError::decode(DATETIME_TARGET, e.to_string()))?;
            Ok(Value::object(at.with_timezone(&Utc)))
        });

    registry
        .register_encoder::<NaiveDate, _>(|date, _ctx| {
            Ok(DeferredCall::new(DATE_TARGET)
                .arg(date.format("%Y-%m-%d").to_string())
                .to_json())
        })
        .register_decoder(DATE_TARGET, |record, _ctx| {
            let date = NaiveDate::parse_from_str(single_str(record)?, "%Y-%m-%d")
                .map_err(|e| CacheError::decode(DATE_TARGET, e.to_string()))?;
            Ok(Value::object(date))
        });

    registry
        .register_encoder::<Duration, _>(|duration, _ctx| {
            Ok(DeferredCall::new(DURATION_TARGET)
                .arg(duration.as_secs())
                .arg(duration.subsec_nanos())
                .to_json())
        })
        .register_decoder(DURATION_TARGET, |record, _ctx| {
            let (secs, nanos) = match record.args.as_slice() {
                [secs, nanos] => (secs.as_u64(), nanos.as_u64()),
                _ => (None, None),
            };
            match (secs, nanos.and_then(|n| u32::try_from(n).ok())) {
                (Some(secs), Some(nanos)) if nanos < 1_000_000_000 => {
                    Ok(Value::object(Duration::new(secs, nanos)))
                }
                _ => Err(CacheError::decode(
                    DURATION_TARGET,
                    "expected [seconds, nanoseconds]",
                )),
            }
        });

    registry
        .register_encoder::<CachedFile, _>(|file, ctx| {
            let files = ctx.files()?;
            let descriptor = if ctx.is_key() {
                files.describe(file.path())?
            } else {
                files.store(file.path())?
            };
            let descriptor = serde_json::to_value(&descriptor)
                .map_err(|e| CacheError::encode("CachedFile", e.to_string()))?;
            let record = DeferredCall::new(FILE_TARGET).arg(descriptor);
            // Keys depend on content only; the source path is kept for self-healing
            if ctx.is_key() {
                Ok(record.to_json())
            } else {
                Ok(record
                    .kwarg("source", file.path().to_string_lossy().into_owned())
                    .to_json())
            }
        })
        .register_file_decoder(FILE_TARGET, |record, ctx| {
            let descriptor: FileDescriptor = record
                .args
                .first()
                .cloned()
                .ok_or_else(|| CacheError::decode(FILE_TARGET, "missing file descriptor"))
                .and_then(|json| {
                    serde_json::from_value(json)
                        .map_err(|e| CacheError::decode(FILE_TARGET, e.to_string()))
                })?;
            let source = record
                .kwargs
                .get("source")
                .and_then(Json::as_str)
                .map(PathBuf::from);
            let path = ctx.files()?.materialize(&descriptor, source.as_deref())?;
            Ok(Value::object(CachedFile::with_type(path, descriptor.file_type)))
        });
}

fn single_str(record: &DeferredCall) -> Result<&str> {
    match record.args.as_slice() {
        [Json::String(text)] => Ok(text),
        _ => Err(CacheError::decode(
            &record.target,
            "expected a single string argument",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::Codec;
    use crate::storage::FileStore;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn file_codec(temp: &TempDir) -> Codec {
        Codec::default().with_file_store(FileStore::local(temp.path().join("files")).unwrap())
    }

    #[test]
    fn test_bytes_and_times_round_trip() {
        let codec = Codec::default();
        let at = Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        let duration = Duration::new(90, 5);

        let value = Value::from(vec![
            Value::bytes(vec![0u8, 255, 10]),
            Value::object(at),
            Value::object(date),
            Value::object(duration),
        ]);
        let decoded = codec.loads(&codec.dumps(&value).unwrap()).unwrap();
        let items = decoded.as_list().unwrap();
        assert_eq!(items[0].downcast_ref::<Vec<u8>>(), Some(&vec![0u8, 255, 10]));
        assert_eq!(items[1].downcast_ref::<DateTime<Utc>>(), Some(&at));
        assert_eq!(items[2].downcast_ref::<NaiveDate>(), Some(&date));
        assert_eq!(items[3].downcast_ref::<Duration>(), Some(&duration));
    }

    #[test]
    fn test_datetime_text_is_rfc3339() {
        let codec = Codec::default();
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            codec.dumps(&Value::object(at)).unwrap(),
            r#"{"args":["2024-01-02T03:04:05Z"],"kind":"call","target":"callcache::datetime"}"#
        );
    }

    #[test]
    fn test_file_round_trip_copies_into_area() {
        let temp = TempDir::new().unwrap();
        let codec = file_codec(&temp);
        let source = temp.path().join("input.txt");
        std::fs::write(&source, "payload").unwrap();

        let text = codec.dumps(&Value::object(CachedFile::new(&source))).unwrap();
        let decoded = codec.loads(&text).unwrap();
        let file = decoded.downcast_ref::<CachedFile>().unwrap();

        assert_ne!(file.path(), source.as_path());
        assert!(file.path().starts_with(temp.path().join("files")));
        assert_eq!(file.read_to_string().unwrap(), "payload");
        assert_eq!(file.file_type(), "text/plain");
    }

    #[test]
    fn test_key_mode_does_not_copy() {
        let temp = TempDir::new().unwrap();
        let codec = file_codec(&temp);
        let source = temp.path().join("input.txt");
        std::fs::write(&source, "payload").unwrap();

        let files = codec.files().unwrap();
        let key_json = codec
            .encode_for_key(&Value::object(CachedFile::new(&source)))
            .unwrap();
        assert!(files.backend().list().unwrap().is_empty());

        let stored_json = codec.encode(&Value::object(CachedFile::new(&source))).unwrap();
        assert_eq!(key_json["args"], stored_json["args"]);
        assert!(key_json.get("kwargs").is_none());
        assert_eq!(
            stored_json["kwargs"]["source"],
            &*source.to_string_lossy()
        );
        assert_eq!(files.backend().list().unwrap().len(), 1);
    }

    #[test]
    fn test_key_ignores_file_location() {
        let temp = TempDir::new().unwrap();
        let codec = file_codec(&temp);
        let first = temp.path().join("a.csv");
        let nested = temp.path().join("sub");
        std::fs::create_dir_all(&nested).unwrap();
        let second = nested.join("b.csv");
        std::fs::write(&first, "x,y\n").unwrap();
        std::fs::write(&second, "x,y\n").unwrap();

        let a = codec.encode_for_key(&Value::object(CachedFile::new(&first))).unwrap();
        let b = codec.encode_for_key(&Value::object(CachedFile::new(&second))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_file_without_store_is_encode_error() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("input.txt");
        std::fs::write(&source, "payload").unwrap();
        let err = Codec::default()
            .encode(&Value::object(CachedFile::new(&source)))
            .unwrap_err();
        assert!(err.is_encode());
    }
}
