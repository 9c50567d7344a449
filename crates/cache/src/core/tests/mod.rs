//! Orchestrator tests over an in-memory entry store


use crate::config::CacheConfig;
use crate::core::Cache;
use crate::entry::{EntryStore, MemoryEntryStore};
use crate::keys::{Function, Parameter, Signature};
use crate::value::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub(super) struct Fixture {
    pub _temp: TempDir,
    pub store: Arc<MemoryEntryStore>,
    pub cache: Cache,
}

pub(super) fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let mut config = CacheConfig::in_dir(temp.path());
    config.lock_poll_interval = Duration::from_millis(10);
    let store = Arc::new(MemoryEntryStore::new());
    let cache = Cache::builder(config)
        .with_store(Arc::clone(&store) as Arc<dyn EntryStore>)
        .build()
        .unwrap();
    Fixture {
        _temp: temp,
        store,
        cache,
    }
}

/// `add(a, b=1)` counting its invocations
pub(super) fn counted_add() -> (Function, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let function = Function::sync("tests::add", move |args, _kwargs| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Int(args.iter().filter_map(Value::as_i64).sum()))
    })
    .with_signature(
        Signature::new(vec![
            Parameter::positional("a"),
            Parameter::positional("b").with_default(1),
        ])
        .unwrap(),
    );
    (function, calls)
}
