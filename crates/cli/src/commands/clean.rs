use callcache::{CleanOptions, EvictionPolicy};
use std::time::Duration;

/// Tag given on the command line; the empty string selects untagged entries
fn tag(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn tag_list(values: Vec<String>) -> Option<Vec<Option<String>>> {
    if values.is_empty() {
        None
    } else {
        Some(values.into_iter().map(tag).collect())
    }
}

pub fn clean_options(
    maxsize: u64,
    policy: EvictionPolicy,
    tags_to_clean: Vec<String>,
    tags_to_keep: Vec<String>,
    delete_unknown_files: bool,
    lock_validity_secs: Option<u64>,
) -> CleanOptions {
    CleanOptions {
        maxsize,
        policy,
        tags_to_clean: tag_list(tags_to_clean),
        tags_to_keep: tag_list(tags_to_keep),
        delete_unknown_files,
        lock_validity_period: lock_validity_secs.map(Duration::from_secs),
    }
}
