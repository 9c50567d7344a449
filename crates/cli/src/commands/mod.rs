use callcache::{Cache, CacheConfig, EvictionPolicy};
use clap::Subcommand;

mod clean;

#[derive(Subcommand)]
pub enum Commands {
    /// Delete cache entries and files until the files area fits in a size budget
    Clean {
        /// Target size of the cache-files area in bytes
        #[arg(long)]
        maxsize: u64,

        /// Eviction order: lru (least recently used) or lfu (least frequently used)
        #[arg(long, default_value = "lru")]
        policy: EvictionPolicy,

        /// Only delete entries with this tag; repeatable, "" means untagged
        #[arg(long = "tag-to-clean", value_name = "TAG", conflicts_with = "tags_to_keep")]
        tags_to_clean: Vec<String>,

        /// Never delete entries with this tag; repeatable, "" means untagged
        #[arg(long = "tag-to-keep", value_name = "TAG")]
        tags_to_keep: Vec<String>,

        /// Also delete files no cache entry refers to
        #[arg(long)]
        delete_unknown_files: bool,

        /// Seconds after which a lock marker stops protecting its file
        #[arg(long, value_name = "SECONDS")]
        lock_validity_secs: Option<u64>,
    },

    /// Delete entries that have no result, have expired or no longer decode
    CleanInvalid {
        /// Keep entries without a result
        #[arg(long)]
        skip_result_check: bool,

        /// Keep expired entries
        #[arg(long)]
        skip_expiration_check: bool,

        /// Decode every entry and delete those that fail (slow)
        #[arg(long)]
        try_decode: bool,
    },

    /// Print the effective configuration as JSON
    Config,
}

impl Commands {
    pub async fn execute(self, config: CacheConfig) -> anyhow::Result<()> {
        match self {
            Commands::Clean {
                maxsize,
                policy,
                tags_to_clean,
                tags_to_keep,
                delete_unknown_files,
                lock_validity_secs,
            } => {
                let options = clean::clean_options(
                    maxsize,
                    policy,
                    tags_to_clean,
                    tags_to_keep,
                    delete_unknown_files,
                    lock_validity_secs,
                );
                let cache = Cache::open(config)?;
                let report = cache.clean(&options).await?;
                tracing::info!(
                    entries_deleted = report.entries_deleted,
                    files_deleted = report.files_deleted,
                    unknown_files_deleted = report.unknown_files_deleted,
                    final_size = report.final_size,
                    "✓ Cache files cleaned"
                );
                Ok(())
            }
            Commands::CleanInvalid {
                skip_result_check,
                skip_expiration_check,
                try_decode,
            } => {
                let cache = Cache::open(config)?;
                let deleted = cache
                    .clean_invalid_entries(!skip_result_check, !skip_expiration_check, try_decode)
                    .await?;
                tracing::info!(deleted, "✓ Invalid cache entries cleaned");
                Ok(())
            }
            Commands::Config => {
                println!("{}", config.to_json_pretty()?);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_commands_run_against_an_empty_cache() {
        let temp = TempDir::new().unwrap();
        let config = CacheConfig::in_dir(temp.path());

        Commands::CleanInvalid {
            skip_result_check: false,
            skip_expiration_check: false,
            try_decode: true,
        }
        .execute(config.clone())
        .await
        .unwrap();

        Commands::Clean {
            maxsize: 0,
            policy: EvictionPolicy::Lfu,
            tags_to_clean: Vec::new(),
            tags_to_keep: vec![String::new()],
            delete_unknown_files: true,
            lock_validity_secs: Some(60),
        }
        .execute(config.clone())
        .await
        .unwrap();

        assert!(config.cache_db_path.exists());
    }
}
