use clap::Parser;
use std::path::PathBuf;

mod commands;

use commands::Commands;

#[derive(Parser)]
#[command(name = "callcache")]
#[command(about = "Inspect and clean a callcache cache", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file to load instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Cache database to use, overriding the configuration
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Cache-files directory to use, overriding the configuration
    #[arg(long, global = true, value_name = "DIR")]
    files_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<callcache::CacheConfig> {
        let mut config = match &self.config {
            Some(path) => callcache::CacheConfigLoader::load_with_file(path)?,
            None => callcache::CacheConfigLoader::load()?,
        };
        if let Some(db) = &self.db {
            config.cache_db_path = db.clone();
        }
        if let Some(dir) = &self.files_dir {
            config.cache_files_dir = dir.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = callcache_utils::tracing::init() {
        eprintln!("failed to initialise logging: {e}");
    }

    let cli = Cli::parse();
    let config = cli.load_config()?;
    cli.command.execute(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_paths_override_config() {
        let cli = Cli::try_parse_from([
            "callcache",
            "config",
            "--db",
            "/tmp/other.sqlite",
            "--files-dir",
            "/tmp/other-files",
            "--config",
            "/nonexistent/callcache.json",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.cache_db_path, PathBuf::from("/tmp/other.sqlite"));
        assert_eq!(config.cache_files_dir, PathBuf::from("/tmp/other-files"));
    }
}
