use std::env;
use std::path::PathBuf;

/// XDG Base Directory paths for callcache
pub struct XdgPaths;

impl XdgPaths {
    /// Get XDG_CONFIG_HOME/callcache or fallback
    pub fn config_dir() -> PathBuf {
        env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|home| home.join(".config"))
                    .unwrap_or_else(|| PathBuf::from(".config"))
            })
            .join("callcache")
    }

    /// Get XDG_CACHE_HOME/callcache or fallback
    pub fn cache_dir() -> PathBuf {
        env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|home| home.join(".cache"))
                    .unwrap_or_else(|| env::temp_dir())
            })
            .join("callcache")
    }

    /// Default location of the JSON configuration file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Default location of the entry database
    pub fn database_file() -> PathBuf {
        Self::cache_dir().join("callcache.sqlite")
    }

    /// Default cache-files area
    pub fn files_dir() -> PathBuf {
        Self::cache_dir().join("files")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cache_dir_respects_xdg() {
        let previous = env::var("XDG_CACHE_HOME").ok();
        env::set_var("XDG_CACHE_HOME", "/tmp/xdg-cache-test");

        assert_eq!(
            XdgPaths::cache_dir(),
            PathBuf::from("/tmp/xdg-cache-test/callcache")
        );
        assert_eq!(
            XdgPaths::files_dir(),
            PathBuf::from("/tmp/xdg-cache-test/callcache/files")
        );

        match previous {
            Some(value) => env::set_var("XDG_CACHE_HOME", value),
            None => env::remove_var("XDG_CACHE_HOME"),
        }
    }

    #[test]
    #[serial]
    fn test_config_file_respects_xdg() {
        let previous = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", "/tmp/xdg-config-test");

        assert_eq!(
            XdgPaths::config_file(),
            PathBuf::from("/tmp/xdg-config-test/callcache/config.json")
        );

        match previous {
            Some(value) => env::set_var("XDG_CONFIG_HOME", value),
            None => env::remove_var("XDG_CONFIG_HOME"),
        }
    }
}
