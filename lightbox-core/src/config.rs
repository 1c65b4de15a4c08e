//! Configuration for a derivative cache instance.
//!
//! The same cache type serves both the small-thumbnail and the larger preview
//! use case; the two only differ in worker-pool sizing and store bound, so
//! each gets a preset constructor. Values can also come from a TOML file with
//! `LIGHTBOX_`-prefixed environment overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

/// JPEG quality used when persisting rendered derivatives.
pub const STORED_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, Deserialize)]
pub struct DerivativeCacheConfig {
    /// Path of the SQLite database file backing the persistent store.
    pub database_path: PathBuf,

    /// Upper bound on stored derivatives, enforced by explicit `trim` calls.
    #[serde(default = "default_max_entries")]
    pub max_entries: u32,

    /// Number of render workers. Fixed at pool construction.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Optional placeholder image shown while a derivative is rendering.
    /// When unset a neutral built-in placeholder is synthesized. When set but
    /// unreadable, opening the cache fails: a deployment that configures a
    /// placeholder it cannot load is broken.
    #[serde(default)]
    pub placeholder_path: Option<PathBuf>,
}

impl DerivativeCacheConfig {
    /// Preset for small list thumbnails: cheap renders, many workers.
    pub fn thumbnails(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            max_entries: default_max_entries(),
            workers: default_workers(),
            placeholder_path: None,
        }
    }

    /// Preset for larger previews: memory-heavy renders, one worker per core,
    /// fewer stored entries.
    pub fn previews(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            max_entries: 1024,
            workers: num_cpus::get().max(1),
            placeholder_path: None,
        }
    }

    /// Load from a TOML file, letting `LIGHTBOX_*` environment variables
    /// override individual fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let composed = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("LIGHTBOX"))
            .build()?;
        Ok(composed.try_deserialize()?)
    }
}

fn default_max_entries() -> u32 {
    8192
}

fn default_workers() -> usize {
    num_cpus::get().saturating_mul(2).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_in_pool_sizing_and_bound() {
        let thumbs = DerivativeCacheConfig::thumbnails("/tmp/t.db");
        let previews = DerivativeCacheConfig::previews("/tmp/p.db");

        assert!(thumbs.workers >= previews.workers);
        assert!(thumbs.max_entries > previews.max_entries);
        assert!(previews.workers >= 1);
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.toml");
        std::fs::write(
            &path,
            "database_path = \"/var/cache/lightbox/thumbs.db\"\nmax_entries = 64\n",
        )
        .expect("write config");

        let cfg = DerivativeCacheConfig::from_file(&path).expect("load config");
        assert_eq!(
            cfg.database_path,
            PathBuf::from("/var/cache/lightbox/thumbs.db")
        );
        assert_eq!(cfg.max_entries, 64);
        assert!(cfg.workers >= 1);
        assert!(cfg.placeholder_path.is_none());
    }
}
