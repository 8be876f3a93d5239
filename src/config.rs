//! Application configuration management.
//!
//! Settings are layered with `figment`, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML file: `--config PATH`, or `config.toml` in the platform config
//!    directory
//! 3. Environment variables prefixed `RELINK_` (e.g. `RELINK_WORKERS=8`)
//! 4. Command-line flags ([`Config::apply_cli`])
//!
//! ```toml
//! workers = 8
//! channel_capacity = 128
//! manifest = "/var/lib/relink/hashes_sorted.txt"
//! root = "/data"
//! dry_run = false
//! initial_buffer = 512
//! ```

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::dispatch::{default_workers, DEFAULT_CHANNEL_CAPACITY};
use crate::links::DEFAULT_BUFFER_LEN;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "RELINK_";

/// Manifest read when none is configured.
pub const DEFAULT_MANIFEST: &str = "hashes_sorted.txt";

/// Root used when none is configured: the filesystem root separator.
#[must_use]
pub fn default_root() -> PathBuf {
    PathBuf::from(std::path::MAIN_SEPARATOR_STR)
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker threads.
    pub workers: usize,
    /// Groups queued ahead of the workers.
    pub channel_capacity: usize,
    /// Sorted hash manifest.
    pub manifest: PathBuf,
    /// Root that manifest paths are relative to.
    pub root: PathBuf,
    /// Plan links without creating them.
    pub dry_run: bool,
    /// Initial link-name buffer per worker, in platform units.
    pub initial_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            manifest: PathBuf::from(DEFAULT_MANIFEST),
            root: default_root(),
            dry_run: false,
            initial_buffer: DEFAULT_BUFFER_LEN,
        }
    }
}

impl Config {
    /// Load defaults, file and environment layers.
    ///
    /// Without `explicit`, problems with the default file are logged at debug
    /// level and defaults are used, as a missing file is the common case.
    ///
    /// # Errors
    ///
    /// Returns an error if `explicit` is given and the file is missing or
    /// invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    bail!("config file not found: {}", path.display());
                }
                Self::from_figment(Self::figment(Some(path)))
                    .with_context(|| format!("invalid config file {}", path.display()))
            }
            None => {
                let path = Self::config_path();
                match Self::from_figment(Self::figment(path.as_deref())) {
                    Ok(config) => Ok(config),
                    Err(e) => {
                        log::debug!("Failed to load config, using defaults: {:#}", e);
                        Ok(Self::default())
                    }
                }
            }
        }
    }

    /// The layered figment without CLI flags.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extract and validate a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a layer has an unknown shape or wrong types.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        Ok(config.validated())
    }

    /// Apply command-line flags on top.
    #[must_use]
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(workers) = cli.workers {
            self.workers = workers;
        }
        if let Some(capacity) = cli.channel_capacity {
            self.channel_capacity = capacity;
        }
        if let Some(manifest) = &cli.manifest {
            self.manifest.clone_from(manifest);
        }
        if let Some(root) = &cli.root {
            self.root.clone_from(root);
        }
        self.dry_run |= cli.dry_run;
        self.validated()
    }

    /// Zero counts are clamped to 1 and the root is made absolute.
    ///
    /// Link names come back absolute, so member paths must be too for
    /// membership checks to match.
    fn validated(mut self) -> Self {
        self.workers = self.workers.max(1);
        self.channel_capacity = self.channel_capacity.max(1);
        self.initial_buffer = self.initial_buffer.max(1);
        match std::path::absolute(&self.root) {
            Ok(root) => self.root = root,
            Err(e) => log::warn!("Cannot resolve root {}: {}", self.root.display(), e),
        }
        self
    }

    /// Default platform-specific configuration path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "relink", "relink").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
