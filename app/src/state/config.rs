//! Config file loading and persistence.
//!
//! `~/.config/puttlink/config.toml` with id-keyed sections:
//! `[webserver.<id>]`, `[mock_controller.<id>]`, `[mock_display.<id>]`.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub use puttlink::PuttlinkConfig;

/// `"webserver.0"`, `"mock_display.lobby"`, ...
pub fn global_id(prefix: &str, index: &str) -> String {
    format!("{prefix}.{index}")
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("puttlink")
        .join("config.toml")
}

/// Load config from disk, writing defaults if the file is missing. A file
/// that fails to parse is left untouched and defaults are used.
pub fn load(path: &Path) -> PuttlinkConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<PuttlinkConfig>(&contents) {
            Ok(config) => {
                tracing::info!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("failed to parse {}: {e}", path.display());
                PuttlinkConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let defaults = PuttlinkConfig::default();
            tracing::info!("no config file found, creating {}", path.display());
            save_to(path, &defaults);
            defaults
        }
        Err(e) => {
            tracing::warn!("failed to read {}: {e}", path.display());
            PuttlinkConfig::default()
        }
    }
}

/// Write config, creating parent dirs. Failures are logged, never fatal.
pub fn save_to(path: &Path, config: &PuttlinkConfig) {
    if let Some(dir) = path.parent()
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        tracing::warn!("failed to create config dir {}: {e}", dir.display());
        return;
    }
    match toml::to_string_pretty(config) {
        Ok(contents) => {
            if let Err(e) = std::fs::write(path, contents) {
                tracing::warn!("failed to write {}: {e}", path.display());
            }
        }
        Err(e) => tracing::warn!("failed to serialize config: {e}"),
    }
}

// ---------------------------------------------------------------------------
// SystemConfig
// ---------------------------------------------------------------------------

/// In-memory copy of the config file. Reads clone under a read lock; writes
/// persist before releasing the write lock.
pub struct SystemConfig {
    path: PathBuf,
    inner: RwLock<PuttlinkConfig>,
}

impl SystemConfig {
    pub fn new(path: PathBuf) -> Self {
        let config = load(&path);
        Self::with_config(path, config)
    }

    pub fn with_config(path: PathBuf, config: PuttlinkConfig) -> Self {
        Self {
            path,
            inner: RwLock::new(config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> PuttlinkConfig {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Mutate the cached config, then persist.
    pub fn update(&self, f: impl FnOnce(&mut PuttlinkConfig)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
        save_to(&self.path, &guard);
    }

    /// Mutate the cached config without touching the file. Used for
    /// command-line overrides that should not outlive the process.
    pub fn override_in_memory(&self, f: impl FnOnce(&mut PuttlinkConfig)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}
