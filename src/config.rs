// =============================================================================
// CONFIGURATION - Load settings from mirv.toml
// =============================================================================
//
// The driver is loaded into someone else's process, so it never requires a
// config file: a missing or broken file falls back to defaults. Hosts and tests
// can also install a config programmatically before creating an instance.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::backend::BackendKind;

/// Environment variable naming the config file to load.
pub const CONFIG_ENV: &str = "MIRV_CONFIG";
/// File looked up in the working directory when `MIRV_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "mirv.toml";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub backends: BackendConfig,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Which compiled-in backends an instance probes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub d3d12: bool,
    pub metal: bool,
    pub vulkan: bool,
    pub null: NullBackendConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            d3d12: true,
            metal: true,
            vulkan: true,
            null: NullBackendConfig::default(),
        }
    }
}

impl BackendConfig {
    pub fn is_enabled(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::D3D12 => self.d3d12,
            BackendKind::Metal => self.metal,
            BackendKind::Vulkan => self.vulkan,
            BackendKind::Null => self.null.adapters > 0 || self.null.unsupported_adapters > 0,
        }
    }

    /// Only the synthetic backend, with `adapters` usable adapters.
    pub fn null_only(adapters: u32) -> Self {
        Self {
            d3d12: false,
            metal: false,
            vulkan: false,
            null: NullBackendConfig {
                adapters,
                ..Default::default()
            },
        }
    }
}

/// Synthetic backend settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NullBackendConfig {
    /// Adapters that pass the capability probe. 0 disables the backend.
    pub adapters: u32,
    /// Adapters that fail the capability probe and are skipped.
    pub unsupported_adapters: u32,
    pub queues_per_family: u32,
    /// Native queues a single device may create before reporting out-of-memory.
    pub queue_budget: Option<u32>,
    pub fail_device_creation: bool,
}

impl Default for NullBackendConfig {
    fn default() -> Self {
        Self {
            adapters: 0,
            unsupported_adapters: 0,
            queues_per_family: 4,
            queue_budget: None,
            fail_device_creation: false,
        }
    }
}

impl Config {
    /// Load configuration from `MIRV_CONFIG` or `mirv.toml`, falling back to defaults
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from_path(&path).unwrap_or_else(|e| {
            log::warn!("Failed to load {}: {:#}. Using defaults.", path, e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Log level as a `log` filter
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.logging.level.parse() {
            Ok(level) => level,
            Err(_) => {
                log::warn!(
                    "Unknown log level '{}', defaulting to info",
                    self.logging.level
                );
                log::LevelFilter::Info
            }
        }
    }
}

fn slot() -> &'static RwLock<Option<Arc<Config>>> {
    static CURRENT: OnceLock<RwLock<Option<Arc<Config>>>> = OnceLock::new();
    CURRENT.get_or_init(|| RwLock::new(None))
}

/// The process-wide config, loaded on first use.
pub fn current() -> Arc<Config> {
    if let Some(config) = slot().read().as_ref() {
        return config.clone();
    }
    let mut guard = slot().write();
    guard.get_or_insert_with(|| Arc::new(Config::load())).clone()
}

/// Replaces the process-wide config. Instances created afterwards use it.
pub fn install(config: Config) {
    *slot().write() = Some(Arc::new(config));
}
