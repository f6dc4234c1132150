//! Application settings.
//!
//! Settings are loaded from `{config}/settings.json` and layered under
//! environment variables with the `NEXUS_` prefix, e.g.
//! `NEXUS_PATHS__CACHE=/var/lib/nexus/cache` or
//! `NEXUS_DATA__AGGREGATION_NAN_THRESHOLD=0.9`.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use regex::Regex;
use serde::Deserialize;

use crate::errors::{NexusError, Result};

/// The root of all Nexus settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct NexusOptions {
    /// The file system layout.
    pub paths: PathsOptions,

    /// The data plane tuning knobs.
    pub data: DataOptions,
}

/// The directories Nexus works with.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PathsOptions {
    /// The aggregation cache.
    pub cache: PathBuf,

    /// Catalog metadata and attachments.
    pub catalogs: PathBuf,

    /// Export artifacts.
    pub artifacts: PathBuf,

    /// Extension packages.
    pub packages: PathBuf,

    /// Configuration files (settings, pipelines).
    pub config: PathBuf,
}

impl Default for PathsOptions {
    fn default() -> Self {
        let platform_root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nexus");

        PathsOptions {
            cache: platform_root.join("cache"),
            catalogs: platform_root.join("catalogs"),
            artifacts: platform_root.join("artifacts"),
            packages: platform_root.join("packages"),
            config: platform_root.join("config"),
        }
    }
}

/// Tuning knobs of the data plane.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DataOptions {
    /// The process-wide byte budget for read buffers.
    pub total_buffer_memory_consumption: u64,

    /// The minimum fraction of valid base samples required for an
    /// aggregation block to produce a value instead of NaN.
    pub aggregation_nan_threshold: f64,

    /// An optional regular expression which selects the catalogs that
    /// participate in caching. Catalogs that do not match bypass the cache;
    /// a missing pattern means the cache is always on.
    pub cache_pattern: Option<String>,
}

impl Default for DataOptions {
    fn default() -> Self {
        DataOptions {
            total_buffer_memory_consumption: 1024 * 1024 * 1024,
            aggregation_nan_threshold: 0.99,
            cache_pattern: None,
        }
    }
}

impl DataOptions {
    /// Compiles the cache pattern, if any.
    pub fn compiled_cache_pattern(&self) -> Result<Option<Regex>> {
        self.cache_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|error| {
                    NexusError::validation(format!("invalid cache pattern: {error}"))
                })
            })
            .transpose()
    }
}

impl NexusOptions {
    /// Loads the settings from the given configuration directory and the
    /// `NEXUS_`-prefixed environment.
    pub fn load(config_directory: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(directory) = config_directory {
            builder = builder
                .add_source(File::from(directory.join("settings.json")).required(false));
        }

        builder = builder.add_source(Environment::with_prefix("NEXUS").separator("__"));

        let options = builder
            .build()
            .and_then(|config| config.try_deserialize::<NexusOptions>())
            .map_err(|error| NexusError::validation(format!("invalid settings: {error}")))?;

        options.validate()?;

        Ok(options)
    }

    /// Validates cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.data.aggregation_nan_threshold;

        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(NexusError::validation(format!(
                "the aggregation NaN threshold {threshold} is not in (0, 1]"
            )));
        }

        if self.data.total_buffer_memory_consumption == 0 {
            return Err(NexusError::validation(
                "the total buffer memory consumption must be positive",
            ));
        }

        self.data.compiled_cache_pattern()?;

        Ok(())
    }
}
