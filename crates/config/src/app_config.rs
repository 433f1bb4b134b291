//! Application configuration

use super::{default_data_dir, Platform, Preferences};
use crate::migration::Migrate;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const CONFIG_FILE_NAME: &str = "lms.json";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
	/// Config schema version
	pub version: u32,

	/// Data directory path
	pub data_dir: PathBuf,

	/// Logging level
	pub log_level: String,

	/// Kind of device we are running on
	#[serde(default)]
	pub platform: Platform,

	/// User preferences
	#[serde(default)]
	pub preferences: Preferences,

	/// Background task scheduling
	#[serde(default)]
	pub cron: CronConfig,

	/// Offline data synchronization
	#[serde(default)]
	pub sync: SyncConfig,
}

/// Timings of the cron delegate, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronConfig {
	/// Interval used by tasks that don't declare one
	pub default_interval_ms: u64,

	/// No task runs more often than this on mobile
	pub min_interval_ms: u64,

	/// No task runs more often than this on desktop
	pub desktop_min_interval_ms: u64,

	/// Delay before trying again a task that failed or couldn't run on the current connection
	pub retry_interval_ms: u64,

	/// Max time a task can block the run queue
	pub max_time_process_ms: u64,
}

impl Default for CronConfig {
	fn default() -> Self {
		Self {
			default_interval_ms: 3_600_000, // 1 hour
			min_interval_ms: 300_000,       // 5 minutes
			desktop_min_interval_ms: 60_000,
			retry_interval_ms: 300_000,
			max_time_process_ms: 120_000,
		}
	}
}

impl CronConfig {
	#[must_use]
	pub const fn default_interval(&self) -> Duration {
		Duration::from_millis(self.default_interval_ms)
	}

	#[must_use]
	pub const fn min_interval(&self, platform: Platform) -> Duration {
		match platform {
			Platform::Mobile => Duration::from_millis(self.min_interval_ms),
			Platform::Desktop => Duration::from_millis(self.desktop_min_interval_ms),
		}
	}

	#[must_use]
	pub const fn retry_interval(&self) -> Duration {
		Duration::from_millis(self.retry_interval_ms)
	}

	#[must_use]
	pub const fn max_time_process(&self) -> Duration {
		Duration::from_millis(self.max_time_process_ms)
	}
}

/// Offline synchronization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
	/// Minimum time between two automatic synchronizations of the same item
	pub sync_interval_ms: u64,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			sync_interval_ms: 300_000, // 5 minutes
		}
	}
}

impl SyncConfig {
	#[must_use]
	pub const fn sync_interval(&self) -> Duration {
		Duration::from_millis(self.sync_interval_ms)
	}
}

impl AppConfig {
	/// Load configuration from the default location
	pub fn load() -> Result<Self> {
		let data_dir = default_data_dir()?;
		Self::load_from(&data_dir)
	}

	/// Load configuration from a specific data directory
	pub fn load_from(data_dir: &Path) -> Result<Self> {
		let config_path = data_dir.join(CONFIG_FILE_NAME);

		if config_path.exists() {
			info!("Loading config from {:?}", config_path);
			let json = fs::read_to_string(&config_path)?;
			let mut config: Self = serde_json::from_str(&json)?;

			// Apply migrations if needed
			if config.needs_migration() {
				info!(
					"Migrating config from v{} to v{}",
					config.version,
					Self::target_version()
				);
				config.migrate()?;
				config.save()?;
			}

			Ok(config)
		} else {
			warn!("No config found, creating default at {:?}", config_path);
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		}
	}

	/// Load or create configuration
	pub fn load_or_create(data_dir: &Path) -> Result<Self> {
		Self::load_from(data_dir).or_else(|e| {
			warn!("Failed to load config, falling back to defaults: {e:#}");
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		})
	}

	/// Create default configuration with specific data directory
	#[must_use]
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: Self::target_version(),
			data_dir,
			log_level: "info".to_string(),
			platform: Platform::current(),
			preferences: Preferences::default(),
			cron: CronConfig::default(),
			sync: SyncConfig::default(),
		}
	}

	/// Save configuration to disk
	pub fn save(&self) -> Result<()> {
		// Ensure directory exists
		fs::create_dir_all(&self.data_dir)?;

		let config_path = self.data_dir.join(CONFIG_FILE_NAME);
		let json = serde_json::to_string_pretty(self)?;
		fs::write(&config_path, json)?;
		info!("Saved config to {:?}", config_path);
		Ok(())
	}

	/// Get the path for logs directory
	#[must_use]
	pub fn logs_dir(&self) -> PathBuf {
		self.data_dir.join("logs")
	}

	/// Ensure all required directories exist
	pub fn ensure_directories(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;
		fs::create_dir_all(self.logs_dir())?;
		Ok(())
	}
}

impl Default for AppConfig {
	fn default() -> Self {
		let data_dir = default_data_dir().unwrap_or_else(|_| PathBuf::from("."));
		Self::default_with_dir(data_dir)
	}
}

impl Migrate for AppConfig {
	fn current_version(&self) -> u32 {
		self.version
	}

	fn target_version() -> u32 {
		2
	}

	fn migrate(&mut self) -> Result<()> {
		match self.version {
			0 => {
				self.version = 1;
				self.migrate()
			}
			1 => {
				// v2 split the sync interval out of the cron section
				self.sync = SyncConfig::default();
				self.version = 2;
				Ok(())
			}
			2 => Ok(()),
			v => Err(anyhow!("Unknown config version: {}", v)),
		}
	}
}
