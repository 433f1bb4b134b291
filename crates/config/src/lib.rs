//! Application configuration management

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub mod app_config;
pub mod migration;
mod settings;

pub use app_config::{AppConfig, CronConfig, SyncConfig};
pub use migration::Migrate;
pub use settings::{Preferences, Settings};

/// Platform-specific data directory resolution
pub fn default_data_dir() -> Result<PathBuf> {
	#[cfg(any(target_os = "macos", target_os = "ios", target_os = "android"))]
	let dir = dirs::data_dir()
		.ok_or_else(|| anyhow!("Could not determine data directory"))?
		.join("lms-mobile");

	#[cfg(target_os = "windows")]
	let dir = dirs::data_dir()
		.ok_or_else(|| anyhow!("Could not determine data directory"))?
		.join("LmsMobile");

	#[cfg(not(any(
		target_os = "macos",
		target_os = "ios",
		target_os = "android",
		target_os = "windows"
	)))]
	let dir = dirs::data_local_dir()
		.ok_or_else(|| anyhow!("Could not determine data directory"))?
		.join("lms-mobile");

	// Create directory if it doesn't exist
	fs::create_dir_all(&dir)?;

	Ok(dir)
}

/// Kind of device the app runs on, background processes are allowed to run more often on desktop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
	#[default]
	Mobile,
	Desktop,
}

impl Platform {
	/// Platform of the current build target
	#[must_use]
	pub const fn current() -> Self {
		if cfg!(any(target_os = "android", target_os = "ios")) {
			Self::Mobile
		} else {
			Self::Desktop
		}
	}
}
