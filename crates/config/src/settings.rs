use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Preferences the user can change while the app is running
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
	/// Only run background synchronizations on unmetered connections
	#[serde(default)]
	pub sync_only_on_wifi: bool,
}

/// Live handle to the user [`Preferences`], every clone sees the same values
#[derive(Debug, Clone)]
pub struct Settings(Arc<watch::Sender<Preferences>>);

impl Settings {
	#[must_use]
	pub fn new(preferences: Preferences) -> Self {
		Self(Arc::new(watch::Sender::new(preferences)))
	}

	#[must_use]
	pub fn preferences(&self) -> Preferences {
		self.0.borrow().clone()
	}

	#[must_use]
	pub fn sync_only_on_wifi(&self) -> bool {
		self.0.borrow().sync_only_on_wifi
	}

	pub fn set_sync_only_on_wifi(&self, enabled: bool) {
		self.0.send_if_modified(|preferences| {
			if preferences.sync_only_on_wifi == enabled {
				false
			} else {
				debug!(%enabled, "Changed sync only on wifi preference");
				preferences.sync_only_on_wifi = enabled;
				true
			}
		});
	}

	/// Receiver notified on every preference change
	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<Preferences> {
		self.0.subscribe()
	}
}

impl Default for Settings {
	fn default() -> Self {
		Self::new(Preferences::default())
	}
}
