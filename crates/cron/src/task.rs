use lms_store::SiteId;

use std::{fmt, sync::Arc, time::Duration};

/// The work a [`CronTask`] executes on every run
#[async_trait::async_trait]
pub trait CronHandler: Send + Sync + 'static {
	/// Executes the process for `site_id`, or for every site if `None`.
	///
	/// `force` is `true` on manual executions. Returning an error makes the scheduler try again
	/// soon, so it shouldn't be abused.
	async fn execute(&self, site_id: Option<SiteId>, force: bool) -> anyhow::Result<()>;
}

/// A periodic process and how it must be scheduled
#[derive(Clone)]
pub struct CronTask {
	name: String,
	interval: Option<Duration>,
	uses_network: bool,
	is_sync: bool,
	manual_trigger: Option<bool>,
	handler: Arc<dyn CronHandler>,
}

impl fmt::Debug for CronTask {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CronTask")
			.field("name", &self.name)
			.field("interval", &self.interval)
			.field("uses_network", &self.uses_network)
			.field("is_sync", &self.is_sync)
			.field("allows_manual_trigger", &self.allows_manual_trigger())
			.finish_non_exhaustive()
	}
}

impl CronTask {
	/// A synchronization task that uses the network and runs every default interval
	pub fn new(name: impl Into<String>, handler: impl CronHandler) -> Self {
		Self::from_arc(name, Arc::new(handler))
	}

	pub fn from_arc(name: impl Into<String>, handler: Arc<dyn CronHandler>) -> Self {
		Self {
			name: name.into(),
			interval: None,
			uses_network: true,
			is_sync: true,
			manual_trigger: None,
			handler,
		}
	}

	/// Desired time between executions, it can't be lower than the platform's minimum interval
	#[must_use]
	pub const fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = Some(interval);
		self
	}

	#[must_use]
	pub const fn with_network(mut self, uses_network: bool) -> Self {
		self.uses_network = uses_network;
		self
	}

	/// Synchronization tasks are the ones restricted by the "sync only on wifi" preference
	#[must_use]
	pub const fn with_sync(mut self, is_sync: bool) -> Self {
		self.is_sync = is_sync;
		self
	}

	/// Whether a manual "sync now" runs this task, defaults to [`CronTask::is_sync`]
	#[must_use]
	pub const fn with_manual_trigger(mut self, allowed: bool) -> Self {
		self.manual_trigger = Some(allowed);
		self
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub const fn interval(&self) -> Option<Duration> {
		self.interval
	}

	#[must_use]
	pub const fn uses_network(&self) -> bool {
		self.uses_network
	}

	#[must_use]
	pub const fn is_sync(&self) -> bool {
		self.is_sync
	}

	#[must_use]
	pub const fn allows_manual_trigger(&self) -> bool {
		match self.manual_trigger {
			Some(allowed) => allowed,
			None => self.is_sync,
		}
	}

	pub(crate) fn handler(&self) -> Arc<dyn CronHandler> {
		Arc::clone(&self.handler)
	}
}
