use lms_cron::{CronHandler, CronTask};
use lms_store::SiteId;

use super::{coordinator::Coordinator, Reconciler};

#[async_trait::async_trait]
impl<R: Reconciler> CronHandler for Coordinator<R> {
	async fn execute(&self, site_id: Option<SiteId>, force: bool) -> anyhow::Result<()> {
		self.sync_all_sites(site_id, force)
			.await
			.map_err(Into::into)
	}
}

impl<R: Reconciler> Coordinator<R> {
	/// Cron task synchronizing every entity with offline data once per sync interval
	#[must_use]
	pub fn cron_task(&self, name: impl Into<String>) -> CronTask {
		CronTask::new(name, self.clone())
			.with_interval(self.sync_interval())
			.with_sync(true)
	}
}
