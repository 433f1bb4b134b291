use lms_core_sync::{
	offline_data_deleted_warning, Error, ErrorKind, Reconciler, Stage, SyncResult,
};
use lms_store::SiteId;
use lms_utils::error::report_error_with_msg;

use std::sync::Arc;

use futures_concurrency::future::Join;
use tracing::{debug, instrument, warn};

use super::{
	api::NotificationsApi,
	offline::{NotificationsOffline, ReadStateEntry},
	AUTO_SYNCED_EVENT, COMPONENT,
};

const DISPLAY_NAME: &str = "Notifications";

/// Sends the read state changes done offline, one user at a time
pub struct NotificationsSync {
	api: Arc<dyn NotificationsApi>,
	offline: NotificationsOffline,
}

impl NotificationsSync {
	pub fn new(api: Arc<dyn NotificationsApi>, offline: NotificationsOffline) -> Self {
		Self { api, offline }
	}

	/// Marks everything as read, which makes the older single entries useless
	async fn sync_mark_all(
		&self,
		site_id: &SiteId,
		user_id: u64,
		resolved: &[ReadStateEntry],
	) -> Result<SyncResult, Error> {
		let mut result = SyncResult {
			updated: true,
			warnings: vec![],
		};

		if let Err(e) = self.api.mark_all_notifications_as_read(site_id, user_id).await {
			if e.classify(Stage::Entry) == ErrorKind::Connectivity {
				return Err(e.into());
			}

			warn!(?e, "Server rejected marking all notifications as read");
			result.add_warning(offline_data_deleted_warning(COMPONENT, DISPLAY_NAME, &e));
		}

		for entry in resolved {
			self.offline.delete(site_id, entry.id).await?;
		}

		Ok(result)
	}

	async fn sync_entry(&self, site_id: &SiteId, entry: &ReadStateEntry) -> Result<SyncResult, Error> {
		let mut result = SyncResult {
			updated: true,
			warnings: vec![],
		};

		if let Some(notification_id) = entry.notification_id {
			if let Err(e) = self
				.api
				.mark_notification_read(site_id, notification_id, entry.time_read)
				.await
			{
				if e.classify(Stage::Entry) == ErrorKind::Connectivity {
					return Err(e.into());
				}

				warn!(%notification_id, ?e, "Server rejected marking notification as read");
				result.add_warning(offline_data_deleted_warning(COMPONENT, DISPLAY_NAME, &e));
			}
		}

		self.offline.delete(site_id, entry.id).await?;

		Ok(result)
	}
}

#[async_trait::async_trait]
impl Reconciler for NotificationsSync {
	type Key = u64;

	const COMPONENT: &'static str = COMPONENT;
	const AUTO_SYNCED_EVENT: &'static str = AUTO_SYNCED_EVENT;

	async fn pending_keys(&self, site_id: &SiteId) -> Result<Vec<u64>, Error> {
		self.offline.user_ids(site_id).await.map_err(Into::into)
	}

	async fn has_data_to_sync(&self, site_id: &SiteId, user_id: &u64) -> Result<bool, Error> {
		self.offline
			.has_data(site_id, *user_id)
			.await
			.map_err(Into::into)
	}

	#[instrument(skip(self), err)]
	async fn reconcile(&self, site_id: &SiteId, user_id: &u64) -> Result<SyncResult, Error> {
		let mut entries = self.offline.entries(site_id, *user_id).await?;

		if entries.is_empty() {
			return Ok(SyncResult::default());
		}

		let mut result = SyncResult::default();

		if let Some(last_mark_all) = entries.iter().rposition(ReadStateEntry::is_mark_all) {
			let remaining = entries.split_off(last_mark_all + 1);
			debug!(
				dropped = entries.len() - 1,
				"Marking all notifications as read, dropping older entries"
			);

			result = result.merge(self.sync_mark_all(site_id, *user_id, &entries).await?);
			entries = remaining;
		}

		result = entries
			.iter()
			.map(|entry| self.sync_entry(site_id, entry))
			.collect::<Vec<_>>()
			.join()
			.await
			.into_iter()
			.try_fold(result, |result, entry_result| {
				Ok::<_, Error>(result.merge(entry_result?))
			})?;

		if result.updated {
			report_error_with_msg(
				&self.api.invalidate_notifications_list(site_id).await,
				"Failed to invalidate notifications list",
			);
		}

		Ok(result)
	}
}
