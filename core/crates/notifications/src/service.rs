use lms_core_sync::{Error, Sites, SyncContext, WsError};
use lms_network::NetworkMonitor;
use lms_store::SiteId;
use lms_utils::{error::report_error_with_msg, now_secs};

use std::sync::Arc;

use tracing::{debug, instrument};

use super::{
	api::NotificationsApi,
	offline::{NotificationsOffline, PendingReads},
};

/// Read state changes, queued when they can't reach the server
#[derive(Clone)]
pub struct NotificationsService {
	api: Arc<dyn NotificationsApi>,
	offline: NotificationsOffline,
	network: Arc<dyn NetworkMonitor>,
	sites: Arc<dyn Sites>,
}

impl NotificationsService {
	pub fn new(api: Arc<dyn NotificationsApi>, offline: NotificationsOffline, ctx: &SyncContext) -> Self {
		Self {
			api,
			offline,
			network: Arc::clone(&ctx.network),
			sites: Arc::clone(&ctx.sites),
		}
	}

	fn resolve_site(&self, site_id: Option<SiteId>) -> Result<SiteId, Error> {
		site_id
			.or_else(|| self.sites.current_site_id())
			.ok_or(Error::NoSite)
	}

	/// Returns `false` if the change was queued to be sent later
	#[instrument(skip(self), err)]
	pub async fn mark_notification_read(
		&self,
		notification_id: u64,
		user_id: u64,
		site_id: Option<SiteId>,
	) -> Result<bool, Error> {
		let site_id = self.resolve_site(site_id)?;
		let time_read = now_secs();

		if self.network.is_online() {
			match self
				.api
				.mark_notification_read(&site_id, notification_id, time_read)
				.await
			{
				Ok(()) => {
					self.invalidate_list(&site_id).await;
					return Ok(true);
				}
				Err(e) => fallback_or_fail(e)?,
			}
		}

		self.offline
			.mark_read(&site_id, user_id, notification_id, time_read)
			.await?;

		Ok(false)
	}

	/// Returns `false` if the change was queued to be sent later
	#[instrument(skip(self), err)]
	pub async fn mark_all_notifications_as_read(&self, user_id: u64, site_id: Option<SiteId>) -> Result<bool, Error> {
		let site_id = self.resolve_site(site_id)?;

		if self.network.is_online() {
			match self
				.api
				.mark_all_notifications_as_read(&site_id, user_id)
				.await
			{
				Ok(()) => {
					self.invalidate_list(&site_id).await;
					return Ok(true);
				}
				Err(e) => fallback_or_fail(e)?,
			}
		}

		self.offline.mark_all_read(&site_id, user_id).await?;

		Ok(false)
	}

	/// Read state changes still waiting to be sent, to render those notifications as read
	pub async fn pending_reads(&self, user_id: u64, site_id: Option<SiteId>) -> Result<PendingReads, Error> {
		let site_id = self.resolve_site(site_id)?;

		self.offline
			.pending_reads(&site_id, user_id)
			.await
			.map_err(Into::into)
	}

	async fn invalidate_list(&self, site_id: &SiteId) {
		report_error_with_msg(
			&self.api.invalidate_notifications_list(site_id).await,
			"Failed to invalidate notifications list",
		);
	}
}

fn fallback_or_fail(e: WsError) -> Result<(), Error> {
	if e.is_web_service_error() {
		Err(e.into())
	} else {
		debug!(?e, "Couldn't reach the server, storing read state offline");
		Ok(())
	}
}
