use lms_core_sync::{Error, Sites, SyncContext, WsError};
use lms_network::NetworkMonitor;
use lms_store::SiteId;
use lms_utils::error::report_error_with_msg;

use std::sync::Arc;

use tracing::{debug, instrument};

use super::{
	api::{StateRef, XapiApi},
	offline::{OfflineOptions, XapiOffline},
};

/// Options of the xAPI writes
#[derive(Debug, Clone, Default)]
pub struct PostOptions {
	/// Store the data offline without trying to send it, used when there's offline data already
	/// queued for the context so the order is kept
	pub offline: bool,
	pub course_id: Option<u64>,
	pub extra: Option<String>,
	pub site_id: Option<SiteId>,
}

impl PostOptions {
	fn offline_options(&self) -> OfflineOptions {
		OfflineOptions {
			course_id: self.course_id,
			extra: self.extra.clone(),
		}
	}
}

/// xAPI writes that are queued when they can't be sent right away
#[derive(Clone)]
pub struct XapiService {
	api: Arc<dyn XapiApi>,
	offline: XapiOffline,
	network: Arc<dyn NetworkMonitor>,
	sites: Arc<dyn Sites>,
}

impl XapiService {
	pub fn new(api: Arc<dyn XapiApi>, offline: XapiOffline, ctx: &SyncContext) -> Self {
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

	/// Whether a write must go to the offline queue instead of the server
	fn store_offline(&self, options: &PostOptions) -> bool {
		options.offline || !self.network.is_online()
	}

	/// Sends statements, returns `false` if they were stored to be sent later
	#[instrument(skip(self, statements, options), err)]
	pub async fn post_statements(
		&self,
		context_id: u64,
		component: &str,
		statements: &str,
		options: PostOptions,
	) -> Result<bool, Error> {
		let site_id = self.resolve_site(options.site_id.clone())?;

		if !self.store_offline(&options) {
			match self.api.post_statements(&site_id, component, statements).await {
				Ok(()) => {
					// A finished attempt makes the offline progress useless
					report_error_with_msg(
						&self
							.offline
							.delete_states_of_context(&site_id, component, context_id)
							.await
							.map(|_| ()),
						"Failed to delete offline states after sending statements",
					);

					return Ok(true);
				}
				Err(e) => fallback_or_fail(e)?,
			}
		}

		self.offline
			.save_statements(&site_id, context_id, component, statements, options.offline_options())
			.await?;

		Ok(false)
	}

	/// Saves a state, returns `false` if it was stored to be sent later
	#[instrument(skip(self, state_data, options), err)]
	pub async fn post_state(
		&self,
		context_id: u64,
		state: &StateRef,
		state_data: &str,
		options: PostOptions,
	) -> Result<bool, Error> {
		let site_id = self.resolve_site(options.site_id.clone())?;

		if !self.store_offline(&options) {
			match self.api.post_state(&site_id, state, state_data).await {
				Ok(()) => return Ok(true),
				Err(e) => fallback_or_fail(e)?,
			}
		}

		self.offline
			.save_state(&site_id, context_id, state, state_data, options.offline_options())
			.await?;

		Ok(false)
	}

	/// Deletes a state, returns `false` if the deletion was stored to be sent later
	#[instrument(skip(self, options), err)]
	pub async fn delete_state(&self, context_id: u64, state: &StateRef, options: PostOptions) -> Result<bool, Error> {
		let site_id = self.resolve_site(options.site_id.clone())?;

		if !self.store_offline(&options) {
			match self.api.delete_state(&site_id, state).await {
				Ok(()) => return Ok(true),
				Err(e) => fallback_or_fail(e)?,
			}
		}

		self.offline
			.delete_state(&site_id, context_id, state, options.offline_options())
			.await?;

		Ok(false)
	}

	pub async fn has_offline_data(&self, context_id: u64, site_id: Option<SiteId>) -> Result<bool, Error> {
		let site_id = self.resolve_site(site_id)?;

		self.offline
			.has_data(&site_id, context_id)
			.await
			.map_err(Into::into)
	}
}

/// Server answers are returned to the caller, anything else means the data goes offline
fn fallback_or_fail(e: WsError) -> Result<(), Error> {
	if e.is_web_service_error() {
		Err(e.into())
	} else {
		debug!(?e, "Couldn't reach the server, storing data offline");
		Ok(())
	}
}
