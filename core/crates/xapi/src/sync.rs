use lms_core_sync::{
	offline_data_deleted_warning, Error, ErrorKind, ReadingStrategy, Reconciler, Stage, SyncResult,
	WsError,
};
use lms_store::SiteId;
use lms_utils::error::report_error_with_msg;

use std::sync::Arc;

use futures_concurrency::future::Join;
use tracing::{debug, instrument, trace, warn};

use super::{
	api::{last_attempt, H5PActivity, XapiApi},
	offline::{StateEntry, StatementsEntry, XapiOffline},
	AUTO_SYNCED_EVENT, COMPONENT,
};

const STALE_STATE_REASON: &str = "A more recent attempt was finished in another device.";
const CONFLICTING_STATE_REASON: &str = "The progress was modified in another device.";

/// Delivers the offline xAPI data of H5P activities, one activity context at a time
pub struct H5PActivitySync {
	api: Arc<dyn XapiApi>,
	offline: XapiOffline,
}

impl H5PActivitySync {
	pub fn new(api: Arc<dyn XapiApi>, offline: XapiOffline) -> Self {
		Self { api, offline }
	}

	#[must_use]
	pub const fn offline(&self) -> &XapiOffline {
		&self.offline
	}

	async fn discard_all(&self, site_id: &SiteId, context_id: u64) -> Result<SyncResult, Error> {
		self.offline.delete_all(site_id, context_id).await?;

		Ok(SyncResult {
			updated: true,
			warnings: vec![],
		})
	}

	async fn sync_statements(
		&self,
		site_id: &SiteId,
		activity: &H5PActivity,
		entries: Vec<StatementsEntry>,
	) -> Result<SyncResult, Error> {
		let mut result = SyncResult::default();

		// Order matters, a batch can depend on the previous ones
		for entry in entries {
			match self
				.api
				.post_statements(site_id, &entry.component, &entry.statements)
				.await
			{
				Ok(()) => trace!(id = %entry.id, "Offline statements sent"),
				Err(e) => match e.classify(Stage::Entry) {
					ErrorKind::Connectivity => return Err(e.into()),
					ErrorKind::ServerRejection | ErrorKind::EntityGone => {
						warn!(id = %entry.id, ?e, "Server rejected offline statements, discarding them");
						result.add_warning(offline_data_deleted_warning(
							COMPONENT,
							&activity.name,
							&e,
						));
					}
				},
			}

			self.offline.delete_statements(site_id, entry.id).await?;
			result.updated = true;
		}

		if result.updated {
			report_error_with_msg(
				&self
					.api
					.invalidate_user_attempts(site_id, activity.id)
					.await,
				"Failed to invalidate user attempts",
			);
		}

		Ok(result)
	}

	async fn sync_state(
		&self,
		site_id: &SiteId,
		activity: &H5PActivity,
		entry: StateEntry,
		last_online_attempt: Option<i64>,
	) -> Result<SyncResult, Error> {
		let mut result = SyncResult::default();

		if let Some(reason) = self
			.state_conflict(site_id, &entry, last_online_attempt)
			.await?
		{
			debug!(id = %entry.id, state_id = %entry.state_id, %reason, "Discarding offline state");
			self.offline.delete_state_entry(site_id, entry.id).await?;
			result.updated = true;
			result.add_warning(offline_data_deleted_warning(COMPONENT, &activity.name, reason));

			return Ok(result);
		}

		let state = entry.state_ref();
		let sent = match &entry.state_data {
			Some(state_data) => self.api.post_state(site_id, &state, state_data).await,
			None => self.api.delete_state(site_id, &state).await,
		};

		if let Err(e) = sent {
			if e.classify(Stage::Entry) == ErrorKind::Connectivity {
				return Err(e.into());
			}

			warn!(id = %entry.id, ?e, "Server rejected offline state, discarding it");
			result.add_warning(offline_data_deleted_warning(COMPONENT, &activity.name, &e));
		}

		self.offline.delete_state_entry(site_id, entry.id).await?;
		result.updated = true;

		Ok(result)
	}

	/// Why the offline state can't be sent, if it can't
	async fn state_conflict(
		&self,
		site_id: &SiteId,
		entry: &StateEntry,
		last_online_attempt: Option<i64>,
	) -> Result<Option<String>, Error> {
		if last_online_attempt.is_some_and(|time_created| entry.time_created <= time_created) {
			return Ok(Some(STALE_STATE_REASON.to_string()));
		}

		match self
			.api
			.get_state_ids_since(site_id, &entry.state_ref(), entry.time_created)
			.await
		{
			Ok(state_ids) if state_ids.contains(&entry.state_id) => {
				Ok(Some(CONFLICTING_STATE_REASON.to_string()))
			}
			Ok(_) => Ok(None),
			Err(e) => match e.classify(Stage::Entry) {
				ErrorKind::Connectivity => Err(e.into()),
				ErrorKind::ServerRejection | ErrorKind::EntityGone => Ok(Some(e.to_string())),
			},
		}
	}

	/// Creation time of the last attempt known by the server
	async fn last_online_attempt(&self, site_id: &SiteId, activity: &H5PActivity) -> Result<Option<i64>, Error> {
		match self
			.api
			.get_user_attempts(site_id, activity.id, ReadingStrategy::OnlyNetwork)
			.await
		{
			Ok(attempts) => Ok(last_attempt(&attempts).map(|attempt| attempt.time_created)),
			Err(WsError::Exception { errorcode, message }) => {
				// Attempts can't be read by everyone, the per state checks still apply
				debug!(%errorcode, %message, "Can't get the online attempts");
				Ok(None)
			}
			Err(e) => Err(e.into()),
		}
	}
}

#[async_trait::async_trait]
impl Reconciler for H5PActivitySync {
	type Key = u64;

	const COMPONENT: &'static str = COMPONENT;
	const AUTO_SYNCED_EVENT: &'static str = AUTO_SYNCED_EVENT;

	async fn pending_keys(&self, site_id: &SiteId) -> Result<Vec<u64>, Error> {
		self.offline.context_ids(site_id).await.map_err(Into::into)
	}

	async fn has_data_to_sync(&self, site_id: &SiteId, context_id: &u64) -> Result<bool, Error> {
		self.offline
			.has_data(site_id, *context_id)
			.await
			.map_err(Into::into)
	}

	#[instrument(skip(self), err)]
	async fn reconcile(&self, site_id: &SiteId, context_id: &u64) -> Result<SyncResult, Error> {
		let context_id = *context_id;

		let statements = self.offline.statements(site_id, context_id).await?;
		let states = self.offline.states(site_id, context_id).await?;

		if statements.is_empty() && states.is_empty() {
			return Ok(SyncResult::default());
		}

		let Some(course_id) = statements
			.iter()
			.map(|entry| entry.course_id)
			.chain(states.iter().map(|entry| entry.course_id))
			.flatten()
			.next()
		else {
			warn!("Offline xAPI data without a course, discarding it");
			return self.discard_all(site_id, context_id).await;
		};

		let activity = match self
			.api
			.get_activity_by_context(site_id, course_id, context_id, ReadingStrategy::PreferNetwork)
			.await
		{
			Ok(activity) => activity,
			Err(e) if e.classify(Stage::Entity) == ErrorKind::EntityGone => {
				warn!(?e, "Activity not available anymore, discarding its offline data");
				return self.discard_all(site_id, context_id).await;
			}
			Err(e) => return Err(e.into()),
		};

		if let Err(e) = self.api.sync_activity_logs(site_id, &activity).await {
			debug!(?e, "Failed to synchronize activity logs");
		}

		// Must be read before sending statements, otherwise the attempt they create would be
		// taken as the last online attempt
		let last_online_attempt = if states.is_empty() {
			None
		} else {
			self.last_online_attempt(site_id, &activity).await?
		};

		let result = self.sync_statements(site_id, &activity, statements).await?;

		states
			.into_iter()
			.map(|entry| self.sync_state(site_id, &activity, entry, last_online_attempt))
			.collect::<Vec<_>>()
			.join()
			.await
			.into_iter()
			.try_fold(result, |result, state_result| Ok(result.merge(state_result?)))
	}
}
