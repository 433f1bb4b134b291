use lms_events::EventBus;
use lms_network::NetworkMonitor;
use lms_store::{SiteId, Store};
use lms_utils::{duration_to_millis, error::report_error_with_msg, now_millis};

use std::{
	collections::HashMap,
	fmt,
	sync::{Arc, Mutex, MutexGuard, PoisonError},
	time::Duration,
};

use futures::{
	future::{BoxFuture, Shared},
	FutureExt,
};
use futures_concurrency::future::Join;
use tokio::spawn;
use tracing::{debug, error, instrument, trace, warn, Instrument};

use super::{sync_table, Error, Reconciler, Sites, SyncBlocker, SyncEvent, SyncResult};

type OngoingSync = Shared<BoxFuture<'static, Result<SyncResult, Error>>>;

/// Collaborators shared by every coordinator of a node
#[derive(Clone)]
pub struct SyncContext {
	pub store: Store,
	pub network: Arc<dyn NetworkMonitor>,
	pub sites: Arc<dyn Sites>,
	pub events: EventBus<SyncEvent>,
	pub blocker: SyncBlocker,
}

impl fmt::Debug for SyncContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SyncContext")
			.field("sites", &self.sites.site_ids())
			.field("online", &self.network.is_online())
			.finish_non_exhaustive()
	}
}

struct Inner<R: Reconciler> {
	reconciler: R,
	ctx: SyncContext,
	sync_interval: Duration,
	ongoing: Mutex<HashMap<(SiteId, R::Key), OngoingSync>>,
}

impl<R: Reconciler> Inner<R> {
	fn lock_ongoing(&self) -> MutexGuard<'_, HashMap<(SiteId, R::Key), OngoingSync>> {
		self.ongoing.lock().unwrap_or_else(PoisonError::into_inner)
	}

	async fn perform_sync(self: Arc<Self>, site_id: SiteId, key: R::Key) -> Result<SyncResult, Error> {
		let _guard = OngoingGuard {
			inner: &*self,
			key: (site_id.clone(), key.clone()),
		};

		let id = key.to_string();
		trace!(%site_id, %id, component = R::COMPONENT, "Reconciling offline data");

		let res = self.reconciler.reconcile(&site_id, &key).await;

		report_error_with_msg(
			&sync_table::set_sync_time(&self.ctx.store, &site_id, R::COMPONENT, &id, now_millis())
				.await,
			"Failed to store synchronization time",
		);

		if let Ok(SyncResult { warnings, .. }) = &res {
			report_error_with_msg(
				&sync_table::set_sync_warnings(
					&self.ctx.store,
					&site_id,
					R::COMPONENT,
					&id,
					warnings.clone(),
				)
				.await,
				"Failed to store synchronization warnings",
			);
		}

		res
	}
}

/// Removes the finished synchronization from the in-flight map, also when the reconciler panics
struct OngoingGuard<'a, R: Reconciler> {
	inner: &'a Inner<R>,
	key: (SiteId, R::Key),
}

impl<R: Reconciler> Drop for OngoingGuard<'_, R> {
	fn drop(&mut self) {
		self.inner.lock_ongoing().remove(&self.key);
	}
}

/// Runs the synchronizations of one [`Reconciler`], cheap to clone
pub struct Coordinator<R: Reconciler> {
	inner: Arc<Inner<R>>,
}

impl<R: Reconciler> Clone for Coordinator<R> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<R: Reconciler> fmt::Debug for Coordinator<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SyncCoordinator")
			.field("component", &R::COMPONENT)
			.field("sync_interval", &self.inner.sync_interval)
			.finish_non_exhaustive()
	}
}

impl<R: Reconciler> Coordinator<R> {
	pub fn new(reconciler: R, ctx: SyncContext, sync_interval: Duration) -> Self {
		Self {
			inner: Arc::new(Inner {
				reconciler,
				ctx,
				sync_interval,
				ongoing: Mutex::default(),
			}),
		}
	}

	#[must_use]
	pub fn reconciler(&self) -> &R {
		&self.inner.reconciler
	}

	#[must_use]
	pub fn context(&self) -> &SyncContext {
		&self.inner.ctx
	}

	#[must_use]
	pub fn sync_interval(&self) -> Duration {
		self.inner.sync_interval
	}

	fn resolve_site(&self, site_id: Option<SiteId>) -> Result<SiteId, Error> {
		site_id
			.or_else(|| self.inner.ctx.sites.current_site_id())
			.ok_or(Error::NoSite)
	}

	#[must_use]
	pub fn is_syncing(&self, key: &R::Key, site_id: &SiteId) -> bool {
		self.inner
			.lock_ongoing()
			.contains_key(&(site_id.clone(), key.clone()))
	}

	/// Synchronizes the offline data of `key`, joining the synchronization already in flight if any
	#[instrument(skip(self), fields(component = R::COMPONENT), err)]
	pub async fn sync(&self, key: R::Key, site_id: Option<SiteId>) -> Result<SyncResult, Error> {
		let site_id = self.resolve_site(site_id)?;

		if !self.inner.ctx.network.is_online() {
			return Err(Error::Offline);
		}

		let sync = {
			let mut ongoing = self.inner.lock_ongoing();

			if let Some(sync) = ongoing.get(&(site_id.clone(), key.clone())) {
				debug!("Synchronization already in progress, joining it");
				sync.clone()
			} else {
				let id = key.to_string();
				if self
					.inner
					.ctx
					.blocker
					.is_blocked(R::COMPONENT, &id, &site_id)
				{
					debug!("Synchronization is blocked");
					return Err(Error::Blocked {
						component: R::COMPONENT,
						id,
					});
				}

				let handle = spawn(
					Arc::clone(&self.inner)
						.perform_sync(site_id.clone(), key.clone())
						.in_current_span(),
				);

				let sync = async move {
					handle.await.unwrap_or_else(|e| {
						error!(?e, "Synchronization task failed to complete");
						Err(Error::Panicked)
					})
				}
				.boxed()
				.shared();

				ongoing.insert((site_id, key), sync.clone());

				sync
			}
		};

		sync.await
	}

	/// Like [`Coordinator::sync`] but only if the last synchronization is older than the sync
	/// interval, `None` when it was skipped
	pub async fn sync_if_needed(
		&self,
		key: R::Key,
		site_id: Option<SiteId>,
	) -> Result<Option<SyncResult>, Error> {
		let site_id = self.resolve_site(site_id)?;

		if self.is_sync_needed(&key, &site_id).await? {
			self.sync(key, Some(site_id)).await.map(Some)
		} else {
			trace!(component = R::COMPONENT, %key, "Synchronization not needed yet");
			Ok(None)
		}
	}

	pub async fn is_sync_needed(&self, key: &R::Key, site_id: &SiteId) -> Result<bool, Error> {
		let last = self.sync_time(key, site_id).await?;

		Ok(now_millis() - last >= duration_to_millis(self.inner.sync_interval))
	}

	pub async fn sync_time(&self, key: &R::Key, site_id: &SiteId) -> Result<i64, Error> {
		sync_table::sync_time(
			&self.inner.ctx.store,
			site_id,
			R::COMPONENT,
			&key.to_string(),
		)
		.await
		.map_err(Into::into)
	}

	pub async fn set_sync_time(&self, key: &R::Key, site_id: &SiteId, time: i64) -> Result<(), Error> {
		sync_table::set_sync_time(
			&self.inner.ctx.store,
			site_id,
			R::COMPONENT,
			&key.to_string(),
			time,
		)
		.await
		.map_err(Into::into)
	}

	pub async fn sync_warnings(&self, key: &R::Key, site_id: &SiteId) -> Result<Vec<String>, Error> {
		sync_table::sync_warnings(
			&self.inner.ctx.store,
			site_id,
			R::COMPONENT,
			&key.to_string(),
		)
		.await
		.map_err(Into::into)
	}

	pub async fn has_data_to_sync(&self, key: &R::Key, site_id: Option<SiteId>) -> Result<bool, Error> {
		let site_id = self.resolve_site(site_id)?;

		self.inner.reconciler.has_data_to_sync(&site_id, key).await
	}

	pub fn block(&self, key: &R::Key, site_id: &SiteId, operation: Option<&str>) {
		self.inner
			.ctx
			.blocker
			.block(R::COMPONENT, &key.to_string(), site_id, operation);
	}

	pub fn unblock(&self, key: &R::Key, site_id: &SiteId, operation: Option<&str>) {
		self.inner
			.ctx
			.blocker
			.unblock(R::COMPONENT, &key.to_string(), site_id, operation);
	}

	/// Synchronizes every entity with offline data, on one site or on all of them
	///
	/// Sites are processed one after the other and the entities of a site concurrently. Every
	/// entity is tried even if another one failed, the first failure is returned at the end.
	#[instrument(skip(self), fields(component = R::COMPONENT))]
	pub async fn sync_all_sites(&self, site_id: Option<SiteId>, force: bool) -> Result<(), Error> {
		if !self.inner.ctx.network.is_online() {
			debug!("Can't synchronize while offline");
			return Err(Error::Offline);
		}

		let site_ids = site_id.map_or_else(|| self.inner.ctx.sites.site_ids(), |id| vec![id]);

		let mut first_error = None;

		for site_id in site_ids {
			if let Err(e) = self.sync_site(&site_id, force).await {
				error!(%site_id, ?e, "Failed to synchronize site");
				first_error.get_or_insert(e);
			}
		}

		first_error.map_or(Ok(()), Err)
	}

	async fn sync_site(&self, site_id: &SiteId, force: bool) -> Result<(), Error> {
		let keys = self.inner.reconciler.pending_keys(site_id).await?;

		debug!(%site_id, count = keys.len(), "Synchronizing entities with offline data");

		keys.into_iter()
			.map(|key| self.sync_key_and_notify(site_id, key, force))
			.collect::<Vec<_>>()
			.join()
			.await
			.into_iter()
			.collect::<Result<Vec<()>, _>>()
			.map(|_| ())
	}

	async fn sync_key_and_notify(&self, site_id: &SiteId, key: R::Key, force: bool) -> Result<(), Error> {
		let res = if force {
			self.sync(key.clone(), Some(site_id.clone())).await.map(Some)
		} else {
			self.sync_if_needed(key.clone(), Some(site_id.clone())).await
		};

		match res {
			Ok(Some(result)) if result.updated => {
				self.inner.ctx.events.trigger(
					R::AUTO_SYNCED_EVENT,
					Some(site_id.as_str()),
					SyncEvent {
						site_id: site_id.clone(),
						component: R::COMPONENT,
						id: key.to_string(),
						warnings: result.warnings,
					},
				);
				Ok(())
			}
			Ok(_) => Ok(()),
			Err(Error::Blocked { .. }) => {
				// The user is working on it, the next run will take it
				warn!(%site_id, %key, "Skipping blocked synchronization");
				Ok(())
			}
			Err(e) => Err(e),
		}
	}
}
