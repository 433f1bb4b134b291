//!
//! # Offline sync
//!
//! Shared machinery of the components that queue user actions while offline and send them later:
//! single flight per (site, entity), sync times, blocking, and the [`WsError`] taxonomy that
//! decides whether queued data is kept or discarded after a failure.
//!
//! Components only implement [`Reconciler`], the [`SyncCoordinator`] does the rest.

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use lms_store::SiteId;

use std::{
	fmt,
	hash::Hash,
	sync::{Arc, RwLock},
};

use serde::Serialize;

mod blocker;
mod coordinator;
mod cron;
mod queue;
pub mod sync_table;
mod ws;

pub use blocker::SyncBlocker;
pub use coordinator::{Coordinator as SyncCoordinator, SyncContext};
pub use queue::{OfflineEntry, OfflineQueue};
pub use ws::{ErrorKind, ReadingStrategy, Stage, WsError};

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
	#[error("no site to synchronize")]
	NoSite,
	#[error("can't synchronize without a network connection")]
	Offline,
	#[error("synchronization of {component} <id='{id}'> is blocked by an ongoing operation")]
	Blocked { component: &'static str, id: String },
	#[error(transparent)]
	Ws(#[from] WsError),
	#[error("storage error: {0}")]
	Store(Arc<lms_store::Error>),
	#[error("synchronization task panicked")]
	Panicked,
}

impl From<lms_store::Error> for Error {
	fn from(e: lms_store::Error) -> Self {
		Self::Store(Arc::new(e))
	}
}

impl Error {
	/// Failures that leave the offline data untouched and are worth retrying later
	#[must_use]
	pub fn is_connectivity(&self) -> bool {
		match self {
			Self::Offline => true,
			Self::Ws(e) => e.classify(Stage::Entry) == ErrorKind::Connectivity,
			_ => false,
		}
	}
}

/// Outcome of synchronizing one entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
	/// Whether something was sent or discarded
	pub updated: bool,
	pub warnings: Vec<String>,
}

impl SyncResult {
	pub fn add_warning(&mut self, warning: impl Into<String>) {
		let warning = warning.into();
		if !self.warnings.contains(&warning) {
			self.warnings.push(warning);
		}
	}

	#[must_use]
	pub fn merge(mut self, other: Self) -> Self {
		self.updated |= other.updated;
		for warning in other.warnings {
			self.add_warning(warning);
		}
		self
	}
}

/// Payload of the auto synced events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncEvent {
	pub site_id: SiteId,
	pub component: &'static str,
	pub id: String,
	pub warnings: Vec<String>,
}

/// Warning shown when offline data had to be thrown away
#[must_use]
pub fn offline_data_deleted_warning(component: &str, name: &str, reason: impl fmt::Display) -> String {
	format!("Offline data from {component} '{name}' has been deleted. {reason}")
}

/// Identifies the entity a queued batch belongs to (an activity, a whole notifications list)
pub trait SyncKey: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static> SyncKey for T {}

/// Component specific half of a synchronization
#[async_trait::async_trait]
pub trait Reconciler: Send + Sync + 'static {
	type Key: SyncKey;

	/// Used in sync times, blocks and warnings
	const COMPONENT: &'static str;

	/// Event triggered, keyed by site, when an automatic synchronization updated something
	const AUTO_SYNCED_EVENT: &'static str;

	/// Every entity with queued data on the site
	async fn pending_keys(&self, site_id: &SiteId) -> Result<Vec<Self::Key>, Error>;

	async fn has_data_to_sync(&self, site_id: &SiteId, key: &Self::Key) -> Result<bool, Error>;

	/// Sends or discards the queued data of one entity
	///
	/// Only connectivity failures are returned, everything else must be resolved (and the data
	/// discarded with a warning) inside.
	async fn reconcile(&self, site_id: &SiteId, key: &Self::Key) -> Result<SyncResult, Error>;
}

/// Sites the app is logged into
pub trait Sites: Send + Sync + 'static {
	fn current_site_id(&self) -> Option<SiteId>;

	fn site_ids(&self) -> Vec<SiteId>;
}

/// [`Sites`] backed by a plain list, the first site being the current one unless told otherwise
#[derive(Debug, Default)]
pub struct SiteList {
	inner: RwLock<(Option<SiteId>, Vec<SiteId>)>,
}

impl SiteList {
	pub fn new(sites: impl IntoIterator<Item = SiteId>) -> Self {
		let sites = sites.into_iter().collect::<Vec<_>>();

		Self {
			inner: RwLock::new((sites.first().cloned(), sites)),
		}
	}

	pub fn add(&self, site_id: SiteId) {
		let mut inner = self
			.inner
			.write()
			.unwrap_or_else(std::sync::PoisonError::into_inner);

		if !inner.1.contains(&site_id) {
			inner.1.push(site_id.clone());
		}
		if inner.0.is_none() {
			inner.0 = Some(site_id);
		}
	}

	pub fn set_current(&self, site_id: Option<SiteId>) {
		self.inner
			.write()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
			.0 = site_id;
	}
}

impl Sites for SiteList {
	fn current_site_id(&self) -> Option<SiteId> {
		self.inner
			.read()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
			.0
			.clone()
	}

	fn site_ids(&self) -> Vec<SiteId> {
		self.inner
			.read()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
			.1
			.clone()
	}
}
