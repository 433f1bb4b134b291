use lms_store::{Filter, Scope, SiteId, Store, Table};

use std::{fmt, marker::PhantomData};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::trace;

use super::SyncKey;

/// A record waiting in an [`OfflineQueue`] until the server confirms or rejects it
pub trait OfflineEntry: Serialize + DeserializeOwned + Send + Sync + 'static {
	type Key: SyncKey + Into<Value>;

	const TABLE: Table;

	/// Record field holding [`OfflineEntry::Key`]
	const KEY_FIELD: &'static str;

	fn key(&self) -> Self::Key;

	fn time_created(&self) -> i64;
}

/// Site scoped queue of offline entries of one kind
pub struct OfflineQueue<E> {
	store: Store,
	_entry: PhantomData<fn() -> E>,
}

impl<E> Clone for OfflineQueue<E> {
	fn clone(&self) -> Self {
		Self {
			store: self.store.clone(),
			_entry: PhantomData,
		}
	}
}

impl<E: OfflineEntry> fmt::Debug for OfflineQueue<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OfflineQueue")
			.field("table", &E::TABLE.name)
			.finish()
	}
}

impl<E: OfflineEntry> OfflineQueue<E> {
	#[must_use]
	pub const fn new(store: Store) -> Self {
		Self {
			store,
			_entry: PhantomData,
		}
	}

	pub async fn enqueue(&self, site_id: &SiteId, entry: &E) -> Result<(), lms_store::Error> {
		trace!(table = E::TABLE.name, key = %entry.key(), %site_id, "Queueing offline entry");

		self.store
			.insert(&Scope::from(site_id), &E::TABLE, entry)
			.await
	}

	/// Entries of `key` from the oldest to the newest, ties keep their queueing order
	pub async fn list_by_key(&self, site_id: &SiteId, key: &E::Key) -> Result<Vec<E>, lms_store::Error> {
		self.list(site_id, Some(&Filter::new().eq(E::KEY_FIELD, key.clone())))
			.await
	}

	pub async fn list_all(&self, site_id: &SiteId) -> Result<Vec<E>, lms_store::Error> {
		self.list(site_id, None).await
	}

	pub async fn list(&self, site_id: &SiteId, filter: Option<&Filter>) -> Result<Vec<E>, lms_store::Error> {
		let mut entries = self
			.store
			.get_all::<E>(&Scope::from(site_id), &E::TABLE, filter)
			.await?;

		entries.sort_by_key(E::time_created);

		Ok(entries)
	}

	/// Distinct keys with queued entries, the key with the oldest entry first
	pub async fn keys(&self, site_id: &SiteId) -> Result<Vec<E::Key>, lms_store::Error> {
		let mut keys = Vec::new();

		for entry in self.list_all(site_id).await? {
			let key = entry.key();
			if !keys.contains(&key) {
				keys.push(key);
			}
		}

		Ok(keys)
	}

	pub async fn has_entries(&self, site_id: &SiteId, key: &E::Key) -> Result<bool, lms_store::Error> {
		self.list_by_key(site_id, key)
			.await
			.map(|entries| !entries.is_empty())
	}

	pub async fn delete(&self, site_id: &SiteId, filter: &Filter) -> Result<usize, lms_store::Error> {
		self.store
			.delete(&Scope::from(site_id), &E::TABLE, filter)
			.await
	}

	pub async fn delete_by_key(&self, site_id: &SiteId, key: &E::Key) -> Result<usize, lms_store::Error> {
		self.delete(site_id, &Filter::new().eq(E::KEY_FIELD, key.clone()))
			.await
	}
}
