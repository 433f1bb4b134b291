use lms_core_sync::{OfflineEntry, OfflineQueue};
use lms_store::{Filter, SiteId, Store, Table};
use lms_utils::now_secs;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const READ_STATE_TABLE: Table = Table {
	name: "addon_notifications_read_offline",
	primary_key: &["id"],
};

/// A "mark as read" done while offline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStateEntry {
	pub id: Uuid,
	pub user_id: u64,
	/// `None` marks every notification of the user as read
	pub notification_id: Option<u64>,
	pub time_read: i64,
	pub time_created: i64,
}

impl ReadStateEntry {
	#[must_use]
	pub const fn is_mark_all(&self) -> bool {
		self.notification_id.is_none()
	}
}

impl OfflineEntry for ReadStateEntry {
	type Key = u64;

	const TABLE: Table = READ_STATE_TABLE;
	const KEY_FIELD: &'static str = "user_id";

	fn key(&self) -> u64 {
		self.user_id
	}

	fn time_created(&self) -> i64 {
		self.time_created
	}
}

/// What the user marked as read while offline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingReads {
	/// Time of the last "mark all as read", notifications created up to then are read
	pub all_read_at: Option<i64>,
	pub notification_ids: Vec<u64>,
}

impl PendingReads {
	#[must_use]
	pub fn is_read(&self, notification_id: u64, time_created: i64) -> bool {
		self.all_read_at.is_some_and(|time| time_created <= time)
			|| self.notification_ids.contains(&notification_id)
	}
}

#[derive(Debug, Clone)]
pub struct NotificationsOffline {
	queue: OfflineQueue<ReadStateEntry>,
}

impl NotificationsOffline {
	#[must_use]
	pub const fn new(store: Store) -> Self {
		Self {
			queue: OfflineQueue::new(store),
		}
	}

	pub async fn mark_read(
		&self,
		site_id: &SiteId,
		user_id: u64,
		notification_id: u64,
		time_read: i64,
	) -> Result<ReadStateEntry, lms_store::Error> {
		self.enqueue(site_id, user_id, Some(notification_id), time_read)
			.await
	}

	pub async fn mark_all_read(&self, site_id: &SiteId, user_id: u64) -> Result<ReadStateEntry, lms_store::Error> {
		self.enqueue(site_id, user_id, None, now_secs()).await
	}

	async fn enqueue(
		&self,
		site_id: &SiteId,
		user_id: u64,
		notification_id: Option<u64>,
		time_read: i64,
	) -> Result<ReadStateEntry, lms_store::Error> {
		let entry = ReadStateEntry {
			id: Uuid::new_v4(),
			user_id,
			notification_id,
			time_read,
			time_created: now_secs(),
		};

		self.queue.enqueue(site_id, &entry).await?;

		Ok(entry)
	}

	/// Entries of the user, oldest first
	pub async fn entries(&self, site_id: &SiteId, user_id: u64) -> Result<Vec<ReadStateEntry>, lms_store::Error> {
		self.queue.list_by_key(site_id, &user_id).await
	}

	pub async fn user_ids(&self, site_id: &SiteId) -> Result<Vec<u64>, lms_store::Error> {
		self.queue.keys(site_id).await
	}

	pub async fn has_data(&self, site_id: &SiteId, user_id: u64) -> Result<bool, lms_store::Error> {
		self.queue.has_entries(site_id, &user_id).await
	}

	pub async fn delete(&self, site_id: &SiteId, id: Uuid) -> Result<(), lms_store::Error> {
		self.queue
			.delete(site_id, &Filter::new().eq("id", id.to_string()))
			.await
			.map(|_| ())
	}

	pub async fn pending_reads(&self, site_id: &SiteId, user_id: u64) -> Result<PendingReads, lms_store::Error> {
		let mut pending = PendingReads::default();

		for entry in self.entries(site_id, user_id).await? {
			match entry.notification_id {
				Some(notification_id) => pending.notification_ids.push(notification_id),
				None => pending.all_read_at = Some(entry.time_read),
			}
		}

		Ok(pending)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn pending_reads_of_a_user() {
		let offline = NotificationsOffline::new(Store::in_memory());
		let site_id = SiteId::from("site");

		offline.mark_read(&site_id, 3, 100, 1_000).await.unwrap();
		offline.mark_read(&site_id, 4, 101, 1_000).await.unwrap();
		let mark_all = offline.mark_all_read(&site_id, 3).await.unwrap();

		let pending = offline.pending_reads(&site_id, 3).await.unwrap();
		assert_eq!(pending.notification_ids, [100]);
		assert_eq!(pending.all_read_at, Some(mark_all.time_read));
		assert!(pending.is_read(100, i64::MAX));
		assert!(pending.is_read(200, mark_all.time_read - 10));
		assert!(!pending.is_read(200, mark_all.time_read + 10));

		assert_eq!(offline.user_ids(&site_id).await.unwrap(), [3, 4]);
	}
}
