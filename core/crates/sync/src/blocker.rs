use lms_store::SiteId;

use std::{
	collections::{HashMap, HashSet},
	sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::trace;

const DEFAULT_OPERATION: &str = "-";

type BlockKey = (SiteId, &'static str, String);

/// Marks entities that are being edited by the user, so a background synchronization doesn't
/// modify their offline data at the same time
#[derive(Debug, Clone, Default)]
pub struct SyncBlocker {
	blocked: Arc<Mutex<HashMap<BlockKey, HashSet<String>>>>,
}

impl SyncBlocker {
	fn lock(&self) -> MutexGuard<'_, HashMap<BlockKey, HashSet<String>>> {
		self.blocked.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn block(&self, component: &'static str, id: &str, site_id: &SiteId, operation: Option<&str>) {
		let operation = operation.unwrap_or(DEFAULT_OPERATION);
		trace!(%component, %id, %site_id, %operation, "Blocking synchronization");

		self.lock()
			.entry((site_id.clone(), component, id.to_string()))
			.or_default()
			.insert(operation.to_string());
	}

	/// Removes a single blocking operation, or all of them when `operation` is `None`
	pub fn unblock(
		&self,
		component: &'static str,
		id: &str,
		site_id: &SiteId,
		operation: Option<&str>,
	) {
		let key = (site_id.clone(), component, id.to_string());
		let mut blocked = self.lock();

		match operation {
			None => {
				blocked.remove(&key);
			}
			Some(operation) => {
				if let Some(operations) = blocked.get_mut(&key) {
					operations.remove(operation);
					if operations.is_empty() {
						blocked.remove(&key);
					}
				}
			}
		}
	}

	#[must_use]
	pub fn is_blocked(&self, component: &'static str, id: &str, site_id: &SiteId) -> bool {
		self.lock()
			.get(&(site_id.clone(), component, id.to_string()))
			.is_some_and(|operations| !operations.is_empty())
	}

	/// Unblocks everything for a site, or for every site
	pub fn clear_blocked(&self, site_id: Option<&SiteId>) {
		let mut blocked = self.lock();

		match site_id {
			Some(site_id) => blocked.retain(|(blocked_site, _, _), _| blocked_site != site_id),
			None => blocked.clear(),
		}
	}
}
