use lms_store::{Filter, Scope, SiteId, Store, Table};

use serde::{Deserialize, Serialize};

/// Site table with the last synchronization of every (component, id) pair
pub const SYNC_TABLE: Table = Table {
	name: "sync",
	primary_key: &["component", "id"],
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SyncEntry {
	component: String,
	id: String,
	#[serde(default)]
	time: i64,
	#[serde(default)]
	warnings: Vec<String>,
}

fn key(component: &str, id: &str) -> Filter {
	Filter::new()
		.eq("component", component)
		.eq("id", id)
}

async fn get_entry(
	store: &Store,
	site_id: &SiteId,
	component: &str,
	id: &str,
) -> Result<SyncEntry, lms_store::Error> {
	Ok(store
		.get::<SyncEntry>(&Scope::from(site_id), &SYNC_TABLE, &key(component, id))
		.await?
		.unwrap_or_else(|| SyncEntry {
			component: component.to_string(),
			id: id.to_string(),
			time: 0,
			warnings: vec![],
		}))
}

/// Last synchronization time in milliseconds, `0` if it never happened
pub async fn sync_time(
	store: &Store,
	site_id: &SiteId,
	component: &str,
	id: &str,
) -> Result<i64, lms_store::Error> {
	get_entry(store, site_id, component, id)
		.await
		.map(|entry| entry.time)
}

pub async fn set_sync_time(
	store: &Store,
	site_id: &SiteId,
	component: &str,
	id: &str,
	time: i64,
) -> Result<(), lms_store::Error> {
	let mut entry = get_entry(store, site_id, component, id).await?;
	entry.time = time;

	store
		.insert(&Scope::from(site_id), &SYNC_TABLE, &entry)
		.await
}

/// Warnings of the last synchronization, kept so they can be shown when the user opens the entity
pub async fn sync_warnings(
	store: &Store,
	site_id: &SiteId,
	component: &str,
	id: &str,
) -> Result<Vec<String>, lms_store::Error> {
	get_entry(store, site_id, component, id)
		.await
		.map(|entry| entry.warnings)
}

pub async fn set_sync_warnings(
	store: &Store,
	site_id: &SiteId,
	component: &str,
	id: &str,
	warnings: Vec<String>,
) -> Result<(), lms_store::Error> {
	let mut entry = get_entry(store, site_id, component, id).await?;
	entry.warnings = warnings;

	store
		.insert(&Scope::from(site_id), &SYNC_TABLE, &entry)
		.await
}
