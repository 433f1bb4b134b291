use lms_store::{Filter, MemoryStore, PersistentStore, Scope, SiteId, Store, Table};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

const ITEMS: Table = Table {
	name: "items",
	primary_key: &["id"],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Item {
	id: i64,
	group: String,
	value: String,
}

fn item(id: i64, group: &str, value: &str) -> Item {
	Item {
		id,
		group: group.to_string(),
		value: value.to_string(),
	}
}

#[tokio::test]
async fn insert_replaces_same_primary_key_and_keeps_order() {
	let store = Store::in_memory();
	let scope = Scope::App;

	store.insert(&scope, &ITEMS, &item(1, "a", "first")).await.unwrap();
	store.insert(&scope, &ITEMS, &item(2, "a", "second")).await.unwrap();
	store.insert(&scope, &ITEMS, &item(1, "a", "updated")).await.unwrap();

	let items = store.get_all::<Item>(&scope, &ITEMS, None).await.unwrap();

	assert_eq!(items, vec![item(1, "a", "updated"), item(2, "a", "second")]);
}

#[tokio::test]
async fn scopes_are_isolated() {
	let store = Store::in_memory();
	let site_a = Scope::from(&SiteId::from("a"));
	let site_b = Scope::from(&SiteId::from("b"));

	store.insert(&site_a, &ITEMS, &item(1, "g", "x")).await.unwrap();

	assert!(store
		.get::<Item>(&site_b, &ITEMS, &Filter::new().eq("id", 1))
		.await
		.unwrap()
		.is_none());
	assert_eq!(
		store
			.get::<Item>(&site_a, &ITEMS, &Filter::new().eq("id", 1))
			.await
			.unwrap(),
		Some(item(1, "g", "x"))
	);
}

#[tokio::test]
async fn delete_by_filter_counts_removed_records() {
	let backend = Arc::new(MemoryStore::default());
	let store = Store::from_arc(Arc::clone(&backend) as Arc<dyn PersistentStore>);
	let scope = Scope::App;

	for (id, group) in [(1, "a"), (2, "b"), (3, "a")] {
		store.insert(&scope, &ITEMS, &item(id, group, "v")).await.unwrap();
	}

	let removed = store
		.delete(&scope, &ITEMS, &Filter::new().eq("group", "a"))
		.await
		.unwrap();

	assert_eq!(removed, 2);
	assert_eq!(backend.writes(), 4);
	assert_eq!(
		store.get_all::<Item>(&scope, &ITEMS, None).await.unwrap(),
		vec![item(2, "b", "v")]
	);
}

#[tokio::test]
async fn records_without_primary_key_are_refused() {
	#[derive(Serialize)]
	struct NoId {
		value: String,
	}

	let store = Store::in_memory();

	assert!(store
		.insert(
			&Scope::App,
			&ITEMS,
			&NoId {
				value: "x".to_string()
			}
		)
		.await
		.is_err());
}
