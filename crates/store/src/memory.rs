use std::{
	collections::HashMap,
	sync::atomic::{AtomicUsize, Ordering},
};

use tokio::sync::RwLock;
use tracing::trace;

use super::{Error, Filter, PersistentStore, Record, Scope, Table};

/// In memory [`PersistentStore`], records of a table are kept in insertion order
#[derive(Debug, Default)]
pub struct MemoryStore {
	tables: RwLock<HashMap<(Scope, &'static str), Vec<Record>>>,
	writes: AtomicUsize,
}

impl MemoryStore {
	/// How many insert and delete calls reached this store
	pub fn writes(&self) -> usize {
		self.writes.load(Ordering::Acquire)
	}
}

fn same_primary_key(table: &Table, left: &Record, right: &Record) -> bool {
	table
		.primary_key
		.iter()
		.all(|field| left.get(*field) == right.get(*field))
}

#[async_trait::async_trait]
impl PersistentStore for MemoryStore {
	async fn get(
		&self,
		scope: &Scope,
		table: &Table,
		key: &Filter,
	) -> Result<Option<Record>, Error> {
		Ok(self
			.tables
			.read()
			.await
			.get(&(scope.clone(), table.name))
			.and_then(|records| records.iter().find(|record| key.matches(record)))
			.cloned())
	}

	async fn get_all(
		&self,
		scope: &Scope,
		table: &Table,
		filter: Option<&Filter>,
	) -> Result<Vec<Record>, Error> {
		Ok(self
			.tables
			.read()
			.await
			.get(&(scope.clone(), table.name))
			.map(|records| {
				records
					.iter()
					.filter(|record| filter.map_or(true, |filter| filter.matches(record)))
					.cloned()
					.collect()
			})
			.unwrap_or_default())
	}

	async fn insert(&self, scope: &Scope, table: &Table, record: Record) -> Result<(), Error> {
		self.writes.fetch_add(1, Ordering::AcqRel);

		let mut tables = self.tables.write().await;
		let records = tables.entry((scope.clone(), table.name)).or_default();

		if let Some(existing) = records
			.iter_mut()
			.find(|existing| same_primary_key(table, existing, &record))
		{
			trace!(%scope, table = table.name, "Replacing record with same primary key");
			*existing = record;
		} else {
			records.push(record);
		}

		Ok(())
	}

	async fn delete(&self, scope: &Scope, table: &Table, filter: &Filter) -> Result<usize, Error> {
		self.writes.fetch_add(1, Ordering::AcqRel);

		let mut tables = self.tables.write().await;
		let Some(records) = tables.get_mut(&(scope.clone(), table.name)) else {
			return Ok(0);
		};

		let before = records.len();
		records.retain(|record| !filter.matches(record));

		Ok(before - records.len())
	}
}
