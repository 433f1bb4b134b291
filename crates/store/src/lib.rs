//!
//! # Store
//!
//! Record storage used by the scheduler and the sync coordinators. Records are JSON objects kept in
//! named tables, and every table lives either in the app wide scope or inside a site's scope, so two
//! sites never see each other's offline data.
//!
//! The actual storage engine is pluggable through [`PersistentStore`], the rest of the workspace only
//! talks to the typed [`Store`] handle.

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

use std::{fmt, sync::Arc};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

mod error;
mod memory;

pub use error::Error;
pub use memory::MemoryStore;

pub type Record = Map<String, Value>;

/// Identifier of a site (one LMS account) the app is logged into
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SiteId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SiteId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl From<String> for SiteId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

/// Namespace a table belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
	App,
	Site(SiteId),
}

impl From<&SiteId> for Scope {
	fn from(site_id: &SiteId) -> Self {
		Self::Site(site_id.clone())
	}
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::App => f.write_str("app"),
			Self::Site(site_id) => write!(f, "site:{site_id}"),
		}
	}
}

/// Static description of a table, inserting a record with an existing primary key replaces it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
	pub name: &'static str,
	pub primary_key: &'static [&'static str],
}

/// Conjunction of equality conditions over record fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Vec<(&'static str, Value)>);

impl Filter {
	#[must_use]
	pub const fn new() -> Self {
		Self(Vec::new())
	}

	#[must_use]
	pub fn eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
		self.0.push((field, value.into()));
		self
	}

	#[must_use]
	pub fn matches(&self, record: &Record) -> bool {
		self.0
			.iter()
			.all(|(field, value)| record.get(*field).unwrap_or(&Value::Null) == value)
	}

	pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.0.iter().map(|(field, _)| *field)
	}
}

/// Storage engine contract, every call is scoped to the app or to a single site
#[async_trait::async_trait]
pub trait PersistentStore: Send + Sync + 'static {
	/// First record of `table` matching `key`, usually the primary key fields
	async fn get(&self, scope: &Scope, table: &Table, key: &Filter)
		-> Result<Option<Record>, Error>;

	/// Every record of `table` matching `filter`, in insertion order
	async fn get_all(
		&self,
		scope: &Scope,
		table: &Table,
		filter: Option<&Filter>,
	) -> Result<Vec<Record>, Error>;

	/// Inserts `record`, replacing any record with the same primary key
	async fn insert(&self, scope: &Scope, table: &Table, record: Record) -> Result<(), Error>;

	/// Deletes every record matching `filter`, returning how many were removed
	async fn delete(&self, scope: &Scope, table: &Table, filter: &Filter) -> Result<usize, Error>;
}

/// Typed handle over a [`PersistentStore`] backend, cheap to clone
#[derive(Clone)]
pub struct Store(Arc<dyn PersistentStore>);

impl fmt::Debug for Store {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Store").finish()
	}
}

impl Store {
	pub fn new(backend: impl PersistentStore) -> Self {
		Self(Arc::new(backend))
	}

	#[must_use]
	pub fn from_arc(backend: Arc<dyn PersistentStore>) -> Self {
		Self(backend)
	}

	#[must_use]
	pub fn in_memory() -> Self {
		Self::new(MemoryStore::default())
	}

	pub async fn get<T: DeserializeOwned>(
		&self,
		scope: &Scope,
		table: &Table,
		key: &Filter,
	) -> Result<Option<T>, Error> {
		self.0
			.get(scope, table, key)
			.await?
			.map(|record| from_record(table, record))
			.transpose()
	}

	pub async fn get_all<T: DeserializeOwned>(
		&self,
		scope: &Scope,
		table: &Table,
		filter: Option<&Filter>,
	) -> Result<Vec<T>, Error> {
		self.0
			.get_all(scope, table, filter)
			.await?
			.into_iter()
			.map(|record| from_record(table, record))
			.collect()
	}

	pub async fn insert<T: Serialize + Sync>(
		&self,
		scope: &Scope,
		table: &Table,
		value: &T,
	) -> Result<(), Error> {
		let record = to_record(table, value)?;

		self.0.insert(scope, table, record).await
	}

	pub async fn delete(&self, scope: &Scope, table: &Table, filter: &Filter) -> Result<usize, Error> {
		self.0.delete(scope, table, filter).await
	}
}

fn to_record<T: Serialize>(table: &Table, value: &T) -> Result<Record, Error> {
	match serde_json::to_value(value).map_err(|e| Error::Serialization(table.name, e))? {
		Value::Object(record) => {
			if let Some(field) = table
				.primary_key
				.iter()
				.find(|field| !record.contains_key(**field))
			{
				return Err(Error::MissingPrimaryKey {
					table: table.name,
					field,
				});
			}

			Ok(record)
		}
		_ => Err(Error::NotAnObject(table.name)),
	}
}

fn from_record<T: DeserializeOwned>(table: &Table, record: Record) -> Result<T, Error> {
	serde_json::from_value(Value::Object(record)).map_err(|e| Error::Deserialization(table.name, e))
}
