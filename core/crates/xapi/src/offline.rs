use lms_core_sync::{OfflineEntry, OfflineQueue};
use lms_store::{Filter, SiteId, Store, Table};
use lms_utils::now_secs;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::api::StateRef;

pub const STATEMENTS_TABLE: Table = Table {
	name: "core_xapi_statements",
	primary_key: &["id"],
};

pub const STATES_TABLE: Table = Table {
	name: "core_xapi_state",
	primary_key: &["id"],
};

/// A batch of statements that couldn't be sent, always sent as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementsEntry {
	pub id: Uuid,
	pub context_id: u64,
	pub component: String,
	/// Serialized JSON array of statements
	pub statements: String,
	pub time_created: i64,
	pub course_id: Option<u64>,
	pub extra: Option<String>,
}

impl OfflineEntry for StatementsEntry {
	type Key = u64;

	const TABLE: Table = STATEMENTS_TABLE;
	const KEY_FIELD: &'static str = "context_id";

	fn key(&self) -> u64 {
		self.context_id
	}

	fn time_created(&self) -> i64 {
		self.time_created
	}
}

/// Latest offline edit of a state document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
	pub id: Uuid,
	pub context_id: u64,
	pub component: String,
	pub activity_id: String,
	pub agent: String,
	pub state_id: String,
	pub registration: Option<String>,
	/// `None` when the state was deleted
	pub state_data: Option<String>,
	pub time_created: i64,
	pub time_modified: i64,
	pub course_id: Option<u64>,
	pub extra: Option<String>,
}

impl StateEntry {
	#[must_use]
	pub const fn is_deletion(&self) -> bool {
		self.state_data.is_none()
	}

	#[must_use]
	pub fn state_ref(&self) -> StateRef {
		StateRef {
			component: self.component.clone(),
			activity_id: self.activity_id.clone(),
			agent: self.agent.clone(),
			state_id: self.state_id.clone(),
			registration: self.registration.clone(),
		}
	}
}

impl OfflineEntry for StateEntry {
	type Key = u64;

	const TABLE: Table = STATES_TABLE;
	const KEY_FIELD: &'static str = "context_id";

	fn key(&self) -> u64 {
		self.context_id
	}

	fn time_created(&self) -> i64 {
		self.time_created
	}
}

/// Data stored along with offline entries, the course is needed to find the activity later
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfflineOptions {
	pub course_id: Option<u64>,
	pub extra: Option<String>,
}

/// Offline queues of xAPI statements and states
#[derive(Debug, Clone)]
pub struct XapiOffline {
	statements: OfflineQueue<StatementsEntry>,
	states: OfflineQueue<StateEntry>,
}

impl XapiOffline {
	#[must_use]
	pub fn new(store: Store) -> Self {
		Self {
			statements: OfflineQueue::new(store.clone()),
			states: OfflineQueue::new(store),
		}
	}

	pub async fn save_statements(
		&self,
		site_id: &SiteId,
		context_id: u64,
		component: &str,
		statements: &str,
		options: OfflineOptions,
	) -> Result<StatementsEntry, lms_store::Error> {
		let entry = StatementsEntry {
			id: Uuid::new_v4(),
			context_id,
			component: component.to_string(),
			statements: statements.to_string(),
			time_created: now_secs(),
			course_id: options.course_id,
			extra: options.extra,
		};

		self.statements.enqueue(site_id, &entry).await?;

		Ok(entry)
	}

	/// Queues the new value of a state, replacing any previous offline edit of the same state
	pub async fn save_state(
		&self,
		site_id: &SiteId,
		context_id: u64,
		state: &StateRef,
		state_data: &str,
		options: OfflineOptions,
	) -> Result<StateEntry, lms_store::Error> {
		self.replace_state(site_id, context_id, state, Some(state_data.to_string()), options)
			.await
	}

	/// Queues the deletion of a state, replacing any previous offline edit of the same state
	pub async fn delete_state(
		&self,
		site_id: &SiteId,
		context_id: u64,
		state: &StateRef,
		options: OfflineOptions,
	) -> Result<StateEntry, lms_store::Error> {
		self.replace_state(site_id, context_id, state, None, options)
			.await
	}

	async fn replace_state(
		&self,
		site_id: &SiteId,
		context_id: u64,
		state: &StateRef,
		state_data: Option<String>,
		options: OfflineOptions,
	) -> Result<StateEntry, lms_store::Error> {
		let replaced = self
			.states
			.delete(site_id, &same_state_filter(context_id, state))
			.await?;

		if replaced > 0 {
			debug!(%context_id, state_id = %state.state_id, "Replacing previous offline state");
		}

		let now = now_secs();
		let entry = StateEntry {
			id: Uuid::new_v4(),
			context_id,
			component: state.component.clone(),
			activity_id: state.activity_id.clone(),
			agent: state.agent.clone(),
			state_id: state.state_id.clone(),
			registration: state.registration.clone(),
			state_data,
			time_created: now,
			time_modified: now,
			course_id: options.course_id,
			extra: options.extra,
		};

		self.states.enqueue(site_id, &entry).await?;

		Ok(entry)
	}

	/// Statement batches of the context, oldest first
	pub async fn statements(&self, site_id: &SiteId, context_id: u64) -> Result<Vec<StatementsEntry>, lms_store::Error> {
		self.statements.list_by_key(site_id, &context_id).await
	}

	/// State edits of the context, oldest first
	pub async fn states(&self, site_id: &SiteId, context_id: u64) -> Result<Vec<StateEntry>, lms_store::Error> {
		self.states.list_by_key(site_id, &context_id).await
	}

	pub async fn delete_statements(&self, site_id: &SiteId, id: Uuid) -> Result<(), lms_store::Error> {
		self.statements
			.delete(site_id, &Filter::new().eq("id", id.to_string()))
			.await
			.map(|_| ())
	}

	pub async fn delete_state_entry(&self, site_id: &SiteId, id: Uuid) -> Result<(), lms_store::Error> {
		self.states
			.delete(site_id, &Filter::new().eq("id", id.to_string()))
			.await
			.map(|_| ())
	}

	/// Drops every offline state of a component in the context
	pub async fn delete_states_of_context(
		&self,
		site_id: &SiteId,
		component: &str,
		context_id: u64,
	) -> Result<usize, lms_store::Error> {
		self.states
			.delete(
				site_id,
				&Filter::new()
					.eq("component", component)
					.eq("context_id", context_id),
			)
			.await
	}

	/// Drops everything queued for the context
	pub async fn delete_all(&self, site_id: &SiteId, context_id: u64) -> Result<(), lms_store::Error> {
		self.statements.delete_by_key(site_id, &context_id).await?;
		self.states.delete_by_key(site_id, &context_id).await?;

		Ok(())
	}

	/// Contexts with queued statements or states
	pub async fn context_ids(&self, site_id: &SiteId) -> Result<Vec<u64>, lms_store::Error> {
		let mut context_ids = self.statements.keys(site_id).await?;

		for context_id in self.states.keys(site_id).await? {
			if !context_ids.contains(&context_id) {
				context_ids.push(context_id);
			}
		}

		Ok(context_ids)
	}

	pub async fn has_data(&self, site_id: &SiteId, context_id: u64) -> Result<bool, lms_store::Error> {
		Ok(self.statements.has_entries(site_id, &context_id).await?
			|| self.states.has_entries(site_id, &context_id).await?)
	}
}

fn same_state_filter(context_id: u64, state: &StateRef) -> Filter {
	Filter::new()
		.eq("component", state.component.as_str())
		.eq("context_id", context_id)
		.eq("state_id", state.state_id.as_str())
		.eq("registration", state.registration.clone())
}
