use lms_core_sync::{ReadingStrategy, WsError};
use lms_store::SiteId;

use serde::{Deserialize, Serialize};

/// H5P activity as returned by the activity listing web services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct H5PActivity {
	pub id: u64,
	pub course: u64,
	pub context: u64,
	pub coursemodule: u64,
	pub name: String,
}

/// Attempt of the current user, times are in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
	pub id: u64,
	pub attempt: u32,
	pub time_created: i64,
	pub time_modified: i64,
}

/// Most recently created attempt
#[must_use]
pub fn last_attempt(attempts: &[Attempt]) -> Option<&Attempt> {
	attempts.iter().max_by_key(|attempt| attempt.time_created)
}

/// Identifies an xAPI state document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateRef {
	pub component: String,
	pub activity_id: String,
	/// Serialized xAPI agent
	pub agent: String,
	pub state_id: String,
	pub registration: Option<String>,
}

/// Remote operations needed to deliver xAPI data
#[async_trait::async_trait]
pub trait XapiApi: Send + Sync + 'static {
	async fn get_activity_by_context(
		&self,
		site_id: &SiteId,
		course_id: u64,
		context_id: u64,
		strategy: ReadingStrategy,
	) -> Result<H5PActivity, WsError>;

	/// Sends the queued "activity viewed" logs of the activity
	async fn sync_activity_logs(&self, site_id: &SiteId, activity: &H5PActivity) -> Result<(), WsError>;

	async fn get_user_attempts(
		&self,
		site_id: &SiteId,
		activity_id: u64,
		strategy: ReadingStrategy,
	) -> Result<Vec<Attempt>, WsError>;

	async fn invalidate_user_attempts(&self, site_id: &SiteId, activity_id: u64) -> Result<(), WsError>;

	/// `statements` is the serialized JSON array
	async fn post_statements(&self, site_id: &SiteId, component: &str, statements: &str) -> Result<(), WsError>;

	async fn post_state(&self, site_id: &SiteId, state: &StateRef, state_data: &str) -> Result<(), WsError>;

	async fn delete_state(&self, site_id: &SiteId, state: &StateRef) -> Result<(), WsError>;

	/// Ids of the states of the activity and agent modified at or after `since`, in seconds
	async fn get_state_ids_since(
		&self,
		site_id: &SiteId,
		state: &StateRef,
		since: i64,
	) -> Result<Vec<String>, WsError>;
}
