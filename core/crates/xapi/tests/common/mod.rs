#![allow(dead_code)]

use lms_core_sync::{ReadingStrategy, SiteList, SyncBlocker, SyncContext, WsError};
use lms_core_xapi::{
	Attempt, H5PActivity, H5PActivitySync, H5PActivitySyncCoordinator, OfflineOptions, StateRef,
	XapiApi, XapiOffline, XapiService,
};
use lms_events::EventBus;
use lms_network::NetworkStatus;
use lms_store::{SiteId, Store};

use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
	time::Duration,
};

pub const SITE: &str = "site";
pub const CONTEXT_ID: u64 = 55;
pub const COURSE_ID: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
	GetActivity { course_id: u64, context_id: u64 },
	SyncLogs(u64),
	GetAttempts(u64),
	InvalidateAttempts(u64),
	PostStatements(String),
	PostState { state_id: String, data: String },
	DeleteState(String),
	GetStateIds { state_id: String, since: i64 },
}

/// Remote API double recording every call, failures are scripted per payload or state id
pub struct MockXapiApi {
	calls: Mutex<Vec<Call>>,
	pub activity: Mutex<Result<H5PActivity, WsError>>,
	pub attempts: Mutex<Result<Vec<Attempt>, WsError>>,
	pub statement_errors: Mutex<HashMap<String, WsError>>,
	pub state_errors: Mutex<HashMap<String, WsError>>,
	pub state_ids_error: Mutex<Option<WsError>>,
	pub remote_state_ids: Mutex<Vec<String>>,
}

impl Default for MockXapiApi {
	fn default() -> Self {
		Self {
			calls: Mutex::default(),
			activity: Mutex::new(Ok(activity())),
			attempts: Mutex::new(Ok(vec![])),
			statement_errors: Mutex::default(),
			state_errors: Mutex::default(),
			state_ids_error: Mutex::default(),
			remote_state_ids: Mutex::default(),
		}
	}
}

impl MockXapiApi {
	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().unwrap().clone()
	}

	pub fn position(&self, matches: impl Fn(&Call) -> bool) -> Option<usize> {
		self.calls().iter().position(matches)
	}

	pub fn posted_statements(&self) -> Vec<String> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				Call::PostStatements(statements) => Some(statements),
				_ => None,
			})
			.collect()
	}

	pub fn fail_statements(&self, statements: &str, error: WsError) {
		self.statement_errors
			.lock()
			.unwrap()
			.insert(statements.to_string(), error);
	}

	pub fn fail_state(&self, state_id: &str, error: WsError) {
		self.state_errors
			.lock()
			.unwrap()
			.insert(state_id.to_string(), error);
	}

	fn record(&self, call: Call) {
		self.calls.lock().unwrap().push(call);
	}
}

#[async_trait::async_trait]
impl XapiApi for MockXapiApi {
	async fn get_activity_by_context(
		&self,
		_site_id: &SiteId,
		course_id: u64,
		context_id: u64,
		_strategy: ReadingStrategy,
	) -> Result<H5PActivity, WsError> {
		self.record(Call::GetActivity {
			course_id,
			context_id,
		});
		self.activity.lock().unwrap().clone()
	}

	async fn sync_activity_logs(&self, _site_id: &SiteId, activity: &H5PActivity) -> Result<(), WsError> {
		self.record(Call::SyncLogs(activity.id));
		Err(WsError::exception("nologs", "Logs are best effort"))
	}

	async fn get_user_attempts(
		&self,
		_site_id: &SiteId,
		activity_id: u64,
		strategy: ReadingStrategy,
	) -> Result<Vec<Attempt>, WsError> {
		assert_eq!(strategy, ReadingStrategy::OnlyNetwork);
		self.record(Call::GetAttempts(activity_id));
		self.attempts.lock().unwrap().clone()
	}

	async fn invalidate_user_attempts(&self, _site_id: &SiteId, activity_id: u64) -> Result<(), WsError> {
		self.record(Call::InvalidateAttempts(activity_id));
		Ok(())
	}

	async fn post_statements(&self, _site_id: &SiteId, _component: &str, statements: &str) -> Result<(), WsError> {
		self.record(Call::PostStatements(statements.to_string()));
		self.statement_errors
			.lock()
			.unwrap()
			.get(statements)
			.cloned()
			.map_or(Ok(()), Err)
	}

	async fn post_state(&self, _site_id: &SiteId, state: &StateRef, state_data: &str) -> Result<(), WsError> {
		self.record(Call::PostState {
			state_id: state.state_id.clone(),
			data: state_data.to_string(),
		});
		self.state_errors
			.lock()
			.unwrap()
			.get(&state.state_id)
			.cloned()
			.map_or(Ok(()), Err)
	}

	async fn delete_state(&self, _site_id: &SiteId, state: &StateRef) -> Result<(), WsError> {
		self.record(Call::DeleteState(state.state_id.clone()));
		self.state_errors
			.lock()
			.unwrap()
			.get(&state.state_id)
			.cloned()
			.map_or(Ok(()), Err)
	}

	async fn get_state_ids_since(
		&self,
		_site_id: &SiteId,
		state: &StateRef,
		since: i64,
	) -> Result<Vec<String>, WsError> {
		self.record(Call::GetStateIds {
			state_id: state.state_id.clone(),
			since,
		});
		if let Some(e) = self.state_ids_error.lock().unwrap().clone() {
			return Err(e);
		}
		Ok(self.remote_state_ids.lock().unwrap().clone())
	}
}

pub fn activity() -> H5PActivity {
	H5PActivity {
		id: 70,
		course: COURSE_ID,
		context: CONTEXT_ID,
		coursemodule: 12,
		name: "Interactive video".into(),
	}
}

pub fn state(state_id: &str) -> StateRef {
	StateRef {
		component: "mod_h5pactivity".into(),
		activity_id: "https://lms.example/xapi/activity/70".into(),
		agent: r#"{"objectType":"Agent","account":{"homePage":"https://lms.example","name":"3"}}"#.into(),
		state_id: state_id.into(),
		registration: None,
	}
}

pub fn with_course() -> OfflineOptions {
	OfflineOptions {
		course_id: Some(COURSE_ID),
		extra: None,
	}
}

pub struct Harness {
	pub api: Arc<MockXapiApi>,
	pub offline: XapiOffline,
	pub coordinator: H5PActivitySyncCoordinator,
	pub service: XapiService,
	pub network: NetworkStatus,
	pub events: EventBus<lms_core_sync::SyncEvent>,
	pub site_id: SiteId,
}

pub fn harness() -> Harness {
	let api = Arc::new(MockXapiApi::default());
	let store = Store::in_memory();
	let network = NetworkStatus::default();
	let events = EventBus::new();

	let ctx = SyncContext {
		store: store.clone(),
		network: Arc::new(network.clone()),
		sites: Arc::new(SiteList::new([SiteId::from(SITE)])),
		events: events.clone(),
		blocker: SyncBlocker::default(),
	};

	let offline = XapiOffline::new(store);
	let dyn_api: Arc<dyn XapiApi> = Arc::clone(&api) as _;

	Harness {
		coordinator: H5PActivitySyncCoordinator::new(
			H5PActivitySync::new(Arc::clone(&dyn_api), offline.clone()),
			ctx.clone(),
			Duration::from_secs(300),
		),
		service: XapiService::new(dyn_api, offline.clone(), &ctx),
		api,
		offline,
		network,
		events,
		site_id: SiteId::from(SITE),
	}
}
