#![allow(dead_code)]

use lms_core_notifications::{
	NotificationsApi, NotificationsOffline, NotificationsService, NotificationsSync,
	NotificationsSyncCoordinator,
};
use lms_core_sync::{SiteList, SyncBlocker, SyncContext, SyncEvent, WsError};
use lms_events::EventBus;
use lms_network::NetworkStatus;
use lms_store::{SiteId, Store};

use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
	time::Duration,
};

pub const SITE: &str = "site";
pub const USER_ID: u64 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
	MarkRead(u64),
	MarkAllRead(u64),
	InvalidateList,
}

#[derive(Default)]
pub struct MockNotificationsApi {
	calls: Mutex<Vec<Call>>,
	pub read_errors: Mutex<HashMap<u64, WsError>>,
	pub mark_all_error: Mutex<Option<WsError>>,
}

impl MockNotificationsApi {
	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().unwrap().clone()
	}

	pub fn fail_read(&self, notification_id: u64, error: WsError) {
		self.read_errors
			.lock()
			.unwrap()
			.insert(notification_id, error);
	}

	fn record(&self, call: Call) {
		self.calls.lock().unwrap().push(call);
	}
}

#[async_trait::async_trait]
impl NotificationsApi for MockNotificationsApi {
	async fn mark_notification_read(
		&self,
		_site_id: &SiteId,
		notification_id: u64,
		_time_read: i64,
	) -> Result<(), WsError> {
		self.record(Call::MarkRead(notification_id));
		self.read_errors
			.lock()
			.unwrap()
			.get(&notification_id)
			.cloned()
			.map_or(Ok(()), Err)
	}

	async fn mark_all_notifications_as_read(&self, _site_id: &SiteId, user_id: u64) -> Result<(), WsError> {
		self.record(Call::MarkAllRead(user_id));
		self.mark_all_error.lock().unwrap().clone().map_or(Ok(()), Err)
	}

	async fn invalidate_notifications_list(&self, _site_id: &SiteId) -> Result<(), WsError> {
		self.record(Call::InvalidateList);
		Ok(())
	}
}

pub struct Harness {
	pub api: Arc<MockNotificationsApi>,
	pub offline: NotificationsOffline,
	pub coordinator: NotificationsSyncCoordinator,
	pub service: NotificationsService,
	pub network: NetworkStatus,
	pub events: EventBus<SyncEvent>,
	pub site_id: SiteId,
}

pub fn harness() -> Harness {
	let api = Arc::new(MockNotificationsApi::default());
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

	let offline = NotificationsOffline::new(store);
	let dyn_api: Arc<dyn NotificationsApi> = Arc::clone(&api) as _;

	Harness {
		coordinator: NotificationsSyncCoordinator::new(
			NotificationsSync::new(Arc::clone(&dyn_api), offline.clone()),
			ctx.clone(),
			Duration::from_secs(300),
		),
		service: NotificationsService::new(dyn_api, offline.clone(), &ctx),
		api,
		offline,
		network,
		events,
		site_id: SiteId::from(SITE),
	}
}
