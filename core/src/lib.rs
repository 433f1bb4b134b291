//! Wires the background scheduler and the offline synchronizations of every feature together.

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

use lms_config::{AppConfig, Settings};
use lms_core_notifications::{
	NotificationsApi, NotificationsOffline, NotificationsService, NotificationsSync,
	NotificationsSyncCoordinator,
};
use lms_core_sync::{SiteList, Sites, SyncBlocker, SyncContext, SyncEvent};
use lms_core_xapi::{H5PActivitySync, H5PActivitySyncCoordinator, XapiApi, XapiOffline, XapiService};
use lms_cron::Scheduler;
use lms_events::EventBus;
use lms_network::NetworkStatus;
use lms_store::{SiteId, Store};

use std::{path::Path, sync::Arc};

use tracing::{info, warn};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
	filter::LevelFilter,
	fmt::{self, Layer},
	prelude::*,
	EnvFilter,
};

pub use lms_config as config;
pub use lms_core_notifications as notifications;
pub use lms_core_sync as sync;
pub use lms_core_xapi as xapi;

#[cfg(debug_assertions)]
const CONSOLE_LOG_FILTER: LevelFilter = LevelFilter::DEBUG;

#[cfg(not(debug_assertions))]
const CONSOLE_LOG_FILTER: LevelFilter = LevelFilter::INFO;

/// Remote web services used by the features, provided by the embedding app
pub struct Apis {
	pub xapi: Arc<dyn XapiApi>,
	pub notifications: Arc<dyn NotificationsApi>,
}

pub struct Node {
	pub config: AppConfig,
	pub store: Store,
	pub network: NetworkStatus,
	pub settings: Settings,
	pub sites: Arc<SiteList>,
	pub events: EventBus<SyncEvent>,
	pub blocker: SyncBlocker,
	pub cron: Scheduler,
	pub xapi: XapiService,
	pub h5p_activity_sync: H5PActivitySyncCoordinator,
	pub notifications: NotificationsService,
	pub notifications_sync: NotificationsSyncCoordinator,
	_log_guard: Option<WorkerGuard>,
}

impl Node {
	pub async fn new(data_dir: impl AsRef<Path>, store: Store, apis: Apis) -> anyhow::Result<Arc<Self>> {
		let config = AppConfig::load_or_create(data_dir.as_ref())?;
		config.ensure_directories()?;

		let _log_guard = Self::init_logger(&config)?;

		let network = NetworkStatus::default();
		let settings = Settings::new(config.preferences.clone());
		let sites = Arc::new(SiteList::default());
		let dyn_sites: Arc<dyn Sites> = sites.clone();
		let events = EventBus::new();
		let blocker = SyncBlocker::default();

		let ctx = SyncContext {
			store: store.clone(),
			network: Arc::new(network.clone()),
			sites: dyn_sites,
			events: events.clone(),
			blocker: blocker.clone(),
		};

		let xapi_offline = XapiOffline::new(store.clone());
		let h5p_activity_sync = H5PActivitySyncCoordinator::new(
			H5PActivitySync::new(Arc::clone(&apis.xapi), xapi_offline.clone()),
			ctx.clone(),
			config.sync.sync_interval(),
		);
		let xapi = XapiService::new(apis.xapi, xapi_offline, &ctx);

		let notifications_offline = NotificationsOffline::new(store.clone());
		let notifications_sync = NotificationsSyncCoordinator::new(
			NotificationsSync::new(Arc::clone(&apis.notifications), notifications_offline.clone()),
			ctx.clone(),
			config.sync.sync_interval(),
		);
		let notifications = NotificationsService::new(apis.notifications, notifications_offline, &ctx);

		let cron = Scheduler::new(
			store.clone(),
			Arc::new(network.clone()),
			settings.clone(),
			config.cron.clone(),
			config.platform,
		);

		cron.register(h5p_activity_sync.cron_task(lms_core_xapi::SYNC_TASK_NAME))
			.await;
		cron.register(notifications_sync.cron_task(lms_core_notifications::SYNC_TASK_NAME))
			.await;
		cron.watch_network();

		info!(platform = ?config.platform, "Node started");

		Ok(Arc::new(Self {
			config,
			store,
			network,
			settings,
			sites,
			events,
			blocker,
			cron,
			xapi,
			h5p_activity_sync,
			notifications,
			notifications_sync,
			_log_guard,
		}))
	}

	/// Logs to the console and to a daily rotated file in the logs directory.
	///
	/// Only the first node of the process installs the subscriber.
	pub fn init_logger(config: &AppConfig) -> anyhow::Result<Option<WorkerGuard>> {
		let (non_blocking, guard) =
			tracing_appender::non_blocking(rolling::daily(config.logs_dir(), "log"));

		let result = tracing_subscriber::registry()
			.with(
				EnvFilter::from_default_env()
					.add_directive("warn".parse()?)
					.add_directive(format!("lms={}", config.log_level).parse()?),
			)
			.with(fmt::layer().with_filter(CONSOLE_LOG_FILTER))
			.with(
				Layer::default()
					.with_writer(non_blocking)
					.with_ansi(false)
					.with_filter(LevelFilter::DEBUG),
			)
			.try_init();

		if let Err(e) = result {
			warn!(%e, "Logger already initialized, keeping the existing one");
			return Ok(None);
		}

		Ok(Some(guard))
	}

	/// Synchronizes every feature now, on one site or on all of them
	pub async fn sync_now(&self, site_id: Option<SiteId>) {
		self.cron.force_sync_execution(site_id).await;
	}

	pub fn shutdown(&self) {
		info!("Shutting down...");
		self.cron.shutdown();
		info!("Shutdown complete.");
	}
}
