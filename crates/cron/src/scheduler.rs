use lms_config::{CronConfig, Platform, Settings};
use lms_network::NetworkMonitor;
use lms_store::{Filter, Scope, SiteId, Store, Table};
use lms_utils::{duration_to_millis, error::report_error_with_msg, millis_until, now_millis};

use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc, Mutex, MutexGuard, PoisonError,
	},
	time::Duration,
};

use futures::{future::BoxFuture, FutureExt};
use futures_concurrency::future::Join;
use serde::{Deserialize, Serialize};
use tokio::{spawn, task::JoinHandle, time::timeout};
use tracing::{debug, error, instrument, trace, warn, Instrument};

use super::{
	error::Error,
	task::CronTask,
};

/// App wide table holding the last successful execution of every task
pub const CRON_TABLE: Table = Table {
	name: "cron",
	primary_key: &["id"],
};

#[derive(Debug, Serialize, Deserialize)]
struct LastExecutionEntry {
	id: String,
	value: i64,
}

fn last_execution_id(name: &str) -> String {
	format!("last_execution_{name}")
}

struct PendingTimer {
	id: u64,
	delay: Duration,
	handle: JoinHandle<()>,
}

struct TaskEntry {
	task: Arc<CronTask>,
	running: bool,
	pending: Option<PendingTimer>,
}

struct Inner {
	tasks: Mutex<HashMap<String, TaskEntry>>,
	run_queue: tokio::sync::Mutex<()>,
	next_timer_id: AtomicU64,
	network_watcher: Mutex<Option<JoinHandle<()>>>,
	store: Store,
	network: Arc<dyn NetworkMonitor>,
	settings: Settings,
	config: CronConfig,
	min_interval: Duration,
}

/// Registry and scheduler of the [`CronTask`]s, cheap to clone
#[derive(Clone)]
pub struct Scheduler {
	inner: Arc<Inner>,
}

impl std::fmt::Debug for Scheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Scheduler")
			.field("tasks", &self.task_names())
			.finish_non_exhaustive()
	}
}

impl Scheduler {
	pub fn new(
		store: Store,
		network: Arc<dyn NetworkMonitor>,
		settings: Settings,
		config: CronConfig,
		platform: Platform,
	) -> Self {
		let min_interval = config.min_interval(platform);

		Self {
			inner: Arc::new(Inner {
				tasks: Mutex::default(),
				run_queue: tokio::sync::Mutex::new(()),
				next_timer_id: AtomicU64::new(0),
				network_watcher: Mutex::default(),
				store,
				network,
				settings,
				config,
				min_interval,
			}),
		}
	}

	/// Registers a task and starts running it periodically, registering a name twice does nothing
	#[instrument(skip_all, fields(task = %task.name()))]
	pub async fn register(&self, task: CronTask) {
		let name = task.name().to_string();

		{
			let mut tasks = self.inner.lock_tasks();
			if tasks.contains_key(&name) {
				warn!("Cron task is already registered");
				return;
			}

			debug!("Registering cron task");

			tasks.insert(
				name.clone(),
				TaskEntry {
					task: Arc::new(task),
					running: false,
					pending: None,
				},
			);
		}

		self.inner.start_task(&name).await;
	}

	/// Executes a task right away, ignoring its schedule and the metered connection restriction.
	///
	/// The execution still goes through the run queue and still needs a connection if the task
	/// uses the network. Failures of the task itself are logged, not returned.
	#[instrument(skip(self))]
	pub async fn force_execution(&self, name: &str, site_id: Option<SiteId>) -> Result<(), Error> {
		{
			let mut tasks = self.inner.lock_tasks();
			let entry = tasks
				.get_mut(name)
				.ok_or_else(|| Error::InvalidTask(name.to_string()))?;

			// Mark the task as running, it might be running already
			entry.running = true;

			if let Some(pending) = entry.pending.take() {
				pending.handle.abort();
			}
		}

		if let Err(e) = self.inner.check_and_execute(name, true, site_id).await {
			debug!(?e, "Forced cron task execution didn't succeed");
		}

		Ok(())
	}

	/// Forces every task that allows manual triggering, see [`Scheduler::force_execution`]
	#[instrument(skip(self))]
	pub async fn force_sync_execution(&self, site_id: Option<SiteId>) {
		let names = {
			let tasks = self.inner.lock_tasks();
			tasks
				.iter()
				.filter(|(_, entry)| entry.task.allows_manual_trigger())
				.map(|(name, _)| name.clone())
				.collect::<Vec<_>>()
		};

		names
			.into_iter()
			.map(|name| {
				let site_id = site_id.clone();
				async move {
					report_error_with_msg(
						&self.force_execution(&name, site_id).await,
						"Failed to force cron task execution",
					);
				}
			})
			.collect::<Vec<_>>()
			.join()
			.await;
	}

	/// Starts every task that uses the network, to be called when the connection comes back
	pub async fn start_network_handlers(&self) {
		let names = {
			let tasks = self.inner.lock_tasks();
			tasks
				.iter()
				.filter(|(_, entry)| entry.task.uses_network())
				.map(|(name, _)| name.clone())
				.collect::<Vec<_>>()
		};

		for name in names {
			self.inner.start_task(&name).await;
		}
	}

	/// Spawns a listener restarting the network tasks every time the device reconnects
	pub fn watch_network(&self) {
		let mut reconnections = self.inner.network.reconnections();
		let scheduler = self.clone();

		let handle = spawn(async move {
			while reconnections.next().await.is_some() {
				debug!("Connection restored, starting network cron tasks");
				scheduler.start_network_handlers().await;
			}
		});

		if let Some(previous) = self
			.inner
			.network_watcher
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.replace(handle)
		{
			previous.abort();
		}
	}

	/// Cancels every pending execution and the network listener, running executions finish
	pub fn shutdown(&self) {
		if let Some(watcher) = self
			.inner
			.network_watcher
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take()
		{
			watcher.abort();
		}

		for entry in self.inner.lock_tasks().values_mut() {
			entry.running = false;
			if let Some(pending) = entry.pending.take() {
				pending.handle.abort();
			}
		}
	}

	#[must_use]
	pub fn has_sync_handlers(&self) -> bool {
		self.inner
			.lock_tasks()
			.values()
			.any(|entry| entry.task.is_sync())
	}

	#[must_use]
	pub fn has_manual_sync_handlers(&self) -> bool {
		self.inner
			.lock_tasks()
			.values()
			.any(|entry| entry.task.allows_manual_trigger())
	}

	#[must_use]
	pub fn is_running(&self, name: &str) -> bool {
		self.inner
			.lock_tasks()
			.get(name)
			.is_some_and(|entry| entry.running)
	}

	/// Delay the currently pending execution of a task was scheduled with
	#[must_use]
	pub fn pending_delay(&self, name: &str) -> Option<Duration> {
		self.inner
			.lock_tasks()
			.get(name)
			.and_then(|entry| entry.pending.as_ref().map(|pending| pending.delay))
	}

	#[must_use]
	pub fn task_names(&self) -> Vec<String> {
		let mut names = self.inner.lock_tasks().keys().cloned().collect::<Vec<_>>();
		names.sort();
		names
	}

	/// Last successful execution of a task in milliseconds since the epoch, 0 if it never ran
	pub async fn last_execution_time(&self, name: &str) -> i64 {
		self.inner.last_execution_time(name).await
	}
}

impl Inner {
	fn lock_tasks(&self) -> MutexGuard<'_, HashMap<String, TaskEntry>> {
		self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
	}

	async fn start_task(self: &Arc<Self>, name: &str) {
		{
			let mut tasks = self.lock_tasks();
			let Some(entry) = tasks.get_mut(name) else {
				debug!(task = %name, "Cannot start cron task, it is invalid");
				return;
			};

			if entry.running {
				trace!(task = %name, "Cron task is already running");
				return;
			}

			entry.running = true;
		}

		self.schedule_next_execution(name, None).await;
	}

	fn stop_task(&self, name: &str) {
		let mut tasks = self.lock_tasks();
		let Some(entry) = tasks.get_mut(name) else {
			debug!(task = %name, "Cannot stop cron task, it is invalid");
			return;
		};

		if !entry.running {
			debug!(task = %name, "Cannot stop cron task, it's not running");
			return;
		}

		entry.running = false;
		if let Some(pending) = entry.pending.take() {
			pending.handle.abort();
		}
	}

	/// Checks the conditions to run a task and enqueues its execution.
	///
	/// Whatever the outcome, the next execution gets scheduled except when we're offline, then the
	/// task is stopped until the connection comes back.
	async fn check_and_execute(
		self: &Arc<Self>,
		name: &str,
		force: bool,
		site_id: Option<SiteId>,
	) -> Result<(), Error> {
		let task = self
			.lock_tasks()
			.get(name)
			.map(|entry| Arc::clone(&entry.task))
			.ok_or_else(|| {
				debug!(task = %name, "Cannot execute cron task because it is invalid");
				Error::InvalidTask(name.to_string())
			})?;

		if task.uses_network() && !self.network.is_online() {
			debug!(task = %name, "Cron task can't run because the device is not connected to the internet");
			self.stop_task(name);

			return Err(Error::Offline(name.to_string()));
		}

		if !force
			&& task.is_sync()
			&& self.settings.sync_only_on_wifi()
			&& self.network.is_metered()
		{
			debug!(task = %name, "Cron task can't run because the device has a limited internet connection");
			self.schedule_next_execution(name, Some(self.config.retry_interval()))
				.await;

			return Err(Error::MeteredConnection(name.to_string()));
		}

		let _queue = self.run_queue.lock().await;

		match self.execute(&task, force, site_id).await {
			Ok(()) => {
				debug!(task = %name, "Cron task was successfully executed");

				report_error_with_msg(
					&self.set_last_execution_time(name, now_millis()).await,
					"Failed to store cron task last execution time",
				);

				self.schedule_next_execution(name, None).await;

				Ok(())
			}
			Err(e) => {
				error!(task = %name, ?e, "Cron task failed, will retry soon");

				self.schedule_next_execution(name, Some(self.config.retry_interval()))
					.await;

				Err(e)
			}
		}
	}

	/// Runs the task body, giving up waiting for it after the max process time.
	///
	/// The body is spawned, so it keeps running after we stop waiting on it and its side effects
	/// still happen. Reaching the max time counts as a success, we don't want to retry soon.
	async fn execute(&self, task: &CronTask, force: bool, site_id: Option<SiteId>) -> Result<(), Error> {
		debug!(task = %task.name(), "Executing cron task");

		let handler = task.handler();
		let handle = spawn(async move { handler.execute(site_id, force).await }.in_current_span());

		match timeout(self.config.max_time_process(), handle).await {
			Ok(Ok(res)) => res.map_err(|reason| Error::Handler {
				name: task.name().to_string(),
				reason,
			}),
			Ok(Err(e)) => {
				error!(task = %task.name(), ?e, "Cron task execution panicked");
				Err(Error::Panicked(task.name().to_string()))
			}
			Err(_) => {
				debug!(task = %task.name(), "Resolving execution of cron task because it took too long");
				Ok(())
			}
		}
	}

	fn task_interval(&self, task: &CronTask) -> Duration {
		task.interval()
			.filter(|interval| !interval.is_zero())
			.unwrap_or_else(|| self.config.default_interval())
			.max(self.min_interval)
	}

	async fn last_execution_time(&self, name: &str) -> i64 {
		match self
			.store
			.get::<LastExecutionEntry>(
				&Scope::App,
				&CRON_TABLE,
				&Filter::new().eq("id", last_execution_id(name)),
			)
			.await
		{
			Ok(Some(entry)) => entry.value,
			Ok(None) => 0,
			Err(e) => {
				warn!(task = %name, ?e, "Failed to read cron task last execution time");
				0
			}
		}
	}

	async fn set_last_execution_time(&self, name: &str, time: i64) -> Result<(), lms_store::Error> {
		self.store
			.insert(
				&Scope::App,
				&CRON_TABLE,
				&LastExecutionEntry {
					id: last_execution_id(name),
					value: time,
				},
			)
			.await
	}

	/// Schedules the next execution of a running task, only one can be pending at a time.
	///
	/// Without an explicit `delay` it's computed from the last execution and the task interval.
	async fn schedule_next_execution(self: &Arc<Self>, name: &str, delay: Option<Duration>) {
		let task = {
			let tasks = self.lock_tasks();
			match tasks.get(name) {
				Some(entry) if entry.running && entry.pending.is_none() => Arc::clone(&entry.task),
				_ => return,
			}
		};

		let delay = match delay {
			Some(delay) => delay,
			None => {
				let last_execution = self.last_execution_time(name).await;
				millis_until(last_execution + duration_to_millis(self.task_interval(&task)))
			}
		};

		let mut tasks = self.lock_tasks();
		let Some(entry) = tasks.get_mut(name) else {
			return;
		};

		// Stopped, or scheduled by someone else, while we were reading the last execution
		if !entry.running || entry.pending.is_some() {
			return;
		}

		debug!(task = %name, delay_ms = delay.as_millis(), "Scheduling next execution of cron task");

		let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);

		entry.pending = Some(PendingTimer {
			id,
			delay,
			handle: spawn(fire(Arc::clone(self), name.to_string(), id, delay)),
		});
	}
}

fn fire(inner: Arc<Inner>, name: String, timer_id: u64, delay: Duration) -> BoxFuture<'static, ()> {
	async move {
		tokio::time::sleep(delay).await;

		{
			let mut tasks = inner.lock_tasks();
			match tasks.get_mut(&name) {
				Some(entry)
					if entry
						.pending
						.as_ref()
						.is_some_and(|pending| pending.id == timer_id) =>
				{
					entry.pending = None;
				}
				_ => return,
			}
		}

		if let Err(e) = inner.check_and_execute(&name, false, None).await {
			trace!(task = %name, ?e, "Scheduled cron task execution didn't succeed");
		}
	}
	.boxed()
}
