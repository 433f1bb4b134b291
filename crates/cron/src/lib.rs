//!
//! # Cron
//!
//! Periodic background tasks (synchronizations, cleanups) registered by every feature at startup.
//!
//! Each registered [`CronTask`] is executed every certain time, following the last successful
//! execution that is persisted in the app [`Store`](lms_store::Store) so a restart doesn't reset
//! the schedule. Some niceties:
//! - Tasks that use the network are stopped while offline and restarted on reconnection;
//! - Synchronization tasks can be restricted to unmetered connections by the user;
//! - Failed executions are retried after a short fixed delay instead of the full interval;
//! - All executions go through a single FIFO run queue, so two tasks never run at the same time;
//! - A task that takes too long stops blocking the queue but is never cancelled.
//!
//! ## Basic example
//!
//! ```
//! use lms_config::{CronConfig, Platform, Settings};
//! use lms_cron::{CronHandler, CronTask, Scheduler};
//! use lms_network::NetworkStatus;
//! use lms_store::{SiteId, Store};
//!
//! use std::{sync::Arc, time::Duration};
//!
//! struct CleanupHandler;
//!
//! #[async_trait::async_trait]
//! impl CronHandler for CleanupHandler {
//!     async fn execute(&self, _site_id: Option<SiteId>, _force: bool) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let scheduler = Scheduler::new(
//!         Store::in_memory(),
//!         Arc::new(NetworkStatus::default()),
//!         Settings::default(),
//!         CronConfig::default(),
//!         Platform::Mobile,
//!     );
//!
//!     scheduler
//!         .register(
//!             CronTask::new("cleanup", CleanupHandler)
//!                 .with_interval(Duration::from_secs(24 * 3600))
//!                 .with_network(false)
//!                 .with_sync(false),
//!         )
//!         .await;
//!
//!     assert!(scheduler.is_running("cleanup"));
//!
//!     scheduler.shutdown();
//! }
//! ```

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

mod error;
mod scheduler;
mod task;

pub use error::Error;
pub use scheduler::{Scheduler, CRON_TABLE};
pub use task::{CronHandler, CronTask};
