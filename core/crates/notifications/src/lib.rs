//! Notifications read state, kept offline until it can be sent.

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

mod api;
pub mod offline;
mod service;
mod sync;

pub use api::NotificationsApi;
pub use offline::{NotificationsOffline, PendingReads, ReadStateEntry};
pub use service::NotificationsService;
pub use sync::NotificationsSync;

pub const COMPONENT: &str = "notifications";

pub const AUTO_SYNCED_EVENT: &str = "notifications_auto_synced";

pub const SYNC_TASK_NAME: &str = "NotificationsSyncHandler";

pub type NotificationsSyncCoordinator = lms_core_sync::SyncCoordinator<NotificationsSync>;
