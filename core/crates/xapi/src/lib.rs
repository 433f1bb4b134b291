//!
//! # xAPI
//!
//! Statements and states produced by H5P activities. They're sent right away when possible and
//! queued otherwise; [`H5PActivitySync`] delivers the queue later, activity context by activity
//! context, discarding what the server will never accept.

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

pub mod api;
pub mod offline;
mod service;
mod sync;

pub use api::{Attempt, H5PActivity, StateRef, XapiApi};
pub use offline::{OfflineOptions, StateEntry, StatementsEntry, XapiOffline};
pub use service::{PostOptions, XapiService};
pub use sync::H5PActivitySync;

pub const COMPONENT: &str = "mod_h5pactivity";

/// Triggered per site when the cron synchronization sent or discarded offline data
pub const AUTO_SYNCED_EVENT: &str = "h5pactivity_auto_synced";

/// Name of the cron task synchronizing H5P activities
pub const SYNC_TASK_NAME: &str = "H5PActivitySyncHandler";

/// Coordinator of the H5P activities offline data
pub type H5PActivitySyncCoordinator = lms_core_sync::SyncCoordinator<H5PActivitySync>;
