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

use std::time::Duration;

use chrono::Utc;

pub mod error;

/// Current wall clock time as milliseconds since the unix epoch
#[must_use]
pub fn now_millis() -> i64 {
	Utc::now().timestamp_millis()
}

/// Current wall clock time as seconds since the unix epoch, the unit used by the web services
#[must_use]
pub fn now_secs() -> i64 {
	Utc::now().timestamp()
}

/// Milliseconds until `target_millis`, clamped to zero if it is already in the past
#[must_use]
pub fn millis_until(target_millis: i64) -> Duration {
	Duration::from_millis(u64::try_from(target_millis - now_millis()).unwrap_or(0))
}

/// Converts a duration to the `i64` milliseconds used by stored timestamps
#[must_use]
pub fn duration_to_millis(duration: Duration) -> i64 {
	i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn millis_until_clamps_past_targets() {
		assert_eq!(millis_until(0), Duration::ZERO);
		assert!(millis_until(now_millis() + 60_000) > Duration::from_secs(50));
	}
}
