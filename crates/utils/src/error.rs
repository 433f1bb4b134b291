use std::fmt::Display;

use tracing::error;

/// Reports an error with tracing, `msg` giving context to the failure
pub fn report_error_with_msg(res: &Result<(), impl Display>, msg: &str) {
	if let Err(e) = res {
		error!("{msg}: {e:#}");
	}
}
