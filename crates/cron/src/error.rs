use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("cron task not registered <name='{0}'>")]
	InvalidTask(String),
	#[error("cron task <name='{0}'> can't run because the device is not connected to the internet")]
	Offline(String),
	#[error("cron task <name='{0}'> can't run on a limited (metered) connection")]
	MeteredConnection(String),
	#[error("cron task <name='{name}'> failed: {reason:#}")]
	Handler { name: String, reason: anyhow::Error },
	#[error("cron task <name='{0}'> panicked")]
	Panicked(String),
}
