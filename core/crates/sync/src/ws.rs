use thiserror::Error;

/// Failure of a remote web service call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WsError {
	#[error("the device is offline")]
	Offline,
	#[error("request didn't reach the server: {0}")]
	Transport(String),
	/// The server processed the request and refused it
	#[error("web service exception <errorcode='{errorcode}'>: {message}")]
	Exception { errorcode: String, message: String },
}

/// How a reconciliation must react to a [`WsError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Keep the offline data and try again later
	Connectivity,
	/// Discard the offending entries and report a warning
	ServerRejection,
	/// Discard everything queued for the entity and report a warning
	EntityGone,
}

/// What a failed request was about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	/// Fetching the entity (activity, course) the offline data belongs to
	Entity,
	/// Sending or checking a single queued entry
	Entry,
}

impl WsError {
	pub fn exception(errorcode: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Exception {
			errorcode: errorcode.into(),
			message: message.into(),
		}
	}

	/// Whether the server answered, as opposed to a request that never got a response
	#[must_use]
	pub const fn is_web_service_error(&self) -> bool {
		matches!(self, Self::Exception { .. })
	}

	#[must_use]
	pub const fn classify(&self, stage: Stage) -> ErrorKind {
		match (self, stage) {
			(Self::Offline | Self::Transport(_), _) => ErrorKind::Connectivity,
			(Self::Exception { .. }, Stage::Entity) => ErrorKind::EntityGone,
			(Self::Exception { .. }, Stage::Entry) => ErrorKind::ServerRejection,
		}
	}
}

/// Where remote reads may be served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingStrategy {
	/// Cached response when available, network otherwise
	#[default]
	PreferCache,
	/// Network when online, cached response as a fallback
	PreferNetwork,
	/// Always hit the network, needed whenever stale data would lead to wrong decisions
	OnlyNetwork,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exceptions_depend_on_stage() {
		let exception = WsError::exception("invalidrecord", "Can't find data record in database");

		assert_eq!(exception.classify(Stage::Entity), ErrorKind::EntityGone);
		assert_eq!(exception.classify(Stage::Entry), ErrorKind::ServerRejection);
		assert!(exception.is_web_service_error());

		for error in [WsError::Offline, WsError::Transport("timeout".into())] {
			assert_eq!(error.classify(Stage::Entity), ErrorKind::Connectivity);
			assert_eq!(error.classify(Stage::Entry), ErrorKind::Connectivity);
			assert!(!error.is_web_service_error());
		}
	}
}
