//! Network connectivity as seen by the background processes.
//!
//! The platform layer pushes connection changes into a [`NetworkStatus`], everything else only reads
//! it through [`NetworkMonitor`] or waits for reconnections with [`Reconnections`].

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

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connection {
	None,
	/// Cellular and other connections the user may not want to spend on background sync
	Metered,
	/// Wifi, ethernet
	Unmetered,
}

impl Connection {
	#[must_use]
	pub const fn is_online(self) -> bool {
		!matches!(self, Self::None)
	}
}

pub trait NetworkMonitor: Send + Sync + 'static {
	fn is_online(&self) -> bool;

	fn is_metered(&self) -> bool;

	fn reconnections(&self) -> Reconnections;
}

/// Shared, observable connection state
#[derive(Debug, Clone)]
pub struct NetworkStatus {
	tx: Arc<watch::Sender<Connection>>,
	reconnect_tx: broadcast::Sender<Connection>,
}

impl NetworkStatus {
	#[must_use]
	pub fn new(initial: Connection) -> Self {
		let (reconnect_tx, _) = broadcast::channel(16);

		Self {
			tx: Arc::new(watch::Sender::new(initial)),
			reconnect_tx,
		}
	}

	pub fn set(&self, connection: Connection) {
		let mut reconnected = false;

		self.tx.send_if_modified(|current| {
			if *current == connection {
				false
			} else {
				debug!(from = ?*current, to = ?connection, "Network connection changed");
				reconnected = !current.is_online() && connection.is_online();
				*current = connection;
				true
			}
		});

		if reconnected {
			// Nobody listening is fine, reconnections are only interesting to running watchers
			let _ = self.reconnect_tx.send(connection);
		}
	}

	#[must_use]
	pub fn connection(&self) -> Connection {
		*self.tx.borrow()
	}

	/// Receiver of every connection state, the latest value is always available
	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<Connection> {
		self.tx.subscribe()
	}
}

impl Default for NetworkStatus {
	fn default() -> Self {
		Self::new(Connection::Unmetered)
	}
}

impl NetworkMonitor for NetworkStatus {
	fn is_online(&self) -> bool {
		self.connection().is_online()
	}

	fn is_metered(&self) -> bool {
		matches!(self.connection(), Connection::Metered)
	}

	fn reconnections(&self) -> Reconnections {
		Reconnections {
			rx: self.reconnect_tx.subscribe(),
			state: self.tx.subscribe(),
		}
	}
}

/// Yields every time the connection goes from offline to online
#[derive(Debug)]
pub struct Reconnections {
	rx: broadcast::Receiver<Connection>,
	state: watch::Receiver<Connection>,
}

impl Reconnections {
	/// Waits for the next reconnection, `None` once the [`NetworkStatus`] is gone
	pub async fn next(&mut self) -> Option<Connection> {
		match self.rx.recv().await {
			Ok(connection) => Some(connection),
			Err(broadcast::error::RecvError::Lagged(skipped)) => {
				warn!(%skipped, "Reconnection listener lagged behind");
				Some(*self.state.borrow())
			}
			Err(broadcast::error::RecvError::Closed) => None,
		}
	}
}
