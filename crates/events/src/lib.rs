//! Publish/subscribe registry for domain events.
//!
//! Subscribers register for an event name and a key (usually a site id) and only receive events
//! triggered with exactly the same name and key.

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

use std::{
	collections::HashMap,
	fmt,
	sync::{Arc, Mutex, PoisonError},
};

use async_channel as chan;
use tracing::trace;

type SubscriberKey = (&'static str, Option<String>);

pub struct EventBus<E> {
	subscribers: Arc<Mutex<HashMap<SubscriberKey, Vec<chan::Sender<E>>>>>,
}

impl<E> Clone for EventBus<E> {
	fn clone(&self) -> Self {
		Self {
			subscribers: Arc::clone(&self.subscribers),
		}
	}
}

impl<E> Default for EventBus<E> {
	fn default() -> Self {
		Self {
			subscribers: Arc::default(),
		}
	}
}

impl<E> fmt::Debug for EventBus<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventBus").finish_non_exhaustive()
	}
}

impl<E: Clone + Send + 'static> EventBus<E> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Subscribes to `name` events triggered with exactly `key`, dropping the receiver unsubscribes
	pub fn subscribe(&self, name: &'static str, key: Option<&str>) -> chan::Receiver<E> {
		let (tx, rx) = chan::unbounded();

		self.subscribers
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.entry((name, key.map(ToString::to_string)))
			.or_default()
			.push(tx);

		rx
	}

	/// Delivers `event` to every live subscriber of `(name, key)`, returning how many received it
	pub fn trigger(&self, name: &'static str, key: Option<&str>, event: E) -> usize {
		let mut subscribers = self
			.subscribers
			.lock()
			.unwrap_or_else(PoisonError::into_inner);

		let subscriber_key = (name, key.map(ToString::to_string));

		let Some(senders) = subscribers.get_mut(&subscriber_key) else {
			trace!(%name, ?key, "Event without subscribers");
			return 0;
		};

		senders.retain(|tx| tx.try_send(event.clone()).is_ok());
		let delivered = senders.len();

		if senders.is_empty() {
			subscribers.remove(&subscriber_key);
		}

		delivered
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn delivers_by_exact_key_only() {
		let bus = EventBus::<u32>::new();

		let site_a = bus.subscribe("synced", Some("a"));
		let site_b = bus.subscribe("synced", Some("b"));
		let no_site = bus.subscribe("synced", None);

		assert_eq!(bus.trigger("synced", Some("a"), 7), 1);

		assert_eq!(site_a.recv().await.unwrap(), 7);
		assert!(site_b.is_empty());
		assert!(no_site.is_empty());
	}

	#[test]
	fn dropped_receivers_unsubscribe() {
		let bus = EventBus::<u32>::new();

		let rx = bus.subscribe("synced", None);
		drop(rx);

		assert_eq!(bus.trigger("synced", None, 1), 0);
		assert_eq!(bus.trigger("other", None, 1), 0);
	}
}
