mod common;

use common::{harness, Call, USER_ID};

use lms_core_notifications::AUTO_SYNCED_EVENT;
use lms_core_sync::{Error, WsError};
use lms_network::Connection;

use tracing_test::traced_test;

#[tokio::test]
async fn marking_read_online_invalidates_the_list() {
	let h = harness();

	assert!(h
		.service
		.mark_notification_read(10, USER_ID, None)
		.await
		.unwrap());

	assert_eq!(h.api.calls(), [Call::MarkRead(10), Call::InvalidateList]);
	assert!(h.offline.entries(&h.site_id, USER_ID).await.unwrap().is_empty());
}

#[tokio::test]
async fn reads_are_queued_while_offline_and_shown_as_read() {
	let h = harness();
	h.network.set(Connection::None);

	assert!(!h
		.service
		.mark_notification_read(10, USER_ID, None)
		.await
		.unwrap());
	assert!(!h
		.service
		.mark_all_notifications_as_read(USER_ID, None)
		.await
		.unwrap());

	assert!(h.api.calls().is_empty());

	let pending = h.service.pending_reads(USER_ID, None).await.unwrap();
	assert_eq!(pending.notification_ids, [10]);
	assert!(pending.all_read_at.is_some());
}

#[tokio::test]
async fn transport_failures_fall_back_to_the_queue() {
	let h = harness();
	h.api.fail_read(10, WsError::Transport("timed out".into()));

	assert!(!h
		.service
		.mark_notification_read(10, USER_ID, None)
		.await
		.unwrap());
	assert_eq!(h.offline.entries(&h.site_id, USER_ID).await.unwrap().len(), 1);
}

#[tokio::test]
async fn server_errors_are_not_queued() {
	let h = harness();
	h.api
		.fail_read(10, WsError::exception("invalidrecord", "Notification not found"));

	assert!(matches!(
		h.service.mark_notification_read(10, USER_ID, None).await,
		Err(Error::Ws(WsError::Exception { .. }))
	));
	assert!(!h.offline.has_data(&h.site_id, USER_ID).await.unwrap());
}

#[tokio::test]
#[traced_test]
async fn mark_all_supersedes_older_single_reads() {
	let h = harness();
	h.offline.mark_read(&h.site_id, USER_ID, 1, 100).await.unwrap();
	h.offline.mark_read(&h.site_id, USER_ID, 2, 100).await.unwrap();
	h.offline.mark_all_read(&h.site_id, USER_ID).await.unwrap();
	h.offline.mark_read(&h.site_id, USER_ID, 3, 100).await.unwrap();

	let result = h.coordinator.sync(USER_ID, None).await.unwrap();

	assert!(result.updated);
	assert!(result.warnings.is_empty());
	assert_eq!(
		h.api.calls(),
		[
			Call::MarkAllRead(USER_ID),
			Call::MarkRead(3),
			Call::InvalidateList
		]
	);
	assert!(!h.offline.has_data(&h.site_id, USER_ID).await.unwrap());
	assert!(logs_contain("dropping older entries"));
}

#[tokio::test]
async fn rejected_reads_are_dropped_with_a_warning() {
	let h = harness();
	h.offline.mark_read(&h.site_id, USER_ID, 1, 100).await.unwrap();
	h.offline.mark_read(&h.site_id, USER_ID, 2, 100).await.unwrap();
	h.api
		.fail_read(1, WsError::exception("invalidrecord", "Notification not found"));

	let result = h.coordinator.sync(USER_ID, None).await.unwrap();

	assert!(result.updated);
	assert_eq!(result.warnings.len(), 1);
	assert!(result.warnings[0].starts_with("Offline data from notifications 'Notifications' has been deleted."));
	assert!(result.warnings[0].contains("Notification not found"));
	assert!(!h.offline.has_data(&h.site_id, USER_ID).await.unwrap());
	assert_eq!(
		h.coordinator
			.sync_warnings(&USER_ID, &h.site_id)
			.await
			.unwrap(),
		result.warnings
	);
}

#[tokio::test]
async fn connectivity_failures_keep_the_queue() {
	let h = harness();
	h.offline.mark_all_read(&h.site_id, USER_ID).await.unwrap();
	*h.api.mark_all_error.lock().unwrap() = Some(WsError::Transport("connection reset".into()));

	assert!(h
		.coordinator
		.sync(USER_ID, None)
		.await
		.unwrap_err()
		.is_connectivity());
	assert!(h.offline.has_data(&h.site_id, USER_ID).await.unwrap());
	assert!(!h.api.calls().contains(&Call::InvalidateList));
}

#[tokio::test]
async fn automatic_sync_notifies_per_user() {
	let h = harness();
	let events = h.events.subscribe(AUTO_SYNCED_EVENT, Some(common::SITE));

	h.offline.mark_read(&h.site_id, USER_ID, 1, 100).await.unwrap();
	h.offline.mark_read(&h.site_id, 4, 2, 100).await.unwrap();

	h.coordinator.sync_all_sites(None, true).await.unwrap();

	let mut ids = [events.try_recv().unwrap().id, events.try_recv().unwrap().id];
	ids.sort();
	assert_eq!(ids, ["3", "4"]);
	assert!(h.offline.user_ids(&h.site_id).await.unwrap().is_empty());
}
