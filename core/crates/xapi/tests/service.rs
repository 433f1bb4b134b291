mod common;

use common::{harness, state, Call, CONTEXT_ID, COURSE_ID};

use lms_core_sync::{Error, WsError};
use lms_core_xapi::{OfflineOptions, PostOptions};
use lms_network::Connection;

fn options() -> PostOptions {
	PostOptions {
		course_id: Some(COURSE_ID),
		..Default::default()
	}
}

#[tokio::test]
async fn sending_statements_online_drops_offline_progress() {
	let h = harness();
	h.offline
		.save_state(&h.site_id, CONTEXT_ID, &state("progress"), "{}", OfflineOptions::default())
		.await
		.unwrap();

	let sent = h
		.service
		.post_statements(CONTEXT_ID, "mod_h5pactivity", "[1]", options())
		.await
		.unwrap();

	assert!(sent);
	assert_eq!(h.api.posted_statements(), ["[1]"]);
	assert!(!h.service.has_offline_data(CONTEXT_ID, None).await.unwrap());
}

#[tokio::test]
async fn writes_are_queued_while_offline() {
	let h = harness();
	h.network.set(Connection::None);

	assert!(!h
		.service
		.post_statements(CONTEXT_ID, "mod_h5pactivity", "[1]", options())
		.await
		.unwrap());
	assert!(!h
		.service
		.post_state(CONTEXT_ID, &state("progress"), "{\"page\":2}", options())
		.await
		.unwrap());
	assert!(!h
		.service
		.delete_state(CONTEXT_ID, &state("bookmarks"), options())
		.await
		.unwrap());

	assert!(h.api.calls().is_empty());

	let statements = h.offline.statements(&h.site_id, CONTEXT_ID).await.unwrap();
	assert_eq!(statements.len(), 1);
	assert_eq!(statements[0].course_id, Some(COURSE_ID));

	let states = h.offline.states(&h.site_id, CONTEXT_ID).await.unwrap();
	assert_eq!(states.len(), 2);
	assert!(states
		.iter()
		.any(|entry| entry.state_id == "bookmarks" && entry.is_deletion()));
}

#[tokio::test]
async fn offline_option_keeps_the_queue_order() {
	let h = harness();

	let sent = h
		.service
		.post_statements(
			CONTEXT_ID,
			"mod_h5pactivity",
			"[1]",
			PostOptions {
				offline: true,
				..options()
			},
		)
		.await
		.unwrap();

	assert!(!sent);
	assert!(h.api.calls().is_empty());
	assert!(h.service.has_offline_data(CONTEXT_ID, None).await.unwrap());
}

#[tokio::test]
async fn unreachable_server_falls_back_to_the_queue() {
	let h = harness();
	h.api
		.fail_statements("[1]", WsError::Transport("connection refused".into()));
	h.api.fail_state("progress", WsError::Offline);

	assert!(!h
		.service
		.post_statements(CONTEXT_ID, "mod_h5pactivity", "[1]", options())
		.await
		.unwrap());
	assert!(!h
		.service
		.post_state(CONTEXT_ID, &state("progress"), "{}", options())
		.await
		.unwrap());

	assert_eq!(h.api.calls().len(), 2);
	assert_eq!(h.offline.context_ids(&h.site_id).await.unwrap(), [CONTEXT_ID]);
}

#[tokio::test]
async fn server_errors_reach_the_caller() {
	let h = harness();
	h.api.fail_state(
		"progress",
		WsError::exception("nopermissions", "Sorry, but you do not currently have permissions"),
	);

	let err = h
		.service
		.delete_state(CONTEXT_ID, &state("progress"), options())
		.await
		.unwrap_err();

	assert!(matches!(err, Error::Ws(WsError::Exception { .. })));
	assert_eq!(h.api.calls(), [Call::DeleteState("progress".into())]);
	assert!(!h.service.has_offline_data(CONTEXT_ID, None).await.unwrap());
}
