use keyhole::{stream, Delivery, EngineConfig, InboundEvent, Outcome, Phase, Session, SessionError, Template};
use serde_json::json;
use std::sync::Arc;

mod templates_;
use templates_::{counter, init_logging, journal, Counter, Journal, RecordingTransport};

fn test_session<S, V>(state: S, view: V) -> (Session<S, RecordingTransport>, RecordingTransport)
where
	V: Template<S> + Send + Sync + 'static,
{
	init_logging();
	let transport = RecordingTransport::default();
	let config = EngineConfig::default();
	let session = Session::new(state, Arc::new(view), transport.clone(), &config, config.pool());
	(session, transport)
}

fn click() -> InboundEvent {
	InboundEvent::new("0", None)
}

#[test]
fn mount_matches_stream() {
	let (mut session, transport) = test_session(Counter { clicks: 7 }, counter);
	assert!(!session.is_mounted());

	let markup = session.mount().unwrap();
	let mut streamed = String::new();
	stream(&counter, &Counter { clicks: 7 }, &mut streamed).unwrap();
	assert_eq!(markup, streamed);

	assert!(session.is_mounted());
	assert_eq!(session.snapshot().unwrap().markup(), markup);
	assert_eq!(session.phase(), Phase::Idle);
	// Mounting doesn't go through the transport.
	assert_eq!(transport.writes(), 0);
}

#[tokio::test]
async fn click_commits_one_text_update() {
	let (mut session, transport) = test_session(Counter::default(), counter);
	session.mount().unwrap();

	assert_eq!(session.dispatch(click()).await.unwrap(), Outcome::Committed(Delivery::Sent { operations: 1 }));
	assert_eq!(session.state().clicks, 1);
	assert_eq!(session.phase(), Phase::Idle);

	let sent = transport.sent();
	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].notifications[0].to_string(), r#"1.setTextNode("1")"#);
}

#[tokio::test]
async fn unbound_keys_are_skipped() {
	let (mut session, transport) = test_session(Counter::default(), counter);
	session.mount().unwrap();

	// `1` is a scalar, `9` doesn't exist.
	assert_eq!(session.dispatch(InboundEvent::new("1", None)).await.unwrap(), Outcome::Unbound);
	assert_eq!(session.dispatch(InboundEvent::new("9", None)).await.unwrap(), Outcome::Unbound);
	assert_eq!(session.state().clicks, 0);
	assert_eq!(transport.writes(), 0);
}

#[tokio::test]
async fn dispatch_before_mount() {
	let (mut session, _) = test_session(Counter::default(), counter);
	assert!(matches!(session.dispatch(click()).await, Err(SessionError::NotMounted)));
	assert!(matches!(session.update(|counter| counter.clicks = 1), Err(SessionError::NotMounted)));
	assert_eq!(session.phase(), Phase::Idle);
}

#[tokio::test]
async fn failing_handler_still_reconciles() {
	let (mut session, transport) = test_session(Journal::default(), journal);
	session.mount().unwrap();

	assert_eq!(session.dispatch(InboundEvent::new("2", None)).await.unwrap(), Outcome::Committed(Delivery::Sent { operations: 1 }));
	assert_eq!(session.state().entries, ["fail"]);
	assert_eq!(transport.sent()[0].notifications[0].target, "6");
}

#[tokio::test]
async fn panicking_handler_is_contained() {
	let (mut session, transport) = test_session(Journal::default(), journal);
	session.mount().unwrap();

	assert_eq!(session.dispatch(InboundEvent::new("3", None)).await.unwrap(), Outcome::Committed(Delivery::Empty));
	assert_eq!(session.phase(), Phase::Idle);
	assert_eq!(transport.writes(), 0);

	// Still usable.
	assert_eq!(session.dispatch(InboundEvent::new("1", None)).await.unwrap(), Outcome::Committed(Delivery::Sent { operations: 1 }));
}

#[tokio::test]
async fn async_handler_completes_before_reconciling() {
	let (mut session, transport) = test_session(Journal::default(), journal);
	session.mount().unwrap();

	assert_eq!(session.dispatch(InboundEvent::new("0", None)).await.unwrap(), Outcome::Committed(Delivery::Sent { operations: 1 }));
	assert_eq!(session.state().entries, ["slow"]);
	assert_eq!(transport.writes(), 1);
}

#[tokio::test]
async fn handler_receives_payload() {
	let (mut session, _) = test_session(Journal::default(), journal);
	session.mount().unwrap();

	session.dispatch(InboundEvent::new("5", Some(json!({ "x": 1 })))).await.unwrap();
	session.dispatch(InboundEvent::new("5", None)).await.unwrap();
	assert_eq!(session.state().entries, [r#"{"x":1}"#, "null"]);
}

#[test]
fn update_outside_of_events() {
	let (mut session, transport) = test_session(Counter::default(), counter);
	session.mount().unwrap();

	assert_eq!(session.update(|counter| counter.clicks = 5).unwrap(), Delivery::Sent { operations: 1 });
	assert_eq!(session.update(|counter| counter.clicks = 5).unwrap(), Delivery::Empty);
	assert_eq!(transport.writes(), 1);
}

#[tokio::test]
async fn undelivered_batch_requires_remount() {
	let (mut session, transport) = test_session(Counter::default(), counter);
	session.mount().unwrap();

	transport.set_failing(true);
	let error = session.dispatch(click()).await.unwrap_err();
	assert!(matches!(error, SessionError::Undelivered(_)));
	assert!(!error.is_fatal());
	assert!(!session.is_mounted());
	assert!(matches!(session.dispatch(click()).await, Err(SessionError::NotMounted)));

	transport.set_failing(false);
	let markup = session.mount().unwrap();
	assert!(markup.contains("<!--kh:1-->1<!--/kh-->"), "{}", markup);
	assert_eq!(session.dispatch(click()).await.unwrap(), Outcome::Committed(Delivery::Sent { operations: 1 }));
	assert_eq!(transport.writes(), 1);
}

#[test]
fn compose_error_faults_the_session() {
	let (mut session, transport) = test_session(false, |broken: &bool, c: &mut keyhole::Composer<'_, bool>| {
		c.enter_scope(1, 1)?;
		c.append_literal("<p>")?;
		if *broken {
			Ok(())
		} else {
			c.append_scalar(1_i32, None)
		}
	});
	session.mount().unwrap();

	let error = session.update(|broken| *broken = true).unwrap_err();
	assert!(matches!(error, SessionError::Compose(_)));
	assert!(error.is_fatal());
	assert_eq!(session.phase(), Phase::Faulted);
	assert!(matches!(session.mount(), Err(SessionError::Faulted)));
	assert_eq!(transport.writes(), 0);

	session.close();
	assert_eq!(session.phase(), Phase::Closed);
}

#[test]
fn shape_change_faults_the_session() {
	let (mut session, _) = test_session(false, |element: &bool, c: &mut keyhole::Composer<'_, bool>| {
		c.enter_scope(1, 1)?;
		c.append_literal("<p>")?;
		if *element {
			c.append_element(|c| c.enter_scope(0, 0))
		} else {
			c.append_scalar(1_i32, None)
		}
	});
	session.mount().unwrap();

	assert!(matches!(session.update(|element| *element = true), Err(SessionError::Diff(_))));
	assert_eq!(session.phase(), Phase::Faulted);
}

#[tokio::test]
async fn closed_sessions_reject_everything() {
	let (mut session, _) = test_session(Counter::default(), counter);
	session.mount().unwrap();
	session.close();

	assert!(!session.is_mounted());
	assert!(matches!(session.dispatch(click()).await, Err(SessionError::Closed)));
	assert!(matches!(session.mount(), Err(SessionError::Closed)));
}

#[test]
fn session_ids_are_unique() {
	let (first, _) = test_session(Counter::default(), counter);
	let (second, _) = test_session(Counter::default(), counter);
	assert_ne!(first.id(), second.id());
	assert_eq!(first.id().to_string().len(), 36);
}
