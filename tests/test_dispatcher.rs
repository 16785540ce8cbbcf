//! Event loop tests
//!
//! Handler ordering, wildcard handling, bound arguments and how handler and
//! transport failures end a run.


use rtm_dispatch::testing::MockTransport;
use rtm_dispatch::transport::Transport;
use rtm_dispatch::{
    BoundArgs, ConfigurationError, Connector, DispatchError, Dispatcher, Event, HandlerResult,
    TransportError,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use test_helpers::{call_log, calls, recording, run_for, run_once, run_recording_batches};

fn existing(mock: &MockTransport) -> Option<Connector<MockTransport>> {
    Some(Connector::Existing(mock.clone()))
}

#[tokio::test]
async fn test_specific_handlers_run_before_wildcard_for_each_event() {
    let log = call_log();
    let mock = MockTransport::new().with_polls(vec![Ok(vec![
        Event::new("hello"),
        Event::new("goodbye"),
    ])]);
    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();
    dispatcher.on("*", recording(&log, "h3")).unwrap();
    dispatcher.on("hello", recording(&log, "h1")).unwrap();
    dispatcher.on("goodbye", recording(&log, "h2")).unwrap();

    dispatcher.run(existing(&mock), run_once()).await.unwrap();

    assert_eq!(calls(&log), vec!["h1", "h3", "h2", "h3"]);
}

#[tokio::test]
async fn test_registration_order_is_preserved_per_type() {
    let log = call_log();
    let mock = MockTransport::new().with_polls(vec![Ok(vec![Event::new("message")])]);
    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();
    dispatcher.on("message", recording(&log, "first")).unwrap();
    dispatcher.on("message", recording(&log, "second")).unwrap();
    dispatcher.on("message", recording(&log, "third")).unwrap();

    dispatcher.run(existing(&mock), run_once()).await.unwrap();

    assert_eq!(calls(&log), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_literal_wildcard_event_runs_wildcard_handlers_once() {
    let log = call_log();
    let mock = MockTransport::new().with_polls(vec![Ok(vec![Event::new("*")])]);
    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();
    dispatcher.on("*", recording(&log, "any")).unwrap();

    dispatcher.run(existing(&mock), run_once()).await.unwrap();

    assert_eq!(calls(&log), vec!["any"]);
}

#[tokio::test]
async fn test_untyped_events_reach_only_wildcard_handlers() {
    let log = call_log();
    let untyped = Event::try_from(json!({"text": "no type here"})).unwrap();
    let mock = MockTransport::new().with_polls(vec![Ok(vec![untyped])]);
    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();
    dispatcher.on("message", recording(&log, "message")).unwrap();
    dispatcher.on("*", recording(&log, "any")).unwrap();

    dispatcher.run(existing(&mock), run_once()).await.unwrap();

    assert_eq!(calls(&log), vec!["any"]);
}

#[tokio::test]
async fn test_unregistered_types_are_ignored() {
    let log = call_log();
    let mock = MockTransport::new().with_polls(vec![Ok(vec![Event::new("user_typing")])]);
    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();
    dispatcher.on("hello", recording(&log, "hello")).unwrap();

    dispatcher.run(existing(&mock), run_once()).await.unwrap();

    assert!(calls(&log).is_empty());
    assert_eq!(dispatcher.stats().snapshot().events_received, 1);
}

#[tokio::test]
async fn test_bound_args_reach_handler() {
    let received: Arc<Mutex<Option<BoundArgs>>> = Arc::new(Mutex::new(None));
    let sink = received.clone();
    let mock = MockTransport::new().with_polls(vec![Ok(vec![Event::new("hello")])]);
    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();

    let args = json!({"greeting": "hey there", "count": 2})
        .as_object()
        .cloned()
        .unwrap();
    dispatcher
        .register(
            "hello",
            move |_transport: &MockTransport, _event: &Event, args: &BoundArgs| -> HandlerResult {
                *sink.lock().unwrap() = Some(args.clone());
                Ok(())
            },
            Some(args.clone()),
        )
        .unwrap();

    dispatcher.run(existing(&mock), run_once()).await.unwrap();

    assert_eq!(received.lock().unwrap().clone(), Some(args));
}

#[tokio::test]
async fn test_bound_args_on_two_parameter_handler_are_rejected() {
    fn two_params(_transport: &MockTransport, _event: &Event) -> HandlerResult {
        Ok(())
    }

    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();
    let args = json!({"greeting": "hey"}).as_object().cloned();

    let error = dispatcher.register("hello", two_params, args).unwrap_err();

    assert!(matches!(error, ConfigurationError::UnacceptedArgs { .. }));
    assert_eq!(
        error.to_string(),
        "two_params does not accept bound arguments: 'greeting'"
    );
    assert!(dispatcher.registry().is_empty());
}

#[tokio::test]
async fn test_non_string_type_reaches_only_wildcard_handlers() {
    let log = call_log();
    let numeric = Event::try_from(json!({"type": 42})).unwrap();
    let mock = MockTransport::new().with_polls(vec![Ok(vec![numeric])]);
    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();
    dispatcher.on("", recording(&log, "empty")).unwrap();
    dispatcher.on("*", recording(&log, "any")).unwrap();

    dispatcher.run(existing(&mock), run_once()).await.unwrap();

    assert_eq!(calls(&log), vec!["any"]);
}

#[tokio::test]
async fn test_failing_function_pointer_is_reported_by_given_name() {
    fn refuse(_transport: &MockTransport, _event: &Event) -> HandlerResult {
        Err("refused".into())
    }

    let pointer: fn(&MockTransport, &Event) -> HandlerResult = refuse;
    let mock = MockTransport::new().with_polls(vec![Ok(vec![Event::new("hello")])]);
    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();
    dispatcher
        .register_named("hello", "refuser", pointer, None)
        .unwrap();

    let error = dispatcher
        .run(existing(&mock), run_once())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DispatchError::Handler { ref handler, .. } if handler == "refuser"
    ));
}

#[tokio::test]
async fn test_handlers_reply_through_transport() {
    fn echo(transport: &MockTransport, event: &Event) -> HandlerResult {
        if let (Some(channel), Some(text)) = (event.get_str("channel"), event.get_str("text")) {
            transport.send(channel, text)?;
        }
        Ok(())
    }

    let mock = MockTransport::new().with_polls(vec![Ok(vec![Event::new("message")
        .with("channel", "C024BE91L")
        .with("text", "ping")])]);
    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();
    dispatcher.on("message", echo).unwrap();

    dispatcher.run(existing(&mock), run_once()).await.unwrap();

    assert_eq!(
        mock.sent_messages(),
        vec![("C024BE91L".to_string(), "ping".to_string())]
    );
}

#[tokio::test]
async fn test_handler_error_aborts_remaining_dispatch() {
    let log = call_log();
    let mock = MockTransport::new().with_polls(vec![Ok(vec![
        Event::new("message"),
        Event::new("hello"),
    ])]);
    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();
    dispatcher
        .on(
            "message",
            |_transport: &MockTransport, _event: &Event| -> HandlerResult {
                Err("cannot parse message".into())
            },
        )
        .unwrap();
    dispatcher.on("message", recording(&log, "after")).unwrap();
    dispatcher.on("hello", recording(&log, "hello")).unwrap();

    let error = dispatcher
        .run(existing(&mock), run_for(5))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DispatchError::Handler { ref event_type, .. } if event_type == "message"
    ));
    assert!(calls(&log).is_empty());
    assert_eq!(mock.poll_calls(), 1);
}

#[tokio::test]
async fn test_send_failure_surfaces_as_handler_error() {
    fn reply(transport: &MockTransport, _event: &Event) -> HandlerResult {
        transport.send("general", "hi")?;
        Ok(())
    }

    let mock = MockTransport::new()
        .failing_sends()
        .with_polls(vec![Ok(vec![Event::new("hello")])]);
    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();
    dispatcher.on("hello", reply).unwrap();

    let error = dispatcher
        .run(existing(&mock), run_once())
        .await
        .unwrap_err();

    match error {
        DispatchError::Handler { handler, source, .. } => {
            assert_eq!(handler, "reply");
            assert!(source.to_string().contains("Send failed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_transient_timeout_reconnects_and_continues() {
    let batches = Arc::new(Mutex::new(Vec::new()));
    let mock = MockTransport::new().with_polls(vec![Err(TransportError::Timeout), Ok(vec![])]);
    let dispatcher: Dispatcher<MockTransport> = Dispatcher::new();

    dispatcher
        .run(existing(&mock), run_recording_batches(1, batches.clone()))
        .await
        .unwrap();

    // The timeout yields an empty batch, then the scripted empty batch stops the run
    assert_eq!(*batches.lock().unwrap(), vec![Vec::<Event>::new(), Vec::new()]);
    assert_eq!(mock.connect_calls(), 2);
    assert_eq!(dispatcher.stats().snapshot().connections_lost, 1);
}

#[tokio::test]
async fn test_non_transient_poll_error_ends_run() {
    let mock = MockTransport::new().with_polls(vec![Err(TransportError::other("account_inactive"))]);
    let dispatcher: Dispatcher<MockTransport> = Dispatcher::new();

    let error = dispatcher
        .run(existing(&mock), run_for(5))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DispatchError::Transport(TransportError::Other(_))
    ));
    assert_eq!(mock.connect_calls(), 1);
}

#[tokio::test]
async fn test_invalid_handlers_are_rejected_at_registration() {
    fn no_parameters() -> HandlerResult {
        Ok(())
    }
    fn transport_only(_transport: &MockTransport) -> HandlerResult {
        Ok(())
    }

    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();

    let error = dispatcher.on("hello", no_parameters).unwrap_err();
    assert_eq!(
        error.to_string(),
        "no_parameters() missing 2 required parameters: 'transport' and 'event'"
    );

    let error = dispatcher.on("hello", transport_only).unwrap_err();
    assert!(matches!(error, ConfigurationError::InvalidHandler { .. }));
    assert_eq!(
        error.to_string(),
        "transport_only(transport) missing 1 required parameter: 'event'"
    );

    assert!(dispatcher.registry().is_empty());
}

#[tokio::test]
async fn test_dispatcher_runs_again_after_a_run_ends() {
    let log = call_log();
    let mut dispatcher: Dispatcher<MockTransport> = Dispatcher::new();
    dispatcher.on("hello", recording(&log, "hello")).unwrap();

    for _ in 0..2 {
        let mock = MockTransport::new().with_polls(vec![Ok(vec![Event::new("hello")])]);
        dispatcher.run(existing(&mock), run_once()).await.unwrap();
    }

    assert_eq!(calls(&log), vec!["hello", "hello"]);
    assert_eq!(dispatcher.stats().snapshot().runs_started, 2);
}
