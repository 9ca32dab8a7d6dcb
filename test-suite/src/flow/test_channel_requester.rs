use crate::flow::helper::*;
use crate::*;
use rsocket_flow_core::error::StreamError;
use rsocket_flow_core::reactive::Subscriber;
use rsocket_flow_core::{ConnectionMode, Payload, StreamType};
use rsocket_flow_stream::connection::StreamsConnection;
use rsocket_flow_stream::handle::ProducerHandle;
use rstest::*;
use std::sync::Arc;

fn items(s: &[&'static str]) -> Vec<Payload> {
    s.iter().map(|s| Payload::from(*s)).collect()
}

#[logfn]
#[rstest]
fn test_first_item_opens_channel(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let sub = RecordingSubscriber::new(5);
    let handle = conn.request_channel(None, sub.clone()).expect("open");
    let id = handle.stream_id();
    assert!(writer.events().is_empty());

    let producer = QueueProducer::new(items(&["first", "second"]), false);
    producer.subscribe(Arc::new(handle));
    assert_eq!(producer.requested(), vec![1]);
    assert_eq!(
        writer.take(),
        vec![WireEvent::NewStream {
            id,
            stream_type: StreamType::Channel,
            initial_request_n: 5,
            payload: Payload::from("first")
        }]
    );

    conn.on_request_n_frame(id, 1);
    assert_eq!(writer.take(), vec![WireEvent::Payload { id, payload: Payload::from("second") }]);
    assert_eq!(producer.requested(), vec![1, 1]);
}

#[logfn]
#[rstest]
fn test_initial_payload_opens_on_subscribe(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let sub = RecordingSubscriber::new(4);
    let handle = conn.request_channel(Some(Payload::from("init")), sub.clone()).expect("open");
    let id = handle.stream_id();
    assert!(writer.events().is_empty());

    let producer = QueueProducer::new(items(&["a", "b"]), true);
    producer.subscribe(Arc::new(handle));
    assert!(producer.requested().is_empty());
    assert_eq!(
        writer.take(),
        vec![WireEvent::NewStream {
            id,
            stream_type: StreamType::Channel,
            initial_request_n: 4,
            payload: Payload::from("init")
        }]
    );

    conn.on_request_n_frame(id, 2);
    assert_eq!(
        writer.take(),
        vec![
            WireEvent::Payload { id, payload: Payload::from("a") },
            WireEvent::Payload { id, payload: Payload::from("b") },
            WireEvent::Complete { id },
        ]
    );
    assert_eq!(conn.stream_count(), 1);

    conn.on_payload_frame(id, Payload::from("r1"), false, true, false);
    conn.on_payload_frame(id, Payload::from("r2"), true, true, false);
    assert_eq!(sub.items(), items(&["r1", "r2"]));
    assert_eq!(sub.events().last(), Some(&SubscriberEvent::Complete));
    assert_eq!(sub.terminal_count(), 1);
    assert_eq!(writer.take(), vec![WireEvent::StreamClosed { id }]);
}

#[logfn]
#[rstest]
fn test_credit_before_open_is_split(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let sub = RecordingSubscriber::new(7);
    let handle = conn.request_channel(Some(Payload::from("init")), sub.clone()).expect("open");
    let id = handle.stream_id();
    sub.request(8);
    QueueProducer::new(Vec::new(), false).subscribe(Arc::new(handle));
    assert_eq!(
        writer.take(),
        vec![WireEvent::NewStream {
            id,
            stream_type: StreamType::Channel,
            initial_request_n: 10,
            payload: Payload::from("init")
        }]
    );
    assert_eq!(conn.consumer_allowance(id), 15);
    for _ in 0..5 {
        conn.on_payload_frame(id, Payload::from("r"), false, true, false);
    }
    assert_eq!(writer.take(), vec![WireEvent::RequestN { id, n: 5 }]);
    assert_eq!(sub.items().len(), 5);
}

#[logfn]
#[rstest]
fn test_request_n_before_producer(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let sub = RecordingSubscriber::new(1);
    let handle = conn.request_channel(None, sub.clone()).expect("open");
    let id = handle.stream_id();
    let target: Arc<dyn Subscriber> = Arc::new(handle.clone());
    // open through a direct item, no subscription yet
    target.on_next(Payload::from("open"));
    assert_eq!(writer.count(|e| matches!(e, WireEvent::NewStream { .. })), 1);
    conn.on_request_n_frame(id, 3);
    let producer = QueueProducer::new(items(&["a", "b", "c", "d"]), false);
    producer.subscribe(target);
    // one for the opening item, plus the credit that arrived before
    assert_eq!(producer.requested(), vec![4]);
    assert_eq!(writer.count(|e| matches!(e, WireEvent::Payload { .. })), 4);
}

#[derive(Clone, Copy, Debug)]
enum Step {
    LocalComplete,
    RemoteComplete,
    LocalCancel,
    RemoteCancel,
}

fn run_step(step: Step, conn: &StreamsConnection, id: u32, handle: &ProducerHandle, sub: &RecordingSubscriber) {
    match step {
        Step::LocalComplete => handle.on_complete(),
        Step::RemoteComplete => conn.on_payload_frame(id, Payload::default(), true, false, false),
        Step::LocalCancel => sub.cancel(),
        Step::RemoteCancel => conn.on_cancel_frame(id),
    }
}

#[logfn]
#[rstest]
#[case(Step::LocalComplete, Step::RemoteComplete)]
#[case(Step::RemoteComplete, Step::LocalComplete)]
#[case(Step::LocalCancel, Step::RemoteCancel)]
#[case(Step::RemoteCancel, Step::LocalCancel)]
#[case(Step::LocalComplete, Step::LocalCancel)]
#[case(Step::RemoteCancel, Step::RemoteComplete)]
fn test_closes_after_both_halves(runner: TestRunner, #[case] first: Step, #[case] second: Step) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let sub = RecordingSubscriber::new(2);
    let handle = conn.request_channel(Some(Payload::from("init")), sub.clone()).expect("open");
    let id = handle.stream_id();
    let producer = QueueProducer::new(Vec::new(), false);
    producer.subscribe(Arc::new(handle.clone()));

    run_step(first, &conn, id, &handle, &sub);
    assert_eq!(conn.stream_count(), 1, "{:?} alone must not close", first);
    assert_eq!(writer.closed_count(id), 0);

    run_step(second, &conn, id, &handle, &sub);
    assert_eq!(conn.stream_count(), 0);
    assert_eq!(writer.closed_count(id), 1);
    assert!(sub.terminal_count() <= 1);

    // everything after the end is ignored
    run_step(first, &conn, id, &handle, &sub);
    run_step(second, &conn, id, &handle, &sub);
    assert_eq!(writer.closed_count(id), 1);
    assert!(sub.terminal_count() <= 1);
}

#[logfn]
#[rstest]
fn test_remote_cancel_stops_producer(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let sub = RecordingSubscriber::new(2);
    let handle = conn.request_channel(Some(Payload::from("init")), sub.clone()).expect("open");
    let id = handle.stream_id();
    let producer = QueueProducer::new(items(&["a", "b"]), false);
    producer.subscribe(Arc::new(handle.clone()));
    conn.on_cancel_frame(id);
    assert_eq!(producer.cancel_count(), 1);
    conn.on_request_n_frame(id, 2);
    handle.on_next(Payload::from("late"));
    assert_eq!(writer.count(|e| matches!(e, WireEvent::Payload { .. })), 0);
    // the consumer half is still open
    conn.on_payload_frame(id, Payload::from("r"), false, true, false);
    assert_eq!(sub.items(), items(&["r"]));
}

#[logfn]
#[rstest]
fn test_remote_error_ends_both_halves(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let sub = RecordingSubscriber::new(2);
    let handle = conn.request_channel(Some(Payload::from("init")), sub.clone()).expect("open");
    let id = handle.stream_id();
    let producer = QueueProducer::new(Vec::new(), false);
    producer.subscribe(Arc::new(handle));
    conn.on_error_frame(id, StreamError::application("boom"));
    assert_eq!(sub.events().last(), Some(&SubscriberEvent::Error(StreamError::application("boom"))));
    assert_eq!(sub.terminal_count(), 1);
    assert_eq!(producer.cancel_count(), 1);
    assert_eq!(writer.closed_count(id), 1);
}

#[logfn]
#[rstest]
fn test_local_error(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let sub = RecordingSubscriber::new(2);
    let handle = conn.request_channel(Some(Payload::from("init")), sub.clone()).expect("open");
    let id = handle.stream_id();
    QueueProducer::new(Vec::new(), false).subscribe(Arc::new(handle.clone()));
    writer.take();
    handle.on_error(StreamError::application("producer failed"));
    assert_eq!(
        writer.take(),
        vec![
            WireEvent::ApplicationError { id, message: "producer failed".to_string() },
            WireEvent::StreamClosed { id }
        ]
    );
    assert_eq!(sub.terminal_count(), 1);
}

#[logfn]
#[rstest]
fn test_cancel_before_open(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let sub = RecordingSubscriber::new(3);
    let handle = conn.request_channel(None, sub.clone()).expect("open");
    let id = handle.stream_id();
    sub.cancel();
    assert_eq!(writer.take(), vec![WireEvent::StreamClosed { id }]);
    // an unopened stream ending with CANCEL is reported as completion
    assert_eq!(sub.events(), vec![SubscriberEvent::Subscribe, SubscriberEvent::Complete]);
    // a producer arriving afterwards is cancelled right away
    let producer = QueueProducer::new(items(&["a"]), false);
    producer.subscribe(Arc::new(handle));
    assert_eq!(producer.cancel_count(), 1);
    assert!(writer.events().is_empty());
}

#[logfn]
#[rstest]
fn test_payload_before_open(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let sub = RecordingSubscriber::new(3);
    let handle = conn.request_channel(None, sub.clone()).expect("open");
    let id = handle.stream_id();
    conn.on_payload_frame(id, Payload::from("early"), false, true, false);
    assert_eq!(
        sub.events(),
        vec![
            SubscriberEvent::Subscribe,
            SubscriberEvent::Error(StreamError::application("Haven't sent REQUEST_CHANNEL yet"))
        ]
    );
    assert_eq!(writer.take(), vec![WireEvent::StreamClosed { id }]);
}

#[logfn]
#[rstest]
fn test_surplus_item_stops_producer(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let sub = RecordingSubscriber::new(1);
    let handle = conn.request_channel(Some(Payload::from("init")), sub.clone()).expect("open");
    let id = handle.stream_id();
    let producer = QueueProducer::new(Vec::new(), false);
    producer.subscribe(Arc::new(handle));
    conn.on_payload_frame(id, Payload::from("a"), false, true, false);
    conn.on_payload_frame(id, Payload::from("b"), false, true, false);
    assert_eq!(sub.items(), items(&["a"]));
    assert_eq!(sub.events().last(), Some(&SubscriberEvent::Error(StreamError::SurplusResponse)));
    assert_eq!(producer.cancel_count(), 1);
    assert_eq!(writer.closed_count(id), 1);
    assert_eq!(writer.count(|e| matches!(e, WireEvent::InvalidError { .. })), 1);
}

#[logfn]
#[rstest]
fn test_items_after_local_cancel(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let sub = RecordingSubscriber::new(5);
    let handle = conn.request_channel(Some(Payload::from("init")), sub.clone()).expect("open");
    let id = handle.stream_id();
    let producer = QueueProducer::new(Vec::new(), false);
    producer.subscribe(Arc::new(handle));
    // held back, the remote still holds 5
    sub.request(2);
    sub.cancel();
    assert_eq!(writer.count(|e| matches!(e, WireEvent::Cancel { .. })), 1);
    writer.take();
    // in flight before the remote saw CANCEL, more than was ever granted
    for _ in 0..8 {
        conn.on_payload_frame(id, Payload::from("late"), false, true, false);
    }
    assert!(writer.events().is_empty());
    assert!(sub.items().is_empty());
    assert_eq!(sub.terminal_count(), 0);
    assert_eq!(producer.cancel_count(), 0);
    assert_eq!(conn.stream_count(), 1);
    // the producer half still ends the stream
    conn.on_cancel_frame(id);
    assert_eq!(writer.take(), vec![WireEvent::StreamClosed { id }]);
}
