use crate::flow::helper::*;
use crate::*;
use rsocket_flow_core::error::StreamError;
use rsocket_flow_core::{ConnectionMode, Payload};
use rstest::*;

#[logfn]
#[rstest]
fn test_rejected_by_default(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    conn.on_request_channel_frame(2, 5, Payload::from("hi"), false, true, false);
    assert_eq!(
        writer.take(),
        vec![
            WireEvent::ApplicationError { id: 2, message: "request channel is not supported".to_string() },
            WireEvent::StreamClosed { id: 2 }
        ]
    );
    assert!(!conn.has_streams());
}

#[logfn]
#[rstest]
fn test_accepted_channel(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let acceptor = RecordingAcceptor::new(RecordingSubscriber::new(2));
    conn.set_acceptor(acceptor.clone());

    conn.on_request_channel_frame(2, 3, Payload::from("open"), false, true, false);
    assert_eq!(acceptor.accepted(), vec![(2, Payload::from("open"))]);
    assert_eq!(acceptor.inbound.events(), vec![SubscriberEvent::Subscribe]);
    assert_eq!(writer.take(), vec![WireEvent::RequestN { id: 2, n: 2 }]);

    let producer = QueueProducer::new(["a", "b", "c", "d"].map(Payload::from), true);
    producer.subscribe(acceptor.producer(0).expect("producer"));
    assert_eq!(producer.requested(), vec![3]);
    conn.on_request_n_frame(2, 1);
    assert_eq!(
        writer.take(),
        vec![
            WireEvent::Payload { id: 2, payload: Payload::from("a") },
            WireEvent::Payload { id: 2, payload: Payload::from("b") },
            WireEvent::Payload { id: 2, payload: Payload::from("c") },
            WireEvent::Payload { id: 2, payload: Payload::from("d") },
            WireEvent::Complete { id: 2 },
        ]
    );
    assert_eq!(conn.stream_count(), 1);

    conn.on_payload_frame(2, Payload::from("x"), false, true, false);
    conn.on_payload_frame(2, Payload::from("y"), true, true, false);
    assert_eq!(
        acceptor.inbound.events(),
        vec![
            SubscriberEvent::Subscribe,
            SubscriberEvent::Next(Payload::from("x")),
            SubscriberEvent::Next(Payload::from("y")),
            SubscriberEvent::Complete
        ]
    );
    assert_eq!(writer.take(), vec![WireEvent::StreamClosed { id: 2 }]);
}

#[logfn]
#[rstest]
fn test_fragmented_opening(runner: TestRunner) {
    let (conn, _writer) = runner.connection(ConnectionMode::Client, 10);
    let acceptor = RecordingAcceptor::new(RecordingSubscriber::new(0));
    conn.set_acceptor(acceptor.clone());
    conn.on_request_channel_frame(2, 1, Payload::from("he"), false, true, true);
    assert!(acceptor.accepted().is_empty());
    conn.on_payload_frame(2, Payload::from("llo"), false, true, false);
    assert_eq!(acceptor.accepted(), vec![(2, Payload::from("hello"))]);
    assert!(acceptor.inbound.items().is_empty());
}

#[logfn]
#[rstest]
fn test_opened_with_complete(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let acceptor = RecordingAcceptor::new(RecordingSubscriber::new(4));
    conn.set_acceptor(acceptor.clone());
    conn.on_request_channel_frame(2, 1, Payload::from("only"), true, true, false);
    // the inbound half is already over when the subscriber shows up
    assert_eq!(acceptor.inbound.events(), vec![SubscriberEvent::Subscribe, SubscriberEvent::Complete]);
    assert!(writer.events().is_empty());
    assert_eq!(conn.stream_count(), 1);

    let producer = QueueProducer::new([Payload::from("reply")], true);
    producer.subscribe(acceptor.producer(0).expect("producer"));
    assert_eq!(
        writer.take(),
        vec![
            WireEvent::Payload { id: 2, payload: Payload::from("reply") },
            WireEvent::Complete { id: 2 },
            WireEvent::StreamClosed { id: 2 }
        ]
    );
    assert_eq!(acceptor.inbound.terminal_count(), 1);
}

#[logfn]
#[rstest]
fn test_remote_cancel_and_local_cancel(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Server, 10);
    let acceptor = RecordingAcceptor::new(RecordingSubscriber::new(1));
    conn.set_acceptor(acceptor.clone());
    conn.on_request_channel_frame(1, 0, Payload::from("open"), false, true, false);
    let producer = QueueProducer::new(Vec::new(), false);
    producer.subscribe(acceptor.producer(0).expect("producer"));
    writer.take();

    conn.on_cancel_frame(1);
    assert_eq!(producer.cancel_count(), 1);
    assert_eq!(conn.stream_count(), 1);
    acceptor.inbound.cancel();
    assert_eq!(writer.take(), vec![WireEvent::Cancel { id: 1 }, WireEvent::StreamClosed { id: 1 }]);
    assert_eq!(acceptor.inbound.terminal_count(), 0);
}

#[logfn]
#[rstest]
fn test_surplus_item(runner: TestRunner) {
    let (conn, writer) = runner.connection(ConnectionMode::Client, 10);
    let acceptor = RecordingAcceptor::new(RecordingSubscriber::new(1));
    conn.set_acceptor(acceptor.clone());
    conn.on_request_channel_frame(2, 0, Payload::from("open"), false, true, false);
    let producer = QueueProducer::new(Vec::new(), false);
    producer.subscribe(acceptor.producer(0).expect("producer"));
    conn.on_payload_frame(2, Payload::from("a"), false, true, false);
    conn.on_payload_frame(2, Payload::from("b"), false, true, false);
    assert_eq!(
        acceptor.inbound.events(),
        vec![
            SubscriberEvent::Subscribe,
            SubscriberEvent::Next(Payload::from("a")),
            SubscriberEvent::Error(StreamError::SurplusResponse)
        ]
    );
    assert_eq!(producer.cancel_count(), 1);
    assert_eq!(writer.closed_count(2), 1);
}

#[logfn]
#[rstest]
fn test_peer_stream_ids(runner: TestRunner) {
    let (conn, _writer) = runner.connection(ConnectionMode::Client, 10);
    let acceptor = RecordingAcceptor::new(RecordingSubscriber::new(0));
    conn.set_acceptor(acceptor.clone());
    conn.on_request_channel_frame(4, 0, Payload::from("a"), false, true, false);
    // our own parity, a reused id, a smaller id and zero are not new peer streams
    conn.on_request_channel_frame(3, 0, Payload::from("b"), false, true, false);
    conn.on_request_channel_frame(4, 0, Payload::from("c"), false, true, false);
    conn.on_request_channel_frame(2, 0, Payload::from("d"), false, true, false);
    conn.on_request_channel_frame(0, 0, Payload::from("e"), false, true, false);
    conn.on_request_channel_frame(6, 0, Payload::from("f"), false, true, false);
    assert_eq!(acceptor.accepted(), vec![(4, Payload::from("a")), (6, Payload::from("f"))]);
    assert_eq!(conn.stream_count(), 2);
}
