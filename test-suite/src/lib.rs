pub mod flow;

extern crate captains_log;
extern crate log;
pub use captains_log::logfn;
use captains_log::*;
use rsocket_flow_core::{ConnectionMode, FlowConfig};
use rsocket_flow_stream::connection::StreamsConnection;
use rstest::*;
use std::fmt;

use flow::helper::RecordingWriter;

#[fixture]
pub fn runner() -> TestRunner {
    TestRunner::new()
}

impl fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "")
    }
}

pub struct TestRunner {
    pub rt: tokio::runtime::Runtime,
}

impl TestRunner {
    pub fn new() -> Self {
        recipe::raw_file_logger("/tmp/rsocket_flow_test.log", Level::Trace).test().build().expect("log");
        let rt = tokio::runtime::Builder::new_multi_thread().worker_threads(2).build().expect("rt");
        Self { rt }
    }

    pub fn block_on<F: Future<Output = ()>>(&self, f: F) {
        self.rt.block_on(f);
    }

    /// A connection with a small REQUEST_N ceiling, so pacing is observable.
    pub fn connection(&self, mode: ConnectionMode, max_request_n: u32) -> (StreamsConnection, RecordingWriter) {
        let writer = RecordingWriter::default();
        let config = FlowConfig::default().with_max_request_n(max_request_n).with_log_level(Level::Trace);
        (StreamsConnection::new(mode, config, writer.clone()), writer)
    }
}
