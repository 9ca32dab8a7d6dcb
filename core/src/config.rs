use crate::MAX_REQUEST_N;

/// General config for the stream state machines of one connection
#[derive(Clone, Debug)]
pub struct FlowConfig {
    /// The ceiling of credit announced in a single frame (initial request or REQUEST_N).
    pub max_request_n: u32,
    /// Initial level of the connection logger, can be changed later on the fly.
    pub log_level: log::Level,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self { max_request_n: MAX_REQUEST_N, log_level: log::Level::Info }
    }
}

impl FlowConfig {
    /// Zero would stall every stream, so it is raised to 1.
    #[inline]
    pub fn with_max_request_n(mut self, n: u32) -> Self {
        self.max_request_n = n.max(1);
        self
    }

    #[inline]
    pub fn with_log_level(mut self, level: log::Level) -> Self {
        self.log_level = level;
        self
    }
}
