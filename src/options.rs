/// Configures HTTP timeout, retry behavior and cursor fetch granularity.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Timeout in milliseconds for requests that open a new stream.
    ///
    /// Requests on a live stream are never bounded: a `FETCH` of an
    /// online-aggregation cursor may legitimately run for minutes.
    pub timeout_ms: Option<u64>,
    /// Maximum number of retries after the initial attempt.
    ///
    /// Only requests that open a new stream are retried.
    pub max_retries: usize,
    /// Base retry backoff in milliseconds (exponential strategy).
    pub retry_backoff_ms: u64,
    /// Rows requested per `FETCH`. Values below 1 are treated as 1.
    pub fetch_size: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            max_retries: 0,
            retry_backoff_ms: 250,
            fetch_size: 1,
        }
    }
}
