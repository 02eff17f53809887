/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum XdbError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// SQL/pipeline error returned by the server.
    #[error("pipeline error at request {request_index}: {message}")]
    Pipeline {
        /// Index of the failing request in the pipeline payload.
        request_index: usize,
        /// Error message text from the server.
        message: String,
        /// Optional engine-specific error code (SQLSTATE).
        code: Option<String>,
    },
    /// Response decoding, value conversion or protocol-shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
    /// Result metadata has fewer columns than an aggregation result needs.
    #[error("malformed result metadata: {columns} columns, at least {required} required")]
    MalformedMetadata { columns: usize, required: usize },
    /// The session already produced its final outcome.
    #[error("session already finished; start a new session for a new statement")]
    SessionFinished,
}
