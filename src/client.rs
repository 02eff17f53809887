use std::fmt;
use std::time::Duration;

use reqwest::{header, StatusCode};

// tokio::time::sleep is only available on non-WASM targets.
#[cfg(not(target_arch = "wasm32"))]
use tokio::time::sleep;

use crate::{
    cursor::Connector,
    stream::PipelineCursor,
    wire::{self, PipelineRequest, Request},
    ClientOptions, Result, XdbError,
};

/// Pipeline endpoint used by [`PipelineConnector::from_env`] when
/// `XDB_PIPELINE_URL` is not set.
pub const DEFAULT_PIPELINE_URL: &str = "http://localhost:8080/v2/pipeline";

/// Per-stream protocol state carried between pipeline requests.
#[derive(Clone, Debug, Default)]
pub(crate) struct StreamState {
    pub(crate) baton: Option<String>,
    pub(crate) base_url: Option<String>,
}

#[derive(Clone)]
/// Opens online-aggregation cursors on an SQL-over-HTTP pipeline endpoint.
///
/// Every cursor runs inside its own read-only transaction on a dedicated
/// server stream, so rows are pulled from the server one `FETCH` at a time.
pub struct PipelineConnector {
    http: reqwest::Client,
    pipeline_url: String,
    authorization: Option<String>,
    options: ClientOptions,
}

impl fmt::Debug for PipelineConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConnector")
            .field("pipeline_url", &self.pipeline_url)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .field("options", &self.options)
            .finish()
    }
}

impl PipelineConnector {
    /// Creates a connector with a full raw authorization value.
    ///
    /// Example: `"Bearer <token>"` or any custom scheme.
    pub fn new(pipeline_url: impl Into<String>, authorization: impl Into<String>) -> Self {
        Self::build(pipeline_url.into(), Some(authorization.into()))
    }

    /// Creates a connector that sends no `Authorization` header.
    pub fn anonymous(pipeline_url: impl Into<String>) -> Self {
        Self::build(pipeline_url.into(), None)
    }

    /// Creates a connector from a bearer token.
    ///
    /// If the token is missing the `Bearer ` prefix, it is added automatically.
    pub fn new_bearer(pipeline_url: impl Into<String>, token: impl AsRef<str>) -> Self {
        let authorization = normalize_bearer_authorization(token.as_ref());
        Self::new(pipeline_url, authorization)
    }

    /// Creates a connector from environment variables.
    ///
    /// Reads:
    /// - `XDB_PIPELINE_URL` — pipeline endpoint URL, defaults to
    ///   [`DEFAULT_PIPELINE_URL`]
    /// - `XDB_TOKEN` — optional access token (Bearer prefix optional)
    ///
    /// Returns an error if a variable is set but empty.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> std::result::Result<Self, String> {
        let url = match std::env::var("XDB_PIPELINE_URL") {
            Ok(url) if url.trim().is_empty() => {
                return Err("XDB_PIPELINE_URL is set but empty".to_owned())
            }
            Ok(url) => url,
            Err(_) => DEFAULT_PIPELINE_URL.to_owned(),
        };
        match std::env::var("XDB_TOKEN") {
            Ok(token) if token.trim().is_empty() => Err("XDB_TOKEN is set but empty".to_owned()),
            Ok(token) => Ok(Self::new_bearer(url, token)),
            Err(_) => Ok(Self::anonymous(url)),
        }
    }

    /// Applies client options such as timeout, retry behavior and fetch size.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn build(pipeline_url: String, authorization: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            pipeline_url,
            authorization,
            options: ClientOptions::default(),
        }
    }

    /// Sends `requests` on `stream`, expecting exactly one result per request,
    /// and advances the stream's baton.
    pub(crate) async fn send(
        &self,
        stream: &mut StreamState,
        requests: Vec<Request>,
    ) -> Result<Vec<wire::PipelineResult>> {
        let expected = requests.len();
        let payload = PipelineRequest {
            baton: stream.baton.clone(),
            requests,
        };
        let url = match &stream.base_url {
            Some(base) => format!("{}/v2/pipeline", base.trim_end_matches('/')),
            None => self.pipeline_url.clone(),
        };
        let response = self.send_pipeline_with_retry(&url, &payload).await?;

        stream.baton = response.baton;
        if response.base_url.is_some() {
            stream.base_url = response.base_url;
        }

        if response.results.len() != expected {
            return Err(XdbError::Decode(format!(
                "result count mismatch: expected {expected}, got {}",
                response.results.len()
            )));
        }
        Ok(response.results)
    }

    async fn send_pipeline_with_retry(
        &self,
        url: &str,
        payload: &PipelineRequest,
    ) -> Result<wire::PipelineResponse> {
        // A request on a live stream may already have advanced the cursor.
        let (max_retries, timeout_ms) = if payload.baton.is_some() {
            (0, None)
        } else {
            (self.options.max_retries, self.options.timeout_ms)
        };
        let mut attempt = 0usize;
        loop {
            let mut request = self
                .http
                .post(url)
                .header(header::CONTENT_TYPE, "application/json")
                .json(payload);
            if let Some(timeout_ms) = timeout_ms {
                request = request.timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(authorization) = &self.authorization {
                request = request.header(header::AUTHORIZATION, authorization);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.map_err(XdbError::Transport)?;

                    if !status.is_success() {
                        if self.should_retry_status(status) && attempt < max_retries {
                            self.wait_before_retry(attempt).await;
                            attempt += 1;
                            continue;
                        }

                        return Err(XdbError::Http {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    return serde_json::from_str::<wire::PipelineResponse>(&body).map_err(|err| {
                        XdbError::Decode(format!(
                            "invalid pipeline response JSON: {err}; body: {body}"
                        ))
                    });
                }
                Err(err) => {
                    if self.should_retry_transport(&err) && attempt < max_retries {
                        self.wait_before_retry(attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(XdbError::Transport(err));
                }
            }
        }
    }

    fn should_retry_status(&self, status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
        )
    }

    fn should_retry_transport(&self, err: &reqwest::Error) -> bool {
        err.is_timeout()
            || err.is_request()
            || err.is_body()
            // is_connect() is not available on wasm32 targets (no TCP)
            || {
                #[cfg(not(target_arch = "wasm32"))]
                { err.is_connect() }
                #[cfg(target_arch = "wasm32")]
                { false }
            }
    }

    /// Waits before the next retry attempt.
    ///
    /// On native targets: exponential backoff sleep via `tokio::time::sleep`.
    /// On WASM targets: no-op, `tokio::time::sleep` is not available.
    async fn wait_before_retry(&self, attempt: usize) {
        let exp = attempt.min(16) as u32;
        let multiplier = 1u64 << exp;
        let delay_ms = self.options.retry_backoff_ms.saturating_mul(multiplier);

        #[cfg(feature = "tracing")]
        tracing::debug!("retrying pipeline request after {} ms", delay_ms);

        #[cfg(not(target_arch = "wasm32"))]
        sleep(Duration::from_millis(delay_ms)).await;

        #[cfg(target_arch = "wasm32")]
        let _ = delay_ms;
    }
}

impl Connector for PipelineConnector {
    type Cursor = PipelineCursor;

    async fn open_query(&self, sql: &str) -> Result<PipelineCursor> {
        PipelineCursor::open(self.clone(), sql).await
    }
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
