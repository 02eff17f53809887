//! Resumable poll-driven execution of one online-aggregation statement.

use std::mem;

use crate::{
    cursor::{Connector, Cursor},
    plan::ColumnPlan,
    projector::{RowOutcome, RowProjector},
    render::TableBuffer,
    CancellationFlag, PollOutcome, Result, XdbError,
};

/// Observable lifecycle stage of a [`QuerySession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    Streaming,
    Finished,
}

enum Phase<K> {
    NotStarted,
    Streaming(Streaming<K>),
    Finished,
}

struct Streaming<K> {
    cursor: K,
    plan: ColumnPlan,
    buffer: TableBuffer,
    any_interval_defined: bool,
}

/// Drives one statement to completion across repeated [`poll`](Self::poll)
/// calls, surfacing one refined row per call.
pub struct QuerySession<C: Connector> {
    connector: C,
    statement: Option<String>,
    phase: Phase<C::Cursor>,
    cancel: CancellationFlag,
}

impl<C: Connector> QuerySession<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            statement: None,
            phase: Phase::NotStarted,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match self.phase {
            Phase::NotStarted => SessionPhase::NotStarted,
            Phase::Streaming(_) => SessionPhase::Streaming,
            Phase::Finished => SessionPhase::Finished,
        }
    }

    /// Statement the session was last started with.
    pub fn statement(&self) -> Option<&str> {
        self.statement.as_deref()
    }

    /// Column plan of the running statement.
    pub fn plan(&self) -> Option<&ColumnPlan> {
        match &self.phase {
            Phase::Streaming(streaming) => Some(&streaming.plan),
            _ => None,
        }
    }

    /// Data rows emitted so far by the running statement.
    pub fn row_count(&self) -> usize {
        match &self.phase {
            Phase::Streaming(streaming) => streaming.buffer.row_count(),
            _ => 0,
        }
    }

    /// Handle that cancels this session from any thread.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Requests cancellation; observed before the next fetch.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Runs one step for `sql`.
    ///
    /// Returns [`PollOutcome::Intermediate`] after appending one data row and
    /// [`PollOutcome::Final`] once the cursor is exhausted or cancellation was
    /// observed. Any failure releases the cursor and yields
    /// [`PollOutcome::Error`] without the partial table.
    pub async fn poll(&mut self, sql: &str) -> PollOutcome {
        match self.step(sql).await {
            Ok(outcome) => outcome,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::error!("online aggregation poll failed: {err}");
                PollOutcome::Error(err.to_string())
            }
        }
    }

    /// Releases the cursor of a running statement without producing output.
    ///
    /// Safe to call in any phase and more than once.
    pub async fn abort(&mut self) {
        if let Phase::Streaming(mut streaming) = mem::replace(&mut self.phase, Phase::Finished) {
            release(&mut streaming.cursor).await;
        }
    }

    async fn step(&mut self, sql: &str) -> Result<PollOutcome> {
        if self.statement.as_deref() != Some(sql) {
            self.abort().await;
            self.phase = Phase::NotStarted;
        }

        let mut streaming = match mem::replace(&mut self.phase, Phase::Finished) {
            Phase::NotStarted => self.start(sql).await?,
            Phase::Streaming(streaming) => streaming,
            Phase::Finished => return Err(XdbError::SessionFinished),
        };

        loop {
            if self.cancel.is_cancelled() {
                #[cfg(feature = "tracing")]
                tracing::info!(
                    "online aggregation cancelled after {} rows",
                    streaming.buffer.row_count()
                );
                return Ok(finish(streaming).await);
            }

            let row = match streaming.cursor.next_row().await {
                Ok(Some(row)) => row,
                Ok(None) => return Ok(finish(streaming).await),
                Err(err) => {
                    release(&mut streaming.cursor).await;
                    return Err(err);
                }
            };

            let outcome = RowProjector::new(&streaming.plan).project(&row);
            match outcome {
                Ok(RowOutcome::Skip) => continue,
                Ok(RowOutcome::Emit(projected)) => {
                    streaming.buffer.push_line(&projected.line);
                    streaming.any_interval_defined |= projected.defines_interval;
                    let text = streaming.buffer.as_str().to_owned();
                    self.phase = Phase::Streaming(streaming);
                    return Ok(PollOutcome::Intermediate(text));
                }
                Err(err) => {
                    release(&mut streaming.cursor).await;
                    return Err(err);
                }
            }
        }
    }

    async fn start(&mut self, sql: &str) -> Result<Streaming<C::Cursor>> {
        #[cfg(feature = "tracing")]
        tracing::debug!("starting online aggregation: {sql}");

        self.statement = Some(sql.to_owned());
        self.cancel.reset();

        let mut cursor = self.connector.open_query(sql).await?;
        let plan = ColumnPlan::from_columns(cursor.columns());
        let plan = match plan {
            Ok(plan) => plan,
            Err(err) => {
                release(&mut cursor).await;
                return Err(err);
            }
        };
        let buffer = TableBuffer::with_header(plan.header_fields().iter().map(String::as_str));

        Ok(Streaming {
            cursor,
            plan,
            buffer,
            any_interval_defined: false,
        })
    }
}

async fn finish<K: Cursor>(mut streaming: Streaming<K>) -> PollOutcome {
    release(&mut streaming.cursor).await;
    PollOutcome::Final(streaming.buffer.into_final(streaming.any_interval_defined))
}

/// Closes the cursor and ends its transaction. Failures are logged only; the
/// outcome of the poll is already decided.
async fn release<K: Cursor>(cursor: &mut K) {
    if let Err(_err) = cursor.close().await {
        #[cfg(feature = "tracing")]
        tracing::warn!("cannot close cursor: {_err}");
    }
    if let Err(_err) = cursor.commit().await {
        #[cfg(feature = "tracing")]
        tracing::warn!("cannot commit: {_err}");
    }
}

#[cfg(test)]
mod tests {
    use super::{QuerySession, SessionPhase};
    use crate::{
        render::FALLBACK_NOTICE,
        testing::{agg_row, scripted, ScriptedConnector},
        PollOutcome, Row, Value, XdbError,
    };

    const SQL: &str = "SELECT ONLINE g, count(*), sum(x) FROM t GROUP BY g";
    const HEADER: &str = "%table g\tcnt\tsum\tsum_relCI\tsum_lo\tsum_hi\n";

    fn padding_row() -> Row {
        Row::new(vec![Value::null(); 4])
    }

    #[tokio::test]
    async fn emits_one_row_per_poll_then_final_table() {
        let connector = scripted(vec![
            Ok(agg_row(1, 5, "100", "0.2")),
            Ok(agg_row(2, 3, "50", "0.5")),
        ]);
        let mut session = QuerySession::new(connector.clone());

        let first = session.poll(SQL).await;
        assert_eq!(
            first,
            PollOutcome::Intermediate(format!("{HEADER}1\t5\t100\t0.2\t80\t120\n"))
        );
        assert_eq!(session.phase(), SessionPhase::Streaming);
        assert_eq!(session.row_count(), 1);

        let second = session.poll(SQL).await;
        assert_eq!(
            second,
            PollOutcome::Intermediate(format!(
                "{HEADER}1\t5\t100\t0.2\t80\t120\n2\t3\t50\t0.5\t25\t75\n"
            ))
        );

        let last = session.poll(SQL).await;
        assert_eq!(last, PollOutcome::Final(second.text().to_owned()));
        assert_eq!(session.phase(), SessionPhase::Finished);
        assert_eq!(connector.opens(), 1);
        assert_eq!(connector.closes(), 1);
        assert_eq!(connector.commits(), 1);
    }

    #[tokio::test]
    async fn skipped_rows_do_not_consume_polls() {
        let connector = scripted(vec![
            Ok(padding_row()),
            Ok(padding_row()),
            Ok(padding_row()),
            Ok(agg_row(1, 5, "100", "0.2")),
        ]);
        let mut session = QuerySession::new(connector);

        let first = session.poll(SQL).await;
        assert_eq!(
            first,
            PollOutcome::Intermediate(format!("{HEADER}1\t5\t100\t0.2\t80\t120\n"))
        );
    }

    #[tokio::test]
    async fn all_nan_intervals_fall_back_to_notice() {
        let connector = scripted(vec![
            Ok(agg_row(1, 0, "0", "NaN")),
            Ok(agg_row(2, 0, "0", "NaN")),
        ]);
        let mut session = QuerySession::new(connector);

        let first = session.poll(SQL).await;
        assert_eq!(
            first,
            PollOutcome::Intermediate(format!("{HEADER}1\t0\t0\tNaN\tNaN\tNaN\n"))
        );
        assert!(matches!(session.poll(SQL).await, PollOutcome::Intermediate(_)));
        assert_eq!(
            session.poll(SQL).await,
            PollOutcome::Final(FALLBACK_NOTICE.to_owned())
        );
    }

    #[tokio::test]
    async fn empty_result_falls_back_to_notice() {
        let connector = scripted(vec![]);
        let mut session = QuerySession::new(connector.clone());

        assert_eq!(
            session.poll(SQL).await,
            PollOutcome::Final(FALLBACK_NOTICE.to_owned())
        );
        assert_eq!(connector.closes(), 1);
    }

    #[tokio::test]
    async fn cancellation_keeps_rows_already_emitted() {
        let connector = scripted(vec![
            Ok(agg_row(1, 5, "100", "0.2")),
            Ok(agg_row(2, 0, "0", "NaN")),
            Ok(agg_row(3, 1, "10", "0.1")),
        ]);
        let mut session = QuerySession::new(connector.clone());

        session.poll(SQL).await;
        let second = session.poll(SQL).await;
        session.cancellation().cancel();

        let last = session.poll(SQL).await;
        assert_eq!(
            last,
            PollOutcome::Final(format!(
                "{HEADER}1\t5\t100\t0.2\t80\t120\n2\t0\t0\tNaN\tNaN\tNaN\n"
            ))
        );
        assert_eq!(last.text(), second.text());
        assert_eq!(connector.fetches(), 2);
        assert_eq!(connector.closes(), 1);
    }

    #[tokio::test]
    async fn fetch_error_releases_cursor_without_partial_output() {
        let connector = scripted(vec![
            Ok(agg_row(1, 5, "100", "0.2")),
            Err(XdbError::Decode("connection reset".to_owned())),
        ]);
        let mut session = QuerySession::new(connector.clone());

        assert!(matches!(session.poll(SQL).await, PollOutcome::Intermediate(_)));
        let failed = session.poll(SQL).await;
        assert_eq!(
            failed,
            PollOutcome::Error("decode error: connection reset".to_owned())
        );
        assert_eq!(session.phase(), SessionPhase::Finished);
        assert_eq!(connector.closes(), 1);
        assert_eq!(connector.commits(), 1);
    }

    #[tokio::test]
    async fn malformed_metadata_is_an_error() {
        let connector = ScriptedConnector::new(&["g", "cnt", "sum"], vec![]);
        let mut session = QuerySession::new(connector.clone());

        let outcome = session.poll(SQL).await;
        assert!(matches!(&outcome, PollOutcome::Error(message) if message.contains("malformed")));
        assert_eq!(connector.closes(), 1);
    }

    #[tokio::test]
    async fn open_failure_is_an_error() {
        let connector = scripted(vec![]).failing_open("could not connect");
        let mut session = QuerySession::new(connector.clone());

        let outcome = session.poll(SQL).await;
        assert_eq!(
            outcome,
            PollOutcome::Error("decode error: could not connect".to_owned())
        );
        assert_eq!(connector.closes(), 0);
    }

    #[tokio::test]
    async fn polling_finished_session_is_rejected() {
        let connector = scripted(vec![Ok(agg_row(1, 5, "100", "0.2"))]);
        let mut session = QuerySession::new(connector.clone());

        session.poll(SQL).await;
        assert!(matches!(session.poll(SQL).await, PollOutcome::Final(_)));
        assert!(matches!(
            session.poll(SQL).await,
            PollOutcome::Error(message) if message.contains("already finished")
        ));
        assert_eq!(connector.opens(), 1);
    }

    #[tokio::test]
    async fn new_statement_restarts_session() {
        let connector = scripted(vec![
            Ok(agg_row(1, 5, "100", "0.2")),
            Ok(agg_row(2, 3, "50", "0.5")),
        ]);
        let mut session = QuerySession::new(connector.clone());

        session.poll(SQL).await;
        let restarted = session.poll("SELECT ONLINE other").await;

        assert_eq!(
            restarted,
            PollOutcome::Intermediate(format!("{HEADER}1\t5\t100\t0.2\t80\t120\n"))
        );
        assert_eq!(session.statement(), Some("SELECT ONLINE other"));
        assert_eq!(connector.opens(), 2);
        assert_eq!(connector.closes(), 1);
    }

    #[tokio::test]
    async fn restart_clears_previous_cancellation() {
        let connector = scripted(vec![Ok(agg_row(1, 5, "100", "0.2"))]);
        let mut session = QuerySession::new(connector);
        session.cancel();

        assert!(matches!(session.poll(SQL).await, PollOutcome::Intermediate(_)));
    }

    #[tokio::test]
    async fn abort_is_idempotent() {
        let connector = scripted(vec![Ok(agg_row(1, 5, "100", "0.2"))]);
        let mut session = QuerySession::new(connector.clone());

        session.poll(SQL).await;
        session.abort().await;
        session.abort().await;

        assert_eq!(session.phase(), SessionPhase::Finished);
        assert_eq!(connector.closes(), 1);
        assert_eq!(connector.commits(), 1);
    }
}
