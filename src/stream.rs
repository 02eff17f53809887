use std::collections::VecDeque;

use crate::{
    client::StreamState,
    cursor::Cursor,
    decode::{decode_cols, decode_rows, ensure_close_success, into_execute_result},
    wire::{PipelineResult, Request},
    Col, PipelineConnector, Result, Row, XdbError,
};

/// Name of the server-side cursor declared on every stream.
pub const CURSOR_NAME: &str = "xdb_cursor";

/// Server-side cursor living on one pipeline stream.
///
/// The stream holds a read-only transaction; rows are pulled with
/// `FETCH FORWARD <fetch_size>`.
#[derive(Debug)]
pub struct PipelineCursor {
    connector: PipelineConnector,
    stream: StreamState,
    columns: Vec<Col>,
    pending: VecDeque<Row>,
    exhausted: bool,
    cursor_open: bool,
    stream_open: bool,
}

impl PipelineCursor {
    pub(crate) async fn open(connector: PipelineConnector, sql: &str) -> Result<Self> {
        let mut stream = StreamState::default();
        let requests = vec![
            Request::execute("BEGIN READ ONLY", false),
            Request::execute(declare_statement(sql), false),
            Request::execute(fetch_statement(connector.options().fetch_size), true),
        ];

        let opened = connector
            .send(&mut stream, requests)
            .await
            .and_then(Self::first_fetch);

        match opened {
            Ok((columns, rows)) => {
                let exhausted = is_short_fetch(rows.len(), connector.options().fetch_size);
                Ok(Self {
                    connector,
                    stream,
                    columns,
                    pending: rows.into(),
                    exhausted,
                    cursor_open: true,
                    stream_open: true,
                })
            }
            Err(err) => {
                if stream.baton.is_some() {
                    discard_stream(&connector, &mut stream).await;
                }
                Err(err)
            }
        }
    }

    fn first_fetch(results: Vec<PipelineResult>) -> Result<(Vec<Col>, Vec<Row>)> {
        let mut fetched = None;
        for (index, result) in results.into_iter().enumerate() {
            let execute = into_execute_result(result, index)?;
            fetched = Some(execute);
        }
        let fetched = fetched.ok_or_else(|| {
            XdbError::Decode("missing fetch result on cursor open".to_owned())
        })?;
        Ok((decode_cols(fetched.cols), decode_rows(fetched.rows)?))
    }

    async fn fetch(&mut self) -> Result<()> {
        let fetch_size = self.connector.options().fetch_size;
        let results = self
            .connector
            .send(
                &mut self.stream,
                vec![Request::execute(fetch_statement(fetch_size), true)],
            )
            .await?;
        let mut rows = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            rows.extend(decode_rows(into_execute_result(result, index)?.rows)?);
        }
        self.exhausted = is_short_fetch(rows.len(), fetch_size);
        self.pending.extend(rows);
        Ok(())
    }
}

impl Cursor for PipelineCursor {
    fn columns(&self) -> &[Col] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.pending.is_empty() && !self.exhausted && self.cursor_open {
            self.fetch().await?;
        }
        Ok(self.pending.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.exhausted = true;
        if !(self.cursor_open && self.stream_open) {
            self.cursor_open = false;
            return Ok(());
        }
        self.cursor_open = false;
        let results = self
            .connector
            .send(
                &mut self.stream,
                vec![Request::execute(format!("CLOSE {CURSOR_NAME}"), false)],
            )
            .await?;
        for (index, result) in results.into_iter().enumerate() {
            into_execute_result(result, index)?;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if !self.stream_open {
            return Ok(());
        }
        self.stream_open = false;
        self.cursor_open = false;
        let results = self
            .connector
            .send(
                &mut self.stream,
                vec![Request::execute("COMMIT", false), Request::Close {}],
            )
            .await?;
        let mut results = results.into_iter();
        if let Some(commit) = results.next() {
            into_execute_result(commit, 0)?;
        }
        if let Some(close) = results.next() {
            ensure_close_success(close, 1)?;
        }
        Ok(())
    }
}

/// Closes a stream whose cursor never opened. Failures are only logged.
async fn discard_stream(connector: &PipelineConnector, stream: &mut StreamState) {
    if let Err(_err) = connector.send(stream, vec![Request::Close {}]).await {
        #[cfg(feature = "tracing")]
        tracing::warn!("cannot close pipeline stream: {_err}");
    }
}

pub(crate) fn declare_statement(sql: &str) -> String {
    let body = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    format!("DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR {body}")
}

pub(crate) fn fetch_statement(fetch_size: u32) -> String {
    format!("FETCH FORWARD {} FROM {CURSOR_NAME}", fetch_size.max(1))
}

fn is_short_fetch(fetched: usize, fetch_size: u32) -> bool {
    fetched < fetch_size.max(1) as usize
}
