//! In-memory connector for session tests.

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use crate::{
    cursor::{Connector, Cursor},
    Col, Result, Row, Value, XdbError,
};

pub(crate) type ScriptedRow = std::result::Result<Row, XdbError>;

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    fetches: AtomicUsize,
    closes: AtomicUsize,
    commits: AtomicUsize,
}

/// Replays the same scripted rows for every opened cursor.
#[derive(Clone)]
pub(crate) struct ScriptedConnector {
    columns: Vec<Col>,
    rows: Arc<Mutex<Vec<ScriptedRow>>>,
    open_error: Option<String>,
    counters: Arc<Counters>,
}

impl ScriptedConnector {
    pub(crate) fn new(columns: &[&str], rows: Vec<ScriptedRow>) -> Self {
        Self {
            columns: columns.iter().map(|name| Col::named(*name)).collect(),
            rows: Arc::new(Mutex::new(rows)),
            open_error: None,
            counters: Arc::default(),
        }
    }

    pub(crate) fn failing_open(mut self, message: &str) -> Self {
        self.open_error = Some(message.to_owned());
        self
    }

    pub(crate) fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn fetches(&self) -> usize {
        self.counters.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn commits(&self) -> usize {
        self.counters.commits.load(Ordering::SeqCst)
    }
}

pub(crate) struct ScriptedCursor {
    columns: Vec<Col>,
    rows: VecDeque<ScriptedRow>,
    counters: Arc<Counters>,
}

impl Connector for ScriptedConnector {
    type Cursor = ScriptedCursor;

    async fn open_query(&self, _sql: &str) -> Result<ScriptedCursor> {
        if let Some(message) = &self.open_error {
            return Err(XdbError::Decode(message.clone()));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let rows = self
            .rows
            .lock()
            .expect("script mutex must not be poisoned")
            .iter()
            .map(|row| match row {
                Ok(row) => Ok(row.clone()),
                Err(XdbError::Decode(message)) => Err(XdbError::Decode(message.clone())),
                Err(other) => Err(XdbError::Decode(other.to_string())),
            })
            .collect::<Vec<_>>();
        Ok(ScriptedCursor {
            columns: self.columns.clone(),
            rows: rows.into(),
            counters: self.counters.clone(),
        })
    }
}

impl Cursor for ScriptedCursor {
    fn columns(&self) -> &[Col] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);
        self.rows.pop_front().transpose()
    }

    async fn close(&mut self) -> Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector over `g, cnt, sum, rel. CI` rows.
pub(crate) fn scripted(rows: Vec<ScriptedRow>) -> ScriptedConnector {
    ScriptedConnector::new(&["g", "cnt", "sum", "rel. CI"], rows)
}

pub(crate) fn agg_row(group: i64, count: i64, sum: &str, relative: &str) -> Row {
    Row::new(vec![
        Value::integer(group),
        Value::integer(count),
        Value::text(sum),
        Value::text(relative),
    ])
}
