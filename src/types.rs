use std::borrow::Cow;

use bigdecimal::BigDecimal;

use crate::{Result, Value, XdbError};

/// Result column metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Col {
    pub name: String,
}

impl Col {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One fetched result row. Column indices are zero-based.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: impl Into<Vec<Value>>) -> Self {
        Self {
            values: values.into(),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the value at `col`, failing when the row is shorter than expected.
    pub fn get(&self, col: usize) -> Result<&Value> {
        self.values.get(col).ok_or_else(|| {
            XdbError::Decode(format!(
                "column index {col} out of range for row of {} values",
                self.values.len()
            ))
        })
    }

    /// `true` when the value at `col` is SQL `NULL`.
    pub fn is_null(&self, col: usize) -> Result<bool> {
        Ok(self.get(col)?.is_null())
    }

    pub fn text(&self, col: usize) -> Result<Option<Cow<'_, str>>> {
        Ok(self.get(col)?.as_text())
    }

    pub fn decimal(&self, col: usize) -> Result<Option<BigDecimal>> {
        self.get(col)?.as_decimal()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// Result of one [`QuerySession::poll`](crate::QuerySession::poll) step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// One more row was appended; poll the same session again.
    Intermediate(String),
    /// The session finished; payload is the table or the fallback notice.
    Final(String),
    /// The poll failed and the session released its resources.
    Error(String),
}

impl PollOutcome {
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Intermediate(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Intermediate(text) | Self::Final(text) | Self::Error(text) => text,
        }
    }
}
