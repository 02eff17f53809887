//! Seams between a [`QuerySession`](crate::QuerySession) and the database.

use crate::{Col, Result, Row};

/// Opens result cursors for statement text.
///
/// Implementations must deliver rows incrementally: a session expects each
/// [`Cursor::next_row`] to reflect fresh engine progress rather than a
/// pre-buffered result set.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Cursor: Cursor;

    async fn open_query(&self, sql: &str) -> Result<Self::Cursor>;
}

/// A live, forward-only result cursor owned by one session.
#[allow(async_fn_in_trait)]
pub trait Cursor {
    /// Result metadata, available as soon as the cursor is open.
    fn columns(&self) -> &[Col];

    /// Fetches the next row, `None` once the result is exhausted.
    async fn next_row(&mut self) -> Result<Option<Row>>;

    /// Releases the cursor. Calling it more than once is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Ends the surrounding transaction. Calling it more than once is a no-op.
    async fn commit(&mut self) -> Result<()>;
}
