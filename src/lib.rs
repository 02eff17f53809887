//! `xdb-stream` drives online-aggregation queries one refined row at a time.
//!
//! A [`QuerySession`] keeps an open cursor between calls to
//! [`QuerySession::poll`]. Every poll appends one data row to a tab-separated
//! table, expanding each `rel. CI` column into the relative half-width and the
//! lower and upper confidence bounds of the preceding estimate:
//! - [`PollOutcome::Intermediate`] carries the table so far
//! - [`PollOutcome::Final`] carries the finished table, or [`FALLBACK_NOTICE`]
//!   when no row ever had a defined interval
//! - [`PollOutcome::Error`] reports a failed poll
//!
//! [`PipelineConnector`] opens cursors on an SQL-over-HTTP pipeline endpoint;
//! any other source can be plugged in through [`Connector`] and [`Cursor`].

mod cancel;
mod client;
mod cursor;
mod decode;
mod error;
mod options;
mod plan;
mod projector;
mod registry;
mod render;
mod session;
mod stream;
mod types;
mod value;
mod wire;

#[cfg(test)]
mod testing;

pub use cancel::CancellationFlag;
pub use client::{PipelineConnector, DEFAULT_PIPELINE_URL};
pub use cursor::{Connector, Cursor};
pub use error::XdbError;
pub use options::ClientOptions;
pub use plan::{ColumnAction, ColumnPlan, INTERVAL_COLUMN, LEADING_COLUMN_COUNT, PLAN_MARKER_COLUMN};
pub use projector::{interval_bounds, ProjectedRow, RowOutcome, RowProjector, UNDEFINED_INTERVAL};
pub use registry::{Canceller, SessionId, SessionRegistry};
pub use render::{normalize_field, FALLBACK_NOTICE, TABLE_MAGIC_TAG};
pub use session::{QuerySession, SessionPhase};
pub use stream::{PipelineCursor, CURSOR_NAME};
pub use types::{Col, PollOutcome, Row};
pub use value::Value;

pub type Result<T> = std::result::Result<T, XdbError>;
