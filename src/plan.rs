//! Per-query column formatting plan.

use crate::{render::normalize_field, Col, Result, XdbError};

/// Name of the diagnostic column the engine prepends when plan optimization
/// is enabled.
pub const PLAN_MARKER_COLUMN: &str = "plan no.";

/// Name of a relative confidence-interval column.
pub const INTERVAL_COLUMN: &str = "rel. CI";

/// Descriptive columns copied verbatim before the metric columns.
pub const LEADING_COLUMN_COUNT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnAction {
    /// Emit the value as text.
    Copy,
    /// Emit relative half-width, lower and upper bound for the estimate in
    /// the preceding column.
    ExpandInterval,
}

/// How every result column is rendered, derived once from result metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnPlan {
    skip_offset: usize,
    actions: Vec<ColumnAction>,
    header_fields: Vec<String>,
}

impl ColumnPlan {
    pub fn from_columns(cols: &[Col]) -> Result<Self> {
        let skip_offset = match cols.first() {
            Some(col) if col.name == PLAN_MARKER_COLUMN => 1,
            _ => 0,
        };
        let required = skip_offset + LEADING_COLUMN_COUNT + 1;
        if cols.len() < required {
            return Err(XdbError::MalformedMetadata {
                columns: cols.len(),
                required,
            });
        }

        let first_metric = skip_offset + LEADING_COLUMN_COUNT;
        let mut header_fields: Vec<String> = cols[skip_offset..first_metric]
            .iter()
            .map(|col| normalize_field(&col.name).into_owned())
            .collect();
        let mut actions = Vec::with_capacity(cols.len() - first_metric);

        // An interval right after the leading columns qualifies the last one.
        let mut metric_name = header_fields.last().cloned().unwrap_or_default();
        for col in &cols[first_metric..] {
            let name = normalize_field(&col.name);
            if name == INTERVAL_COLUMN {
                header_fields.push(format!("{metric_name}_relCI"));
                header_fields.push(format!("{metric_name}_lo"));
                header_fields.push(format!("{metric_name}_hi"));
                actions.push(ColumnAction::ExpandInterval);
            } else {
                metric_name = name.into_owned();
                header_fields.push(metric_name.clone());
                actions.push(ColumnAction::Copy);
            }
        }

        Ok(Self {
            skip_offset,
            actions,
            header_fields,
        })
    }

    /// 1 when the result starts with the plan-marker column, else 0.
    pub fn skip_offset(&self) -> usize {
        self.skip_offset
    }

    pub fn has_plan_marker(&self) -> bool {
        self.skip_offset == 1
    }

    /// Index of the first leading column.
    pub fn first_leading_column(&self) -> usize {
        self.skip_offset
    }

    /// Index of the first metric column.
    pub fn first_metric_column(&self) -> usize {
        self.skip_offset + LEADING_COLUMN_COUNT
    }

    /// Actions for the metric columns, in column order.
    pub fn actions(&self) -> &[ColumnAction] {
        &self.actions
    }

    /// Header field names, interval columns already expanded to three fields.
    pub fn header_fields(&self) -> &[String] {
        &self.header_fields
    }

    /// Total result columns this plan was built for.
    pub fn column_count(&self) -> usize {
        self.first_metric_column() + self.actions.len()
    }
}
