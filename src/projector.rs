use bigdecimal::BigDecimal;

use crate::{
    plan::{ColumnAction, ColumnPlan, LEADING_COLUMN_COUNT},
    render::LineBuilder,
    value::parse_decimal,
    Result, Row,
};

/// Relative half-width reported by the engine when no sample was drawn yet.
pub const UNDEFINED_INTERVAL: &str = "NaN";

/// Column (zero-based, counting the plan-marker column) that is `NULL` on
/// plan-optimization diagnostic rows.
const PLAN_ROW_PROBE_COLUMN: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowOutcome {
    /// Synthetic row; nothing is emitted.
    Skip,
    Emit(ProjectedRow),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectedRow {
    /// Tab-separated, newline-terminated table line.
    pub line: String,
    /// At least one interval column carried a defined relative half-width.
    pub defines_interval: bool,
}

/// Renders fetched rows according to a [`ColumnPlan`].
#[derive(Clone, Copy, Debug)]
pub struct RowProjector<'a> {
    plan: &'a ColumnPlan,
}

impl<'a> RowProjector<'a> {
    pub fn new(plan: &'a ColumnPlan) -> Self {
        Self { plan }
    }

    pub fn project(&self, row: &Row) -> Result<RowOutcome> {
        let first_leading = self.plan.first_leading_column();
        // Group-by queries emit a blank row at every group boundary.
        if row.is_null(first_leading)? {
            return Ok(RowOutcome::Skip);
        }
        if self.plan.has_plan_marker() && row.is_null(PLAN_ROW_PROBE_COLUMN)? {
            return Ok(RowOutcome::Skip);
        }

        let mut line = LineBuilder::default();
        for col in first_leading..first_leading + LEADING_COLUMN_COUNT {
            line.push(row.text(col)?.as_deref().unwrap_or_default());
        }

        let mut defines_interval = false;
        let first_metric = self.plan.first_metric_column();
        for (offset, action) in self.plan.actions().iter().enumerate() {
            let col = first_metric + offset;
            match action {
                ColumnAction::Copy => {
                    line.push(row.text(col)?.as_deref().unwrap_or_default());
                }
                ColumnAction::ExpandInterval => {
                    defines_interval |= push_interval(&mut line, row, col)?;
                }
            }
        }

        Ok(RowOutcome::Emit(ProjectedRow {
            line: line.finish(),
            defines_interval,
        }))
    }
}

/// Emits `relative, lower, upper` for the interval column `col` and returns
/// whether the interval was defined.
fn push_interval(line: &mut LineBuilder, row: &Row, col: usize) -> Result<bool> {
    let relative = match row.text(col)? {
        Some(relative) if relative.trim() != UNDEFINED_INTERVAL => relative,
        _ => return Ok(push_undefined(line)),
    };
    let Some(estimate) = row.decimal(col - 1)? else {
        return Ok(push_undefined(line));
    };

    let (lower, upper) = interval_bounds(&estimate, &parse_decimal(&relative)?);
    line.push(&relative);
    line.push(&plain(lower));
    line.push(&plain(upper));
    Ok(true)
}

fn push_undefined(line: &mut LineBuilder) -> bool {
    for _ in 0..3 {
        line.push(UNDEFINED_INTERVAL);
    }
    false
}

/// `estimate·(1−relative)` and `estimate·(1+relative)`, exact to every digit.
pub fn interval_bounds(estimate: &BigDecimal, relative: &BigDecimal) -> (BigDecimal, BigDecimal) {
    let one = BigDecimal::from(1);
    let lower = estimate * (&one - relative);
    let upper = estimate * (&one + relative);
    (lower, upper)
}

/// Plain (non-scientific) text without insignificant trailing zeros.
fn plain(value: BigDecimal) -> String {
    value.normalized().to_plain_string()
}
