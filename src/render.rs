//! Delimited-table text assembly.

use std::borrow::Cow;

/// Display-mode prefix of the header line.
pub const TABLE_MAGIC_TAG: &str = "%table ";

/// Final payload when no row ever produced a defined confidence interval.
pub const FALLBACK_NOTICE: &str = "%html <h3>No sample was ever extracted because the selectivity might be too high. Try a full join.</h3>";

const FIELD_SEPARATOR: char = '\t';
const LINE_TERMINATOR: char = '\n';

/// Replaces tab and newline characters with a single space.
pub fn normalize_field(value: &str) -> Cow<'_, str> {
    if value.contains([FIELD_SEPARATOR, LINE_TERMINATOR]) {
        Cow::Owned(value.replace([FIELD_SEPARATOR, LINE_TERMINATOR], " "))
    } else {
        Cow::Borrowed(value)
    }
}

/// Builds one tab-separated, newline-terminated line.
#[derive(Debug, Default)]
pub(crate) struct LineBuilder {
    line: String,
    fields: usize,
}

impl LineBuilder {
    pub(crate) fn push(&mut self, field: &str) {
        if self.fields > 0 {
            self.line.push(FIELD_SEPARATOR);
        }
        self.line.push_str(&normalize_field(field));
        self.fields += 1;
    }

    pub(crate) fn finish(mut self) -> String {
        self.line.push(LINE_TERMINATOR);
        self.line
    }
}

/// Append-only table text: the header line followed by row lines.
#[derive(Clone, Debug)]
pub(crate) struct TableBuffer {
    text: String,
    rows: usize,
}

impl TableBuffer {
    pub(crate) fn with_header<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        let mut header = LineBuilder::default();
        for field in fields {
            header.push(field);
        }
        Self {
            text: format!("{TABLE_MAGIC_TAG}{}", header.finish()),
            rows: 0,
        }
    }

    pub(crate) fn push_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.rows += 1;
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.text
    }

    pub(crate) fn row_count(&self) -> usize {
        self.rows
    }

    /// Final payload: the table, or the fallback notice when no interval was
    /// ever defined.
    pub(crate) fn into_final(self, any_interval_defined: bool) -> String {
        if any_interval_defined {
            self.text
        } else {
            FALLBACK_NOTICE.to_owned()
        }
    }
}
