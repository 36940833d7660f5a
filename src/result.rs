//! The pagination envelope handed back by a session.
//!
//! Every result fits on one page; the paging accessors exist so code written
//! against a real driver can iterate pages without special-casing.

use crate::value::{Row, Value};

/// An ordered list of result rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultPage {
    rows: Vec<Row>,
}

impl ResultPage {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always true; results are never split across pages.
    pub fn last_page(&self) -> bool {
        true
    }

    pub fn next_page(&self) -> Option<ResultPage> {
        None
    }

    pub fn paging_state(&self) -> Option<Vec<u8>> {
        None
    }

    /// The `[applied]` flag of a conditional write, when present. A page
    /// without the column (unconditional writes, reads) reports true.
    pub fn applied(&self) -> bool {
        match self.rows.first().and_then(|row| row.get("[applied]")) {
            Some(Value::Bool(applied)) => *applied,
            _ => true,
        }
    }

    /// A single-row page carrying only the `[applied]` flag.
    pub(crate) fn applied_page(applied: bool) -> Self {
        let mut row = Row::new();
        row.insert("[applied]".to_string(), Value::Bool(applied));
        Self { rows: vec![row] }
    }
}

impl std::ops::Deref for ResultPage {
    type Target = [Row];

    fn deref(&self) -> &[Row] {
        &self.rows
    }
}

impl IntoIterator for ResultPage {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultPage {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
