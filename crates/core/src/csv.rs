//! Minimal CSV writer for exports.
//!
//! Text cells are always double-quoted with internal quotes doubled; numbers
//! and dates are written bare. Dates use `YYYY-MM-DD`.

use crate::types::Timestamp;

/// A single CSV cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(String),
    Date(Option<Timestamp>),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn number(value: impl ToString) -> Self {
        Self::Number(value.to_string())
    }

    pub fn date(value: Timestamp) -> Self {
        Self::Date(Some(value))
    }

    fn render(&self) -> String {
        match self {
            Self::Text(s) => quote(s),
            Self::Number(n) => n.clone(),
            Self::Date(Some(ts)) => format_date(ts),
            Self::Date(None) => String::new(),
        }
    }
}

/// Wrap `s` in double quotes, doubling any quote inside it.
pub fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Render a timestamp as `YYYY-MM-DD`.
pub fn format_date(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// Accumulates rows under a fixed header line.
#[derive(Debug, Clone)]
pub struct CsvBuilder {
    output: String,
}

impl CsvBuilder {
    /// Start a document. Header names are written verbatim, comma-joined.
    pub fn new(header: &[&str]) -> Self {
        let mut output = header.join(",");
        output.push('\n');
        Self { output }
    }

    pub fn push_row(&mut self, cells: &[Cell]) {
        let line: Vec<String> = cells.iter().map(Cell::render).collect();
        self.output.push_str(&line.join(","));
        self.output.push('\n');
    }

    pub fn finish(self) -> String {
        self.output
    }
}
