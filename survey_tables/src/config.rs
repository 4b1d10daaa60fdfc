// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The shape of a survey table.
///
/// Wide tables carry one column per question. Long (tidy) tables carry one
/// row per (question, response) pair, with a dedicated question-label
/// column and a response-value column.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TableShape {
    Wide,
    Long {
        /// Actual-cased name of the question-label column.
        question_column: String,
        /// Actual-cased name of the response-value column.
        answer_column: String,
    },
}

/// A constraint on one column: keep the rows whose stringified value is a
/// member of `accepted`. An empty `accepted` list means "no constraint".
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FilterSelection {
    pub column: String,
    pub accepted: Vec<String>,
}

// ******** Output data structures *********

/// One bar of a response distribution.
#[derive(PartialEq, Debug, Clone)]
pub struct DistributionEntry {
    pub label: String,
    pub count: u64,
    /// Fraction of the rows carrying this label, in [0, 1].
    pub share: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct KpiValue {
    pub label: &'static str,
    pub fraction: f64,
}

/// The summary percentages for one question, under the vocabulary that
/// matched its response values.
#[derive(PartialEq, Debug, Clone)]
pub struct KpiReport {
    pub vocabulary: &'static str,
    pub metrics: Vec<KpiValue>,
}

/// Errors raised by table operations.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TableErrors {
    ColumnNotFound(String),
    MismatchedColumns {
        column: String,
        expected: usize,
        found: usize,
    },
}

impl Error for TableErrors {}

impl Display for TableErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableErrors::ColumnNotFound(name) => write!(f, "column not found: {}", name),
            TableErrors::MismatchedColumns {
                column,
                expected,
                found,
            } => write!(
                f,
                "column {} has {} rows, expected {}",
                column, found, expected
            ),
        }
    }
}
