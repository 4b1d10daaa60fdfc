//! Shape detection, filtering and response aggregation for survey tables.
//!
//! A [Table] is built from raw delimited records, classified as wide (one
//! column per question) or long/tidy (PERGUNTA/RESPOSTA columns), filtered
//! down with [apply_filters], and summarized per question with
//! [distribution] and [kpis].
//!
//! ```
//! use survey_tables::*;
//!
//! let header: Vec<String> = vec!["RESPOSTA".to_string()];
//! let rows: Vec<Vec<String>> = vec![
//!     vec!["Sim".to_string()],
//!     vec!["Sim".to_string()],
//!     vec!["Não".to_string()],
//! ];
//! let table = Table::from_records(&header, &rows);
//!
//! assert_eq!(detect_shape(&table), TableShape::Wide);
//! let dist = distribution(&table, "RESPOSTA")?;
//! assert_eq!(dist[0].label, "Sim");
//! assert_eq!(dist[0].count, 2);
//! # Ok::<(), TableErrors>(())
//! ```

mod config;
mod table;

use log::debug;

use std::collections::{HashMap, HashSet};

pub use crate::config::*;
pub use crate::table::*;

// Reserved column names that mark a long/tidy table, compared
// case-insensitively.
const QUESTION_COLUMN: &str = "PERGUNTA";
const ANSWER_COLUMN: &str = "RESPOSTA";

/// Classifies a table as wide or long.
///
/// A table is long iff its column names contain, case-insensitively, both
/// the question-label column (`PERGUNTA`) and the response-value column
/// (`RESPOSTA`). The actual-cased names are returned. This is a pure
/// function over the column-name set and is independent of column order.
pub fn detect_shape(table: &Table) -> TableShape {
    let question = find_column_ci(table, QUESTION_COLUMN);
    let answer = find_column_ci(table, ANSWER_COLUMN);
    match (question, answer) {
        (Some(q), Some(a)) => TableShape::Long {
            question_column: q,
            answer_column: a,
        },
        _ => TableShape::Wide,
    }
}

fn find_column_ci(table: &Table, name: &str) -> Option<String> {
    table
        .column_names()
        .iter()
        .find(|c| c.eq_ignore_ascii_case(name))
        .map(|c| c.to_string())
}

/// The question candidates of a wide table: every text column, in table
/// order. No ID or timestamp-like columns are excluded. An empty result
/// means "nothing to display", not an error.
pub fn question_columns(table: &Table) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|c| c.data.is_text())
        .map(|c| c.name.clone())
        .collect()
}

/// The distinct question labels of a long table, in first-observed order.
pub fn question_labels(table: &Table, question_column: &str) -> Result<Vec<String>, TableErrors> {
    let values = table.text_values(question_column)?;
    let mut seen: HashSet<String> = HashSet::new();
    let mut labels: Vec<String> = Vec::new();
    for v in values {
        if seen.insert(v.clone()) {
            labels.push(v);
        }
    }
    Ok(labels)
}

/// Applies the selections to the table, AND-composing across columns.
///
/// A selection whose column is absent from the table is silently skipped,
/// and an empty accepted set is no constraint. The input table is never
/// mutated; re-applying identical selections is a no-op.
pub fn apply_filters(table: &Table, selections: &[FilterSelection]) -> Table {
    let mut mask: Option<Vec<bool>> = None;
    for sel in selections {
        if sel.accepted.is_empty() {
            continue;
        }
        let values = match table.text_values(&sel.column) {
            Ok(vs) => vs,
            Err(_) => {
                debug!("apply_filters: column {} not in table, skipping", sel.column);
                continue;
            }
        };
        let accepted: HashSet<&str> = sel.accepted.iter().map(|s| s.as_str()).collect();
        let m = mask.get_or_insert_with(|| vec![true; table.num_rows()]);
        for (row, v) in values.iter().enumerate() {
            m[row] = m[row] && accepted.contains(v.as_str());
        }
    }
    match mask {
        Some(m) => table.retain_rows(&m),
        None => table.clone(),
    }
}

/// The candidate option list for one filter column: the sorted distinct
/// stringified values present in the given table.
pub fn filter_options(table: &Table, column: &str) -> Result<Vec<String>, TableErrors> {
    let mut options: Vec<String> = table
        .text_values(column)?
        .into_iter()
        .collect::<HashSet<String>>()
        .into_iter()
        .collect();
    options.sort();
    Ok(options)
}

/// Groups the rows of `column` by exact stringified value and counts each
/// group. Every entry carries the raw count and the share of the rows in
/// [0, 1]; the shares of a non-empty table sum to 1.
///
/// Entries come out largest group first (the presentation contract for
/// bar charts), with ties broken by first observation in the data. An
/// empty table yields an empty distribution; an unknown column is an
/// error.
pub fn distribution(table: &Table, column: &str) -> Result<Vec<DistributionEntry>, TableErrors> {
    let values = table.text_values(column)?;
    let total = values.len();
    let mut counts: HashMap<&str, (u64, usize)> = HashMap::new();
    for (row, v) in values.iter().enumerate() {
        let e = counts.entry(v.as_str()).or_insert((0, row));
        e.0 += 1;
    }
    let mut groups: Vec<(&str, u64, usize)> =
        counts.iter().map(|(v, (c, first))| (*v, *c, *first)).collect();
    groups.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    debug!("distribution: {} groups over {} rows", groups.len(), total);
    Ok(groups
        .iter()
        .map(|(label, count, _)| DistributionEntry {
            label: label.to_string(),
            count: *count,
            share: (*count as f64) / (total as f64).max(1.0),
        })
        .collect())
}

// ********* KPI classification **********

// How one metric recognizes a normalized response value.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ValueMatcher {
    /// The value is exactly one of these.
    Exact(&'static [&'static str]),
    /// The value contains this substring. Deliberate for compound labels
    /// such as "Concordo totalmente".
    Contains(&'static str),
}

impl ValueMatcher {
    fn matches(&self, value: &str) -> bool {
        match self {
            ValueMatcher::Exact(labels) => labels.contains(&value),
            ValueMatcher::Contains(needle) => value.contains(needle),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct KpiMetric {
    pub label: &'static str,
    pub matcher: ValueMatcher,
}

/// One response vocabulary and the metrics it produces.
///
/// A vocabulary triggers when the distinct normalized value set contains
/// at least one of `any_exact` and no member containing any of
/// `none_contains`. An empty `any_exact` list always triggers, which
/// makes the last table entry the catch-all: classification is mutually
/// exclusive (first match wins) and exhaustive.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct KpiVocabulary {
    pub name: &'static str,
    any_exact: &'static [&'static str],
    none_contains: &'static [&'static str],
    pub metrics: &'static [KpiMetric],
}

impl KpiVocabulary {
    fn applies(&self, distinct: &HashSet<&str>) -> bool {
        let triggered =
            self.any_exact.is_empty() || self.any_exact.iter().any(|v| distinct.contains(v));
        let vetoed = self
            .none_contains
            .iter()
            .any(|needle| distinct.iter().any(|v| v.contains(needle)));
        triggered && !vetoed
    }
}

/// The vocabulary rule table, checked in order. New vocabularies are
/// added here, not in control flow.
pub const KPI_VOCABULARIES: &[KpiVocabulary] = &[
    KpiVocabulary {
        name: "yes-no",
        any_exact: &["sim", "não", "nao"],
        none_contains: &["concordo"],
        metrics: &[
            KpiMetric {
                label: "Yes",
                matcher: ValueMatcher::Exact(&["sim"]),
            },
            KpiMetric {
                label: "No",
                matcher: ValueMatcher::Exact(&["não", "nao"]),
            },
        ],
    },
    KpiVocabulary {
        name: "agreement",
        any_exact: &[],
        none_contains: &[],
        metrics: &[
            KpiMetric {
                label: "Agree",
                matcher: ValueMatcher::Contains("concordo"),
            },
            KpiMetric {
                label: "Disagree",
                matcher: ValueMatcher::Contains("discordo"),
            },
            KpiMetric {
                label: "Don't know",
                matcher: ValueMatcher::Contains("desconheço"),
            },
        ],
    },
];

/// Computes the KPI fractions for a series of response values.
///
/// Values are normalized to lower-cased, trimmed text, then the first
/// vocabulary of [KPI_VOCABULARIES] whose trigger matches the distinct
/// value set is applied. The fractions need not sum to 1 (unmatched
/// values count toward no metric). An empty series yields the catch-all
/// vocabulary with every fraction at zero, never a division by zero.
pub fn kpis(values: &[String]) -> KpiReport {
    let normalized: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .collect();
    let distinct: HashSet<&str> = normalized.iter().map(|v| v.as_str()).collect();
    let vocabulary = KPI_VOCABULARIES
        .iter()
        .find(|voc| voc.applies(&distinct))
        .unwrap_or(&KPI_VOCABULARIES[KPI_VOCABULARIES.len() - 1]);
    debug!(
        "kpis: {} values classified under vocabulary {}",
        values.len(),
        vocabulary.name
    );
    let total = normalized.len();
    let metrics = vocabulary
        .metrics
        .iter()
        .map(|m| {
            let matched = normalized.iter().filter(|v| m.matcher.matches(v)).count();
            KpiValue {
                label: m.label,
                fraction: if total == 0 {
                    0.0
                } else {
                    (matched as f64) / (total as f64)
                },
            }
        })
        .collect();
    KpiReport {
        vocabulary: vocabulary.name,
        metrics,
    }
}
