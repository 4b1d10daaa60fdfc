use crate::config::TableErrors;

/// Sentinel stored in text columns for missing or blank cells.
pub const NO_RESPONSE: &str = "Não Respondido";

// A column is numeric when at least this fraction of its non-empty cells
// parses as a number.
const NUMERIC_INFERENCE_THRESHOLD: f64 = 0.95;

#[derive(PartialEq, Debug, Clone)]
pub enum ColumnData {
    Text(Vec<String>),
    Number(Vec<f64>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(vs) => vs.len(),
            ColumnData::Number(vs) => vs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ColumnData::Text(_))
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// An immutable, column-oriented table. All columns have the same number
/// of rows; rows are positionally aligned across columns. Derived tables
/// (filtered or sliced) are fresh values, the source is never mutated.
#[derive(PartialEq, Debug, Clone)]
pub struct Table {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Table, TableErrors> {
        let num_rows = columns.first().map(|c| c.data.len()).unwrap_or(0);
        for c in columns.iter() {
            if c.data.len() != num_rows {
                return Err(TableErrors::MismatchedColumns {
                    column: c.name.clone(),
                    expected: num_rows,
                    found: c.data.len(),
                });
            }
        }
        Ok(Table { columns, num_rows })
    }

    /// Builds a table from a header row and raw string records, running
    /// the one-shot schema inference pass and the missing-value
    /// normalization.
    ///
    /// A column types as numeric when at least 95% of its non-empty cells
    /// parse as a number; the tag is assigned once here and never
    /// re-inspected. Missing cells (blank text, short records) become the
    /// [NO_RESPONSE] sentinel in text columns and 0 in numeric columns.
    pub fn from_records(header: &[String], rows: &[Vec<String>]) -> Table {
        let mut columns: Vec<Column> = Vec::with_capacity(header.len());
        for (idx, name) in header.iter().enumerate() {
            let cells: Vec<&str> = rows
                .iter()
                .map(|r| r.get(idx).map(|s| s.as_str()).unwrap_or(""))
                .collect();
            let data = if infer_is_number(&cells) {
                ColumnData::Number(
                    cells
                        .iter()
                        .map(|c| c.trim().parse::<f64>().unwrap_or(0.0))
                        .collect(),
                )
            } else {
                ColumnData::Text(
                    cells
                        .iter()
                        .map(|c| {
                            if c.trim().is_empty() {
                                NO_RESPONSE.to_string()
                            } else {
                                c.to_string()
                            }
                        })
                        .collect(),
                )
            };
            columns.push(Column {
                name: name.clone(),
                data,
            });
        }
        Table {
            columns,
            num_rows: rows.len(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// The stringified values of a column, regardless of its type tag.
    /// Integral numbers render without a trailing decimal part.
    pub fn text_values(&self, name: &str) -> Result<Vec<String>, TableErrors> {
        let col = self
            .column(name)
            .ok_or_else(|| TableErrors::ColumnNotFound(name.to_string()))?;
        let res = match &col.data {
            ColumnData::Text(vs) => vs.clone(),
            ColumnData::Number(vs) => vs.iter().map(|x| format_number(*x)).collect(),
        };
        Ok(res)
    }

    /// A fresh table keeping the rows whose mask entry is true.
    /// The mask must cover every row.
    pub fn retain_rows(&self, mask: &[bool]) -> Table {
        let kept = mask.iter().filter(|m| **m).count();
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let data = match &c.data {
                    ColumnData::Text(vs) => ColumnData::Text(
                        vs.iter()
                            .zip(mask.iter())
                            .filter_map(|(v, m)| if *m { Some(v.clone()) } else { None })
                            .collect(),
                    ),
                    ColumnData::Number(vs) => ColumnData::Number(
                        vs.iter()
                            .zip(mask.iter())
                            .filter_map(|(v, m)| if *m { Some(*v) } else { None })
                            .collect(),
                    ),
                };
                Column {
                    name: c.name.clone(),
                    data,
                }
            })
            .collect();
        Table {
            columns,
            num_rows: kept,
        }
    }
}

fn infer_is_number(cells: &[&str]) -> bool {
    let non_empty: Vec<&&str> = cells.iter().filter(|c| !c.trim().is_empty()).collect();
    if non_empty.is_empty() {
        return false;
    }
    let parsed = non_empty
        .iter()
        .filter(|c| c.trim().parse::<f64>().is_ok())
        .count();
    (parsed as f64) >= NUMERIC_INFERENCE_THRESHOLD * (non_empty.len() as f64)
}

fn format_number(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    }
}
