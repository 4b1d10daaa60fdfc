use log::{debug, info, warn};

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use snafu::{prelude::*, Snafu};
use text_diff::print_diff;

use survey_tables::*;

use crate::args::Args;
use crate::explorer::catalog::{DatasetKind, FALLBACK_FILE};

pub mod catalog;
pub mod io_csv;

#[derive(Debug, Snafu)]
pub enum ExplorerError {
    #[snafu(display("No readable source for dataset: {path}"))]
    SourceNotFound { path: String },
    #[snafu(display("Could not decode {path} with any of the known encodings"))]
    UnreadableSource { path: String },
    #[snafu(display("Error reading source file {path}"))]
    ReadingSource {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing CSV content"))]
    CsvParse { source: csv::Error },
    #[snafu(display("Unknown dataset kind: {label}"))]
    UnknownDataset { label: String },
    #[snafu(display("Malformed filter selection: {spec} (expected COLUMN=value1,value2)"))]
    BadFilterSpec { spec: String },
    #[snafu(display("Filter column {column} is not in the filter schema of dataset {label}"))]
    FilterNotInSchema { column: String, label: String },
    #[snafu(display("Error in table operation"))]
    Table { source: TableErrors },
    #[snafu(display("Error opening reference file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error serializing report"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing report to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ExplorerResult<T> = Result<T, ExplorerError>;

/// Process-owned cache of loaded survey tables, keyed by the kind's
/// primary file name. Entries are populated on first successful load and
/// never invalidated within a session; a failed load leaves the cache
/// untouched.
pub struct DatasetStore {
    root: PathBuf,
    cache: HashMap<String, Table>,
}

impl DatasetStore {
    pub fn new(root: impl Into<PathBuf>) -> DatasetStore {
        DatasetStore {
            root: root.into(),
            cache: HashMap::new(),
        }
    }

    pub fn load(&mut self, kind: DatasetKind) -> ExplorerResult<&Table> {
        let key = kind.file_name();
        if !self.cache.contains_key(key) {
            let path = self.resolve(kind)?;
            info!("Attempting to read survey file {:?}", path);
            let table = io_csv::read_table(&path)?;
            debug!(
                "load: {} rows, columns: {:?}",
                table.num_rows(),
                table.column_names()
            );
            self.cache.insert(key.to_string(), table);
        }
        match self.cache.get(key) {
            Some(t) => Ok(t),
            None => whatever!("dataset {} missing from cache after load", key),
        }
    }

    fn resolve(&self, kind: DatasetKind) -> ExplorerResult<PathBuf> {
        let primary = self.root.join(kind.file_name());
        if primary.exists() {
            return Ok(primary);
        }
        let fallback = self.root.join(FALLBACK_FILE);
        if fallback.exists() {
            warn!(
                "source {:?} not found, using demo file {:?}",
                primary, fallback
            );
            return Ok(fallback);
        }
        SourceNotFoundSnafu {
            path: primary.display().to_string(),
        }
        .fail()
    }
}

fn parse_filter_selection(spec: &str) -> ExplorerResult<FilterSelection> {
    let (column, values) = spec.split_once('=').context(BadFilterSpecSnafu { spec })?;
    let column = column.trim();
    if column.is_empty() {
        return BadFilterSpecSnafu { spec }.fail();
    }
    let accepted: Vec<String> = values
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    Ok(FilterSelection {
        column: column.to_string(),
        accepted,
    })
}

fn parse_selections(kind: DatasetKind, specs: &[String]) -> ExplorerResult<Vec<FilterSelection>> {
    let mut selections: Vec<FilterSelection> = Vec::new();
    for spec in specs {
        let sel = parse_filter_selection(spec)?;
        if !kind.filter_columns().contains(&sel.column.as_str()) {
            return FilterNotInSchemaSnafu {
                column: sel.column,
                label: kind.label().to_string(),
            }
            .fail();
        }
        selections.push(sel);
    }
    Ok(selections)
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct ReportFilter {
    column: String,
    applied: Vec<String>,
    options: Vec<String>,
}

fn distribution_to_js(entries: &[DistributionEntry]) -> Vec<JSValue> {
    entries
        .iter()
        .map(|e| json!({"label": e.label, "count": e.count, "share": e.share}))
        .collect()
}

fn kpis_to_js(report: &KpiReport) -> JSValue {
    let metrics: Vec<JSValue> = report
        .metrics
        .iter()
        .map(|m| json!({"label": m.label, "fraction": m.fraction}))
        .collect();
    json!({"vocabulary": report.vocabulary, "metrics": metrics})
}

// One question block of the report. A failure here is contained: the
// entry carries the error message and the rest of the report proceeds.
fn question_report(question: &str, table: &Table, target_column: &str) -> JSValue {
    let summary = distribution(table, target_column)
        .and_then(|dist| Ok((dist, table.text_values(target_column)?)));
    match summary {
        Ok((dist, values)) => {
            let report = kpis(&values);
            json!({
                "question": question,
                "kpis": kpis_to_js(&report),
                "distribution": distribution_to_js(&dist),
            })
        }
        Err(e) => {
            warn!("question_report: {}: {}", question, e);
            json!({"question": question, "error": e.to_string()})
        }
    }
}

fn build_report(
    kind: DatasetKind,
    full_table: &Table,
    filtered: &Table,
    selections: &[FilterSelection],
    question: Option<&str>,
) -> ExplorerResult<JSValue> {
    // Filter echo: option lists come from the full per-kind table, not
    // from the filtered view.
    let mut filters: Vec<ReportFilter> = Vec::new();
    for col in kind.filter_columns() {
        if full_table.column(col).is_none() {
            debug!("build_report: schema column {} not in table, skipping", col);
            continue;
        }
        let options = filter_options(full_table, col).context(TableSnafu {})?;
        let applied = selections
            .iter()
            .find(|s| s.column == *col)
            .map(|s| s.accepted.clone())
            .unwrap_or_default();
        filters.push(ReportFilter {
            column: col.to_string(),
            applied,
            options,
        });
    }

    let shape = detect_shape(filtered);
    let mut questions: Vec<JSValue> = Vec::new();
    let shape_js: JSValue;
    match &shape {
        TableShape::Long {
            question_column,
            answer_column,
        } => {
            shape_js = json!({
                "long": {"question_column": question_column, "answer_column": answer_column}
            });
            let labels = question_labels(filtered, question_column).context(TableSnafu {})?;
            info!("build_report: long table with {} questions", labels.len());
            let selected: Vec<String> = match question {
                Some(q) if labels.iter().any(|l| l == q) => vec![q.to_string()],
                Some(q) => {
                    warn!("build_report: question label not found: {}", q);
                    questions.push(json!({
                        "question": q,
                        "error": format!("question label not found: {}", q),
                    }));
                    vec![]
                }
                None => labels,
            };
            for label in selected {
                let slice = apply_filters(
                    filtered,
                    &[FilterSelection {
                        column: question_column.clone(),
                        accepted: vec![label.clone()],
                    }],
                );
                questions.push(question_report(&label, &slice, answer_column));
            }
        }
        TableShape::Wide => {
            shape_js = json!("wide");
            let candidates = question_columns(filtered);
            info!(
                "build_report: wide table with {} question columns",
                candidates.len()
            );
            let selected: Vec<String> = match question {
                Some(q) => vec![q.to_string()],
                None => candidates,
            };
            for q in selected {
                questions.push(question_report(&q, filtered, &q));
            }
        }
    }

    let mut report = json!({
        "source": {"dataset": kind.label(), "file": kind.file_name()},
        "rows": filtered.num_rows(),
        "shape": shape_js,
        "filters": filters,
        "questions": questions,
    });
    if report["questions"]
        .as_array()
        .map(|a| a.is_empty())
        .unwrap_or(false)
    {
        report["note"] = json!("no questions detected");
    }
    Ok(report)
}

fn read_reference(path: &str) -> ExplorerResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

pub fn run_report(args: &Args) -> ExplorerResult<()> {
    let kind = DatasetKind::from_label(args.dataset.as_str()).context(UnknownDatasetSnafu {
        label: args.dataset.clone(),
    })?;
    let selections = parse_selections(kind, &args.filter)?;

    let mut store = DatasetStore::new(args.data_dir.clone());
    let table = store.load(kind)?;
    let filtered = apply_filters(table, &selections);
    debug!(
        "run_report: {} of {} rows retained after filters",
        filtered.num_rows(),
        table.num_rows()
    );

    let report = build_report(kind, table, &filtered, &selections, args.question.as_deref())?;
    let pretty = serde_json::to_string_pretty(&report).context(ParsingJsonSnafu {})?;

    // The reference report, if provided for comparison.
    if let Some(reference_path) = &args.reference {
        let reference = read_reference(reference_path)?;
        let pretty_reference =
            serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_reference != pretty {
            warn!("Found differences with the reference report");
            print_diff(pretty_reference.as_str(), pretty.as_str(), "\n");
            whatever!("Difference detected between produced report and reference report");
        }
    }

    match args.out.as_deref() {
        None | Some("stdout") => println!("{}", pretty),
        Some(path) => fs::write(path, &pretty).context(WritingOutputSnafu { path })?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    fn temp_root(tag: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!("svexplore-{}-{}", std::process::id(), tag));
        if p.exists() {
            fs::remove_dir_all(&p).unwrap();
        }
        fs::create_dir_all(&p).unwrap();
        p
    }

    fn write_bytes(root: &Path, name: &str, bytes: &[u8]) {
        fs::write(root.join(name), bytes).unwrap();
    }

    #[test]
    fn loads_utf8_export_and_fills_missing_cells() {
        let root = temp_root("utf8");
        write_bytes(
            &root,
            "Av_Curso.csv",
            b"DEPARTAMENTO,CURSO,OPINIAO\nExatas,F\xC3\xADsica,Concordo\nExatas,Qu\xC3\xADmica,\n",
        );
        let mut store = DatasetStore::new(&root);
        let table = store.load(DatasetKind::Program).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(
            table.text_values("OPINIAO").unwrap(),
            vec!["Concordo".to_string(), NO_RESPONSE.to_string()]
        );
        assert_eq!(
            table.text_values("CURSO").unwrap(),
            vec!["Física".to_string(), "Química".to_string()]
        );
    }

    #[test]
    fn falls_back_to_latin1_decoding() {
        let root = temp_root("latin1");
        // "Física" and "Reitoria" in latin-1: \xED is not valid UTF-8.
        write_bytes(
            &root,
            "Av_Institucional.csv",
            b"LOTACAO,RESPOSTA\nF\xEDsica,Sim\nReitoria,N\xE3o\n",
        );
        let mut store = DatasetStore::new(&root);
        let table = store.load(DatasetKind::Institution).unwrap();
        assert_eq!(
            table.text_values("LOTACAO").unwrap(),
            vec!["Física".to_string(), "Reitoria".to_string()]
        );
        assert_eq!(
            table.text_values("RESPOSTA").unwrap(),
            vec!["Sim".to_string(), "Não".to_string()]
        );
    }

    #[test]
    fn missing_primary_uses_the_demo_file() {
        let root = temp_root("fallback");
        write_bytes(&root, FALLBACK_FILE, b"RESPOSTA\nSim\n");
        let mut store = DatasetStore::new(&root);
        let table = store.load(DatasetKind::Program).unwrap();
        assert_eq!(table.num_rows(), 1);
    }

    #[test]
    fn missing_source_and_demo_file_fails() {
        let root = temp_root("missing");
        let mut store = DatasetStore::new(&root);
        let res = store.load(DatasetKind::Program);
        assert!(matches!(res, Err(ExplorerError::SourceNotFound { .. })));
        assert!(store.cache.is_empty());
    }

    #[test]
    fn repeated_loads_are_served_from_the_cache() {
        let root = temp_root("cache");
        write_bytes(&root, "Av_Curso.csv", b"RESPOSTA\nSim\n");
        let mut store = DatasetStore::new(&root);
        store.load(DatasetKind::Program).unwrap();
        assert_eq!(store.cache.len(), 1);
        // The source disappearing does not affect an already-populated
        // cache entry.
        fs::remove_file(root.join("Av_Curso.csv")).unwrap();
        let table = store.load(DatasetKind::Program).unwrap();
        assert_eq!(table.num_rows(), 1);
    }

    #[test]
    fn filter_specs_parse_and_check_the_schema() {
        let sel = parse_filter_selection("DEPARTAMENTO=Exatas, Humanas").unwrap();
        assert_eq!(sel.column, "DEPARTAMENTO");
        assert_eq!(
            sel.accepted,
            vec!["Exatas".to_string(), "Humanas".to_string()]
        );
        assert!(matches!(
            parse_filter_selection("DEPARTAMENTO"),
            Err(ExplorerError::BadFilterSpec { .. })
        ));
        assert!(matches!(
            parse_selections(
                DatasetKind::Institution,
                &["CURSO=Física".to_string()]
            ),
            Err(ExplorerError::FilterNotInSchema { .. })
        ));
        assert!(parse_selections(
            DatasetKind::Institution,
            &["LOTACAO=Reitoria".to_string()]
        )
        .is_ok());
    }

    #[test]
    fn wide_report_covers_text_columns_and_honors_filters() {
        let root = temp_root("wide");
        write_bytes(
            &root,
            "Av_Curso.csv",
            b"DEPARTAMENTO,OPINIAO\nExatas,Concordo\nExatas,Discordo\nHumanas,Concordo\n",
        );
        let args = Args {
            data_dir: root.display().to_string(),
            dataset: "curso".to_string(),
            filter: vec!["DEPARTAMENTO=Exatas".to_string()],
            question: Some("OPINIAO".to_string()),
            reference: None,
            out: Some(root.join("report.json").display().to_string()),
            verbose: false,
        };
        run_report(&args).unwrap();

        let report: JSValue =
            serde_json::from_str(&fs::read_to_string(root.join("report.json")).unwrap()).unwrap();
        assert_eq!(report["shape"], json!("wide"));
        assert_eq!(report["rows"], json!(2));
        // Options come from the full table, not the filtered view.
        assert_eq!(
            report["filters"][0]["options"],
            json!(["Exatas", "Humanas"])
        );
        let q = &report["questions"][0];
        assert_eq!(q["question"], json!("OPINIAO"));
        assert_eq!(q["kpis"]["vocabulary"], json!("agreement"));
        assert_eq!(q["kpis"]["metrics"][0]["label"], json!("Agree"));
        assert_eq!(q["kpis"]["metrics"][0]["fraction"], json!(0.5));
        assert_eq!(q["distribution"][0]["count"], json!(1));
    }

    #[test]
    fn long_report_slices_by_question_label() {
        let root = temp_root("long");
        write_bytes(
            &root,
            "Av_Institucional.csv",
            b"LOTACAO,PERGUNTA,RESPOSTA\nReitoria,Q1,Sim\nReitoria,Q1,N\xC3\xA3o\nReitoria,Q2,Sim\n",
        );
        let args = Args {
            data_dir: root.display().to_string(),
            dataset: "institucional".to_string(),
            filter: vec![],
            question: None,
            reference: None,
            out: Some(root.join("report.json").display().to_string()),
            verbose: false,
        };
        run_report(&args).unwrap();

        let report: JSValue =
            serde_json::from_str(&fs::read_to_string(root.join("report.json")).unwrap()).unwrap();
        assert_eq!(
            report["shape"]["long"]["question_column"],
            json!("PERGUNTA")
        );
        let questions = report["questions"].as_array().unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0]["question"], json!("Q1"));
        assert_eq!(questions[0]["kpis"]["vocabulary"], json!("yes-no"));
        assert_eq!(questions[0]["distribution"][0]["share"], json!(0.5));
        assert_eq!(questions[1]["question"], json!("Q2"));
        assert_eq!(questions[1]["distribution"][0]["share"], json!(1.0));
    }

    #[test]
    fn unknown_question_is_contained_in_its_entry() {
        let root = temp_root("badq");
        write_bytes(&root, "Av_Curso.csv", b"OPINIAO\nConcordo\n");
        let mut store = DatasetStore::new(&root);
        let table = store.load(DatasetKind::Program).unwrap().clone();
        let report =
            build_report(DatasetKind::Program, &table, &table, &[], Some("MISSING")).unwrap();
        let q = &report["questions"][0];
        assert_eq!(q["question"], json!("MISSING"));
        assert!(q["error"].as_str().unwrap().contains("MISSING"));
        // The containment is per question, not per report.
        assert_eq!(report["rows"], json!(1));
    }

    #[test]
    fn table_without_text_columns_reports_an_empty_state() {
        let root = temp_root("noq");
        write_bytes(&root, "Av_Curso.csv", b"NOTA,MEDIA\n1,2\n3,4\n");
        let mut store = DatasetStore::new(&root);
        let table = store.load(DatasetKind::Program).unwrap().clone();
        let report = build_report(DatasetKind::Program, &table, &table, &[], None).unwrap();
        assert!(report["questions"].as_array().unwrap().is_empty());
        assert_eq!(report["note"], json!("no questions detected"));
    }

    #[test]
    fn reference_comparison_detects_drift() {
        let root = temp_root("reference");
        write_bytes(&root, "Av_Curso.csv", b"OPINIAO\nConcordo\n");
        let out_path = root.join("report.json").display().to_string();
        let args = Args {
            data_dir: root.display().to_string(),
            dataset: "curso".to_string(),
            filter: vec![],
            question: None,
            reference: None,
            out: Some(out_path.clone()),
            verbose: false,
        };
        run_report(&args).unwrap();

        // The produced report matches itself as a reference.
        let args_check = Args {
            reference: Some(out_path.clone()),
            ..args.clone()
        };
        run_report(&args_check).unwrap();

        // A diverging reference is an error.
        write_bytes(&root, "other.json", b"{\"rows\": 999}");
        let args_bad = Args {
            reference: Some(root.join("other.json").display().to_string()),
            ..args
        };
        assert!(run_report(&args_bad).is_err());
    }
}
