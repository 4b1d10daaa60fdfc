use clap::Parser;

/// Explores tabular survey exports: per-question response distributions
/// and agreement/engagement KPIs, with categorical filters.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (directory path) The root directory holding the survey export files.
    #[clap(short, long, value_parser, default_value = ".")]
    pub data_dir: String,

    /// The dataset kind to explore. One of: disciplina-presencial,
    /// disciplina-ead, curso, institucional.
    #[clap(short = 'k', long, value_parser)]
    pub dataset: String,

    /// A filter selection of the form COLUMN=value1,value2. May be repeated;
    /// selections compose by AND across columns. Only columns of the chosen
    /// dataset's filter schema are accepted.
    #[clap(short, long, value_parser)]
    pub filter: Vec<String>,

    /// If specified, restricts the report to a single question: a column
    /// name for wide tables, a question label for long (PERGUNTA/RESPOSTA)
    /// tables.
    #[clap(short, long, value_parser)]
    pub question: Option<String>,

    /// (file path) A reference report in JSON format. If provided, svexplore
    /// will check that the produced report matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) Where to write the JSON report.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
