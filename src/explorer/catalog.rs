// The fixed catalog of survey exports and their filter schemas.

/// Demo file used when the primary export of a kind is absent.
pub const FALLBACK_FILE: &str = "Arquivo.csv";

/// One of the fixed named survey sources. The kind selects both the file
/// to load and the filter schema exposed to the caller.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum DatasetKind {
    InPersonCourse,
    OnlineCourse,
    Program,
    Institution,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 4] = [
        DatasetKind::InPersonCourse,
        DatasetKind::OnlineCourse,
        DatasetKind::Program,
        DatasetKind::Institution,
    ];

    pub fn from_label(label: &str) -> Option<DatasetKind> {
        match label {
            "disciplina-presencial" => Some(DatasetKind::InPersonCourse),
            "disciplina-ead" => Some(DatasetKind::OnlineCourse),
            "curso" => Some(DatasetKind::Program),
            "institucional" => Some(DatasetKind::Institution),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DatasetKind::InPersonCourse => "disciplina-presencial",
            DatasetKind::OnlineCourse => "disciplina-ead",
            DatasetKind::Program => "curso",
            DatasetKind::Institution => "institucional",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            DatasetKind::InPersonCourse => "Av_Disciplinas_Presenciais.csv",
            DatasetKind::OnlineCourse => "Av_Disciplinas_EAD.csv",
            DatasetKind::Program => "Av_Curso.csv",
            DatasetKind::Institution => "Av_Institucional.csv",
        }
    }

    /// The categorical columns this kind exposes as filters. Columns
    /// absent from the loaded table are skipped at application time.
    pub fn filter_columns(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::InPersonCourse | DatasetKind::OnlineCourse => {
                &["DEPARTAMENTO", "SETOR_CURSO", "CURSO", "NOME_DISCIPLINA"]
            }
            DatasetKind::Program => &["DEPARTAMENTO", "SETOR_CURSO", "CURSO"],
            DatasetKind::Institution => &["LOTACAO"],
        }
    }
}
