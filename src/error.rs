use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::{BareIdentifier, VersionedAccession};

#[derive(Debug, Error, Diagnostic)]
pub enum PfamError {
    #[error("{kind} not found or not readable: {}", path.display())]
    #[diagnostic(code(pfam_subset::input_missing))]
    InputMissing { kind: InputKind, path: PathBuf },

    #[error("no Pfam column found; headers were: {}", format_headers(headers))]
    #[diagnostic(
        code(pfam_subset::column_not_found),
        help("pass --column <HEADER> or add the header to column_aliases in the config")
    )]
    ColumnNotFound { headers: Vec<String> },

    #[error("no valid Pfam identifiers (PFnnnnn) found in column {column}")]
    #[diagnostic(code(pfam_subset::no_identifiers))]
    NoIdentifiersFound { column: usize },

    #[error("no versioned accession for {0} in the reference database")]
    VersionNotFound(BareIdentifier),

    #[error("could not fetch {accession}: {message}")]
    FetchFailed {
        accession: VersionedAccession,
        message: String,
    },

    #[error("subset is empty, no HMM records were fetched: {}", path.display())]
    #[diagnostic(code(pfam_subset::empty_subset))]
    EmptySubset { path: PathBuf },

    #[error("output prefix needs a base name, got {0:?}")]
    #[diagnostic(
        code(pfam_subset::invalid_prefix),
        help("use <dir>/<name>, e.g. out/EC3.1.1.74")
    )]
    InvalidPrefix(String),

    #[error("invalid Pfam identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid Pfam accession: {0}")]
    InvalidAccession(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    AnnotationTable,
    ReferenceDatabase,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKind::AnnotationTable => write!(f, "annotation table"),
            InputKind::ReferenceDatabase => write!(f, "reference database"),
        }
    }
}

fn format_headers(headers: &[String]) -> String {
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| format!("{}:{header:?}", idx + 1))
        .collect::<Vec<_>>()
        .join(", ")
}
