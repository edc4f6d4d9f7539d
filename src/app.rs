use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::ResolvedConfig;
use crate::domain::{BareIdentifier, VersionedAccession};
use crate::error::{InputKind, PfamError};
use crate::fetch::{self, HmmFetcher};
use crate::hmmdb::{self, VersionIndex};
use crate::output::{OutputLayout, RunWorkspace, SubsetWriter, write_file_atomic};
use crate::table::{self, AnnotationTable};

#[derive(Debug, Clone)]
pub struct SubsetRequest {
    pub table: PathBuf,
    pub out_prefix: Utf8PathBuf,
    pub database: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubsetResult {
    pub column: usize,
    pub identifiers: usize,
    pub resolved: Vec<VersionedAccession>,
    pub unresolved: Vec<BareIdentifier>,
    pub fetched: Vec<VersionedAccession>,
    pub failed: Vec<FetchFailure>,
    pub fetcher: String,
    pub family_dir: String,
    pub subset_path: String,
    pub hmmpress: Option<bool>,
    pub finished_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    pub accession: VersionedAccession,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<F: HmmFetcher> {
    fetcher: F,
    config: ResolvedConfig,
    press_program: Option<PathBuf>,
}

impl<F: HmmFetcher> App<F> {
    pub fn new(fetcher: F, config: ResolvedConfig) -> Self {
        Self {
            fetcher,
            config,
            press_program: None,
        }
    }

    pub fn with_hmmpress_program(mut self, program: PathBuf) -> Self {
        self.press_program = Some(program);
        self
    }

    pub fn run(
        &self,
        request: &SubsetRequest,
        sink: &dyn ProgressSink,
    ) -> Result<SubsetResult, PfamError> {
        let started = Instant::now();

        let layout = OutputLayout::new(&request.out_prefix, &self.config.family_dir_name)?;
        table::validate_input(&request.table, InputKind::AnnotationTable)?;
        table::validate_input(&request.database, InputKind::ReferenceDatabase)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Validate; table={} database={}",
                request.table.display(),
                request.database.display()
            ),
            elapsed: None,
        });

        let annotation = AnnotationTable::open(&request.table)?;
        let column = match annotation.resolve_column(&self.config.column_aliases) {
            Ok(column) => column,
            Err(err) => {
                dump_headers(annotation.headers(), &self.config.column_aliases);
                return Err(err);
            }
        };
        sink.event(ProgressEvent {
            message: format!(
                "phase=Column; Pfam column {column} ({})",
                annotation.headers()[column - 1]
            ),
            elapsed: None,
        });

        let identifiers = annotation.identifiers(column)?;
        sink.event(ProgressEvent {
            message: format!("phase=Extract; {} unique Pfam identifiers", identifiers.len()),
            elapsed: Some(started.elapsed()),
        });

        let index = VersionIndex::build(&request.database)?;
        let resolution = hmmdb::resolve_versions(&identifiers, &index);
        if resolution.resolved.is_empty() {
            warn!("no identifier resolved to a versioned accession");
        }
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; {} accessions resolved, {} unresolved",
                resolution.resolved.len(),
                resolution.unresolved.len()
            ),
            elapsed: Some(started.elapsed()),
        });

        layout.ensure_dirs()?;
        // Removed on drop, whichever way the run ends.
        let workspace = RunWorkspace::create(layout.out_dir())?;
        let id_list = workspace.write_list("identifiers.txt", &identifiers)?;
        let acc_list = workspace.write_list("accessions.txt", &resolution.resolved)?;
        debug!(
            identifiers = %id_list.display(),
            accessions = %acc_list.display(),
            "wrote intermediate lists"
        );

        let (fetched, failed) = self.fetch_all(
            &request.database,
            &resolution.resolved,
            &layout,
            &workspace,
            sink,
        )?;
        if fetched.is_empty() {
            return Err(PfamError::EmptySubset {
                path: layout.subset_path().as_std_path().to_path_buf(),
            });
        }
        sink.event(ProgressEvent {
            message: format!(
                "phase=Fetch; fetched {} of {} records into {}",
                fetched.len(),
                resolution.resolved.len(),
                layout.subset_path()
            ),
            elapsed: Some(started.elapsed()),
        });

        let hmmpress = self
            .config
            .hmmpress
            .then(|| self.press_subset(layout.subset_path(), sink));

        Ok(SubsetResult {
            column,
            identifiers: identifiers.len(),
            resolved: resolution.resolved,
            unresolved: resolution.unresolved,
            fetched,
            failed,
            fetcher: self.fetcher.name().to_string(),
            family_dir: layout.family_dir().to_string(),
            subset_path: layout.subset_path().to_string(),
            hmmpress,
            finished_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn fetch_all(
        &self,
        database: &Path,
        accessions: &[VersionedAccession],
        layout: &OutputLayout,
        workspace: &RunWorkspace,
        sink: &dyn ProgressSink,
    ) -> Result<(Vec<VersionedAccession>, Vec<FetchFailure>), PfamError> {
        let mut subset = SubsetWriter::create(layout.subset_path())?;
        let mut fetched = Vec::new();
        let mut failed = Vec::new();

        for (idx, accession) in accessions.iter().enumerate() {
            let started = Instant::now();
            match self.fetcher.fetch(database, accession, workspace.path()) {
                Ok(record) => {
                    write_file_atomic(&layout.family_path(accession), &record)?;
                    subset.append(&record)?;
                    fetched.push(accession.clone());
                    sink.event(ProgressEvent {
                        message: format!(
                            "phase=Fetch; [{}/{}] {accession}",
                            idx + 1,
                            accessions.len()
                        ),
                        elapsed: Some(started.elapsed()),
                    });
                }
                Err(err) => {
                    warn!(accession = %accession, "{err}");
                    let message = match err {
                        PfamError::FetchFailed { message, .. } => message,
                        other => other.to_string(),
                    };
                    failed.push(FetchFailure {
                        accession: accession.clone(),
                        message,
                    });
                }
            }
        }

        subset.finish()?;
        Ok((fetched, failed))
    }

    fn press_subset(&self, subset: &Utf8Path, sink: &dyn ProgressSink) -> bool {
        let Some(program) = self
            .press_program
            .clone()
            .or_else(|| fetch::find_in_path("hmmpress"))
        else {
            warn!("skipping hmmpress: {}", PfamError::MissingTool("hmmpress".to_string()));
            return false;
        };

        let started = Instant::now();
        match fetch::hmmpress(&program, subset.as_std_path()) {
            Ok(()) => {
                sink.event(ProgressEvent {
                    message: format!("phase=Press; hmmpress {subset}"),
                    elapsed: Some(started.elapsed()),
                });
                true
            }
            Err(err) => {
                warn!("skipping hmmpress: {err}");
                false
            }
        }
    }
}

fn dump_headers(headers: &[String], aliases: &[String]) {
    error!(aliases = ?aliases, "none of the Pfam column aliases matched a header");
    for (idx, header) in headers.iter().enumerate() {
        error!(column = idx + 1, "header {header:?}");
    }
}
