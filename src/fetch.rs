use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::domain::{FetcherKind, VersionedAccession};
use crate::error::PfamError;
use crate::hmmdb;

pub trait HmmFetcher {
    fn name(&self) -> &str;

    /// Record bytes for exactly `accession`, or `FetchFailed`. Any scratch
    /// files go under `scratch`, which the caller owns and removes.
    fn fetch(
        &self,
        database: &Path,
        accession: &VersionedAccession,
        scratch: &Path,
    ) -> Result<Vec<u8>, PfamError>;
}

impl<T: HmmFetcher + ?Sized> HmmFetcher for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(
        &self,
        database: &Path,
        accession: &VersionedAccession,
        scratch: &Path,
    ) -> Result<Vec<u8>, PfamError> {
        (**self).fetch(database, accession, scratch)
    }
}

pub struct SystemHmmFetcher {
    program: PathBuf,
}

impl SystemHmmFetcher {
    pub fn new() -> Result<Self, PfamError> {
        let program =
            find_in_path("hmmfetch").ok_or_else(|| PfamError::MissingTool("hmmfetch".to_string()))?;
        Ok(Self::with_program(program))
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self { program }
    }
}

impl HmmFetcher for SystemHmmFetcher {
    fn name(&self) -> &str {
        "hmmfetch"
    }

    fn fetch(
        &self,
        database: &Path,
        accession: &VersionedAccession,
        scratch: &Path,
    ) -> Result<Vec<u8>, PfamError> {
        let out_path = scratch.join(accession.file_name());
        let args = vec![
            "-o".to_string(),
            out_path.to_string_lossy().to_string(),
            database.to_string_lossy().to_string(),
            accession.to_string(),
        ];
        let failed = |message: String| PfamError::FetchFailed {
            accession: accession.clone(),
            message,
        };

        debug!(program = %self.program.display(), ?args, "running hmmfetch");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|err| failed(err.to_string()))?;
        if !output.status.success() {
            let _ = fs::remove_file(&out_path);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("command failed: {}", self.program.display())
            } else {
                stderr
            };
            return Err(failed(message));
        }

        let bytes = fs::read(&out_path).unwrap_or_default();
        let _ = fs::remove_file(&out_path);
        if bytes.is_empty() {
            return Err(failed("hmmfetch produced no output".to_string()));
        }
        Ok(bytes)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlatFileFetcher;

impl HmmFetcher for FlatFileFetcher {
    fn name(&self) -> &str {
        "builtin"
    }

    fn fetch(
        &self,
        database: &Path,
        accession: &VersionedAccession,
        _scratch: &Path,
    ) -> Result<Vec<u8>, PfamError> {
        let reader = hmmdb::open_database(database)?;
        hmmdb::find_record(reader, &accession.to_string())?.ok_or_else(|| {
            PfamError::FetchFailed {
                accession: accession.clone(),
                message: "accession not found in database".to_string(),
            }
        })
    }
}

pub enum AnyFetcher {
    System(SystemHmmFetcher),
    FlatFile(FlatFileFetcher),
}

impl AnyFetcher {
    pub fn select(kind: FetcherKind) -> Result<Self, PfamError> {
        match kind {
            FetcherKind::Hmmfetch => Ok(Self::System(SystemHmmFetcher::new()?)),
            FetcherKind::Builtin => Ok(Self::FlatFile(FlatFileFetcher)),
            FetcherKind::Auto => match find_in_path("hmmfetch") {
                Some(program) => Ok(Self::System(SystemHmmFetcher::with_program(program))),
                None => {
                    debug!("hmmfetch not on PATH, using built-in record reader");
                    Ok(Self::FlatFile(FlatFileFetcher))
                }
            },
        }
    }
}

impl HmmFetcher for AnyFetcher {
    fn name(&self) -> &str {
        match self {
            AnyFetcher::System(fetcher) => fetcher.name(),
            AnyFetcher::FlatFile(fetcher) => fetcher.name(),
        }
    }

    fn fetch(
        &self,
        database: &Path,
        accession: &VersionedAccession,
        scratch: &Path,
    ) -> Result<Vec<u8>, PfamError> {
        match self {
            AnyFetcher::System(fetcher) => fetcher.fetch(database, accession, scratch),
            AnyFetcher::FlatFile(fetcher) => fetcher.fetch(database, accession, scratch),
        }
    }
}

pub fn hmmpress(program: &Path, subset: &Path) -> Result<(), PfamError> {
    debug!(program = %program.display(), subset = %subset.display(), "running hmmpress");
    let output = Command::new(program)
        .arg("-f")
        .arg(subset)
        .output()
        .map_err(|_| PfamError::MissingTool(program.display().to_string()))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(PfamError::Filesystem(format!("hmmpress failed: {stderr}")))
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.is_file() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}
