use std::fmt::Display;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::app::{ProgressEvent, ProgressSink, SubsetResult};
use crate::domain::VersionedAccession;
use crate::error::PfamError;

pub const SUBSET_SUFFIX: &str = ".Pfam-A.subset.hmm";
pub const WORKSPACE_PREFIX: &str = ".pfam-subset-run";

/// `out/EC3.1.1.74` gives `out/pfam_hmms/<acc>.hmm` and
/// `out/EC3.1.1.74.Pfam-A.subset.hmm`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    out_dir: Utf8PathBuf,
    family_dir: Utf8PathBuf,
    subset_path: Utf8PathBuf,
}

impl OutputLayout {
    pub fn new(prefix: &Utf8Path, family_dir_name: &str) -> Result<Self, PfamError> {
        let base = prefix.as_str().rsplit(['/', '\\']).next().unwrap_or_default();
        if matches!(base, "" | "." | "..") {
            return Err(PfamError::InvalidPrefix(prefix.to_string()));
        }
        let out_dir = match prefix.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        Ok(Self {
            family_dir: out_dir.join(family_dir_name),
            subset_path: Utf8PathBuf::from(format!("{prefix}{SUBSET_SUFFIX}")),
            out_dir,
        })
    }

    pub fn out_dir(&self) -> &Utf8Path {
        &self.out_dir
    }

    pub fn family_dir(&self) -> &Utf8Path {
        &self.family_dir
    }

    pub fn subset_path(&self) -> &Utf8Path {
        &self.subset_path
    }

    pub fn family_path(&self, accession: &VersionedAccession) -> Utf8PathBuf {
        self.family_dir.join(accession.file_name())
    }

    pub fn ensure_dirs(&self) -> Result<(), PfamError> {
        fs::create_dir_all(self.family_dir.as_std_path())
            .map_err(|err| PfamError::Filesystem(err.to_string()))?;
        if let Some(parent) = self.subset_path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| PfamError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }
}

pub fn write_file_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), PfamError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".pfam-subset")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| PfamError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| PfamError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| PfamError::Filesystem(err.to_string()))?;
    Ok(())
}

pub struct RunWorkspace {
    dir: TempDir,
}

impl RunWorkspace {
    pub fn create(parent: &Utf8Path) -> Result<Self, PfamError> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent.as_std_path())
            .map_err(|err| PfamError::Filesystem(format!("create workspace in {parent}: {err}")))?;
        debug!(path = %dir.path().display(), "created run workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_list<I>(&self, name: &str, items: I) -> Result<PathBuf, PfamError>
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let path = self.dir.path().join(name);
        let file = File::create(&path).map_err(|err| PfamError::Filesystem(err.to_string()))?;
        let mut writer = BufWriter::new(file);
        for item in items {
            writeln!(writer, "{item}").map_err(|err| PfamError::Filesystem(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| PfamError::Filesystem(err.to_string()))?;
        Ok(path)
    }
}

/// The combined subset file. Created (truncated) up front so a run that
/// fetches nothing leaves it empty.
pub struct SubsetWriter {
    path: Utf8PathBuf,
    writer: BufWriter<File>,
    records: usize,
}

impl SubsetWriter {
    pub fn create(path: &Utf8Path) -> Result<Self, PfamError> {
        let file = File::create(path.as_std_path())
            .map_err(|err| PfamError::Filesystem(format!("create {path}: {err}")))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            records: 0,
        })
    }

    pub fn append(&mut self, record: &[u8]) -> Result<(), PfamError> {
        self.writer
            .write_all(record)
            .map_err(|err| PfamError::Filesystem(err.to_string()))?;
        if !record.ends_with(b"\n") {
            self.writer
                .write_all(b"\n")
                .map_err(|err| PfamError::Filesystem(err.to_string()))?;
        }
        self.records += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize, PfamError> {
        self.writer
            .flush()
            .map_err(|err| PfamError::Filesystem(format!("flush {}: {err}", self.path)))?;
        Ok(self.records)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_subset(result: &SubsetResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_subset(result: &SubsetResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(
            stdout,
            "fetched {} of {} Pfam HMMs ({} identifiers, {} without a version)",
            result.fetched.len(),
            result.resolved.len(),
            result.identifiers,
            result.unresolved.len()
        )?;
        for failure in &result.failed {
            writeln!(stdout, "missing {}: {}", failure.accession, failure.message)?;
        }
        writeln!(stdout, "families: {}", result.family_dir)?;
        writeln!(stdout, "subset:   {}", result.subset_path)?;
        Ok(())
    }
}

pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn layout_paths() {
        let layout = OutputLayout::new(Utf8Path::new("out/EC3.1.1.74"), "pfam_hmms").unwrap();
        let acc: VersionedAccession = "PF00001.21".parse().unwrap();
        assert_eq!(layout.family_dir(), "out/pfam_hmms");
        assert_eq!(layout.subset_path(), "out/EC3.1.1.74.Pfam-A.subset.hmm");
        assert!(layout.family_path(&acc).ends_with("pfam_hmms/PF00001.21.hmm"));
    }

    #[test]
    fn bare_prefix_uses_current_dir() {
        let layout = OutputLayout::new(Utf8Path::new("run1"), "pfam_hmms").unwrap();
        assert_eq!(layout.out_dir(), ".");
        assert_eq!(layout.family_dir(), "./pfam_hmms");
        assert_eq!(layout.subset_path(), "run1.Pfam-A.subset.hmm");
    }

    #[test]
    fn prefix_needs_a_base_name() {
        for prefix in ["out/", "", ".", "out/..", "/"] {
            let err = OutputLayout::new(Utf8Path::new(prefix), "pfam_hmms").unwrap_err();
            assert_matches!(err, PfamError::InvalidPrefix(ref value) if value == prefix);
        }
    }

    #[test]
    fn workspace_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let parent = Utf8Path::from_path(dir.path()).unwrap();
        let workspace = RunWorkspace::create(parent).unwrap();
        let list = workspace.write_list("ids.txt", ["PF00001", "PF00002"]).unwrap();
        assert_eq!(fs::read_to_string(&list).unwrap(), "PF00001\nPF00002\n");

        let path = workspace.path().to_path_buf();
        assert!(path.starts_with(dir.path()));
        drop(workspace);
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn subset_records_are_newline_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("s.hmm")).unwrap();
        let mut writer = SubsetWriter::create(&path).unwrap();
        writer.append(b"A\n//").unwrap();
        writer.append(b"B\n//\n").unwrap();
        assert_eq!(writer.finish().unwrap(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "A\n//\nB\n//\n");
    }

    #[test]
    fn atomic_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("f.hmm")).unwrap();
        fs::write(&path, "old").unwrap();
        write_file_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }
}
