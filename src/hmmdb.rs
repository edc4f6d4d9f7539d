use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{BareIdentifier, VersionedAccession};
use crate::error::{InputKind, PfamError};

const ACC_TAG: &str = "ACC";
const RECORD_END: &str = "//";

#[derive(Debug, Clone, Default)]
pub struct VersionIndex {
    latest: BTreeMap<BareIdentifier, VersionedAccession>,
    records: usize,
}

impl VersionIndex {
    pub fn build(database: &Path) -> Result<Self, PfamError> {
        let reader = open_database(database)?;
        let index = Self::from_reader(reader)?;
        debug!(
            database = %database.display(),
            records = index.records,
            families = index.latest.len(),
            "indexed reference database"
        );
        Ok(index)
    }

    pub fn from_reader<R: BufRead>(mut reader: R) -> Result<Self, PfamError> {
        let mut index = Self::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|err| PfamError::Filesystem(err.to_string()))?;
            if read == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            if is_record_end(&line) {
                index.records += 1;
                continue;
            }
            if let Some(accession) = parse_acc_line(&line) {
                index.insert(accession);
            }
        }
        Ok(index)
    }

    fn insert(&mut self, accession: VersionedAccession) {
        match self.latest.entry(accession.bare().clone()) {
            Entry::Occupied(mut current) => {
                if *current.get() < accession {
                    current.insert(accession);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(accession);
            }
        }
    }

    pub fn latest(&self, id: &BareIdentifier) -> Option<&VersionedAccession> {
        self.latest.get(id)
    }

    pub fn families(&self) -> usize {
        self.latest.len()
    }

    pub fn records(&self) -> usize {
        self.records
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    pub resolved: Vec<VersionedAccession>,
    pub unresolved: Vec<BareIdentifier>,
}

pub fn resolve_versions(ids: &BTreeSet<BareIdentifier>, index: &VersionIndex) -> Resolution {
    let mut resolved = BTreeSet::new();
    let mut unresolved = Vec::new();
    for id in ids {
        match index.latest(id) {
            Some(accession) => {
                debug!(id = %id, accession = %accession, "resolved latest version");
                resolved.insert(accession.clone());
            }
            None => {
                warn!("{}", PfamError::VersionNotFound(id.clone()));
                unresolved.push(id.clone());
            }
        }
    }
    Resolution {
        resolved: resolved.into_iter().collect(),
        unresolved,
    }
}

pub fn parse_acc_line(line: &str) -> Option<VersionedAccession> {
    let mut fields = line.split_whitespace();
    if fields.next()? != ACC_TAG {
        return None;
    }
    let value = fields.next()?;
    match value.parse() {
        Ok(accession) => Some(accession),
        Err(_) => {
            debug!(value, "skipping ACC value that is not a versioned Pfam accession");
            None
        }
    }
}

/// Scans the database for the record whose `ACC` equals `accession` exactly
/// and returns its bytes unmodified, terminator line included.
pub fn find_record<R: BufRead>(
    mut reader: R,
    accession: &str,
) -> Result<Option<Vec<u8>>, PfamError> {
    let mut record = Vec::new();
    let mut matched = false;
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|err| PfamError::Filesystem(err.to_string()))?;
        if read == 0 {
            break;
        }
        record.extend_from_slice(&line);
        let text = String::from_utf8_lossy(&line);
        if is_record_end(&text) {
            if matched {
                return Ok(Some(record));
            }
            record.clear();
            continue;
        }
        let mut fields = text.split_whitespace();
        if fields.next() == Some(ACC_TAG) && fields.next() == Some(accession) {
            matched = true;
        }
    }

    // A final record without a terminator still counts.
    if matched {
        return Ok(Some(record));
    }
    Ok(None)
}

pub fn open_database(path: &Path) -> Result<BufReader<File>, PfamError> {
    let file = File::open(path).map_err(|_| PfamError::InputMissing {
        kind: InputKind::ReferenceDatabase,
        path: path.to_path_buf(),
    })?;
    Ok(BufReader::new(file))
}

fn is_record_end(line: &str) -> bool {
    line.trim_end() == RECORD_END
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const DB: &str = "\
HMMER3/f [3.1b2 | February 2015]
NAME  7tm_1
ACC   PF00001.9
LENG  268
//
HMMER3/f [3.1b2 | February 2015]
NAME  7tm_1
ACC   PF00001.10
//
HMMER3/f [3.1b2 | February 2015]
NAME  7tm_2
ACC   PF00002.3
DESC  7 transmembrane receptor (Secretin family)
//
";

    fn id(value: &str) -> BareIdentifier {
        value.parse().unwrap()
    }

    #[test]
    fn index_picks_numeric_latest() {
        let index = VersionIndex::from_reader(Cursor::new(DB)).unwrap();
        assert_eq!(index.records(), 3);
        assert_eq!(index.families(), 2);
        assert_eq!(index.latest(&id("PF00001")).unwrap().to_string(), "PF00001.10");
        assert_eq!(index.latest(&id("PF00002")).unwrap().to_string(), "PF00002.3");
    }

    #[test]
    fn acc_lines_only() {
        assert!(parse_acc_line("ACC   PF00001.21\n").is_some());
        assert!(parse_acc_line("  ACC PF00001.21").is_some());
        assert!(parse_acc_line("DESC  ACC PF00001.21").is_none());
        assert!(parse_acc_line("ACC   PF00001").is_none());
        assert!(parse_acc_line("ACCX  PF00001.2").is_none());
        assert!(parse_acc_line("ACC   PF00001.21a").is_none());
    }

    #[test]
    fn malformed_acc_values_do_not_shadow_valid_ones() {
        let db = "ACC   PF00004.2\n//\nACC   PF00004.30b\n//\nACC   PF00004.x\n//\n";
        let index = VersionIndex::from_reader(Cursor::new(db)).unwrap();
        assert_eq!(index.records(), 3);
        assert_eq!(index.latest(&id("PF00004")).unwrap().to_string(), "PF00004.2");
    }

    #[test]
    fn unresolved_identifiers_are_dropped() {
        let index = VersionIndex::from_reader(Cursor::new(DB)).unwrap();
        let ids = BTreeSet::from([id("PF00001"), id("PF09999")]);
        let resolution = resolve_versions(&ids, &index);
        assert_eq!(resolution.resolved.len(), 1);
        assert_eq!(resolution.resolved[0].to_string(), "PF00001.10");
        assert_eq!(resolution.unresolved, vec![id("PF09999")]);
    }

    #[test]
    fn find_record_is_exact_and_verbatim() {
        let record = find_record(Cursor::new(DB), "PF00002.3").unwrap().unwrap();
        let text = String::from_utf8(record).unwrap();
        assert!(text.starts_with("HMMER3/f"));
        assert!(text.contains("DESC  7 transmembrane"));
        assert!(text.ends_with("//\n"));
        assert!(!text.contains("PF00001"));

        assert!(find_record(Cursor::new(DB), "PF00002").unwrap().is_none());
        assert!(find_record(Cursor::new(DB), "PF00002.30").unwrap().is_none());
    }

    #[test]
    fn find_record_without_trailing_terminator() {
        let db = "NAME a\nACC   PF00003.1\nLENG 5";
        let record = find_record(Cursor::new(db), "PF00003.1").unwrap().unwrap();
        assert_eq!(record, db.as_bytes());
    }
}
