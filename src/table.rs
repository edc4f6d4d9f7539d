use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::domain::BareIdentifier;
use crate::error::{InputKind, PfamError};

static PFAM_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(PF[0-9]{5})(?:\.[0-9]+)?$").unwrap());
static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[;,\s]+").unwrap());

const BOM: char = '\u{feff}';

pub fn validate_input(path: &Path, kind: InputKind) -> Result<(), PfamError> {
    let missing = || PfamError::InputMissing {
        kind,
        path: path.to_path_buf(),
    };
    let metadata = fs::metadata(path).map_err(|_| missing())?;
    if !metadata.is_file() {
        return Err(missing());
    }
    File::open(path).map_err(|_| missing())?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct AnnotationTable {
    path: PathBuf,
    headers: Vec<String>,
}

impl AnnotationTable {
    pub fn open(path: &Path) -> Result<Self, PfamError> {
        validate_input(path, InputKind::AnnotationTable)?;
        let mut reader = open_reader(path)?;
        let header_line = read_line_lossy(&mut reader)?.unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            headers: split_header(&header_line),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn resolve_column(&self, aliases: &[String]) -> Result<usize, PfamError> {
        find_column(&self.headers, aliases)
    }

    pub fn identifiers(&self, column: usize) -> Result<BTreeSet<BareIdentifier>, PfamError> {
        let reader = open_reader(&self.path)?;
        extract_identifiers(reader, column)
    }
}

pub fn normalize_header(cell: &str) -> String {
    cell.replace(['\r', BOM], "").trim().to_string()
}

pub fn split_header(line: &str) -> Vec<String> {
    line.split('\t').map(normalize_header).collect()
}

/// Returns the 1-based position of the first header matching an alias,
/// trying aliases in priority order. Matching is exact and case-sensitive.
pub fn resolve_column(header_line: &str, aliases: &[String]) -> Result<usize, PfamError> {
    find_column(&split_header(header_line), aliases)
}

fn find_column(headers: &[String], aliases: &[String]) -> Result<usize, PfamError> {
    for alias in aliases {
        if let Some(idx) = headers.iter().position(|header| header == alias) {
            debug!(alias = %alias, column = idx + 1, "resolved Pfam column");
            return Ok(idx + 1);
        }
    }
    Err(PfamError::ColumnNotFound {
        headers: headers.to_vec(),
    })
}

pub fn parse_pfam_field(field: &str) -> Vec<BareIdentifier> {
    SEPARATOR_RE
        .split(field)
        .map(|token| {
            token
                .chars()
                .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '.')
                .collect::<String>()
        })
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            PFAM_TOKEN_RE
                .captures(&token)
                .and_then(|caps| caps[1].parse::<BareIdentifier>().ok())
        })
        .collect()
}

pub fn extract_identifiers<R: BufRead>(
    mut reader: R,
    column: usize,
) -> Result<BTreeSet<BareIdentifier>, PfamError> {
    let mut identifiers = BTreeSet::new();
    if read_line_lossy(&mut reader)?.is_none() {
        return Err(PfamError::NoIdentifiersFound { column });
    }

    let mut rows = 0usize;
    while let Some(line) = read_line_lossy(&mut reader)? {
        rows += 1;
        let field = column
            .checked_sub(1)
            .and_then(|idx| line.split('\t').nth(idx))
            .unwrap_or("");
        identifiers.extend(parse_pfam_field(field));
    }
    debug!(rows, unique = identifiers.len(), "scanned annotation rows");

    if identifiers.is_empty() {
        return Err(PfamError::NoIdentifiersFound { column });
    }
    Ok(identifiers)
}

fn open_reader(path: &Path) -> Result<BufReader<File>, PfamError> {
    let file = File::open(path).map_err(|_| PfamError::InputMissing {
        kind: InputKind::AnnotationTable,
        path: path.to_path_buf(),
    })?;
    Ok(BufReader::new(file))
}

fn read_line_lossy<R: BufRead>(reader: &mut R) -> Result<Option<String>, PfamError> {
    let mut buf = Vec::new();
    let read = reader
        .read_until(b'\n', &mut buf)
        .map_err(|err| PfamError::Filesystem(err.to_string()))?;
    if read == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;

    use super::*;

    fn aliases(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn header_noise_is_ignored() {
        let line = "\u{feff}Entry\t  pfam_list \r";
        let idx = resolve_column(line, &aliases(&["pfam_list"])).unwrap();
        assert_eq!(idx, 2);

        let line = "\u{feff}Pfam\tEntry";
        assert_eq!(resolve_column(line, &aliases(&["Pfam"])).unwrap(), 1);
    }

    #[test]
    fn aliases_are_tried_in_priority_order() {
        let line = "Pfam\tEntry\tpfam_list";
        let idx = resolve_column(line, &aliases(&["pfam_list", "Pfam"])).unwrap();
        assert_eq!(idx, 3);
    }

    #[test]
    fn header_match_is_case_sensitive() {
        let err = resolve_column("PFAM_LIST\tEntry", &aliases(&["pfam_list"])).unwrap_err();
        assert_matches!(err, PfamError::ColumnNotFound { headers } if headers == ["PFAM_LIST", "Entry"]);
    }

    #[test]
    fn field_parsing_drops_garbage() {
        let ids = parse_pfam_field("PF00001.21; garbage; PF1234");
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].as_str(), "PF00001");
    }

    #[test]
    fn field_parsing_strips_noise_characters() {
        let ids = parse_pfam_field("\"PF00002\",[PF00003.4];;  PF000045 PF00005.x");
        let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["PF00002", "PF00003"]);
    }

    #[test]
    fn field_parsing_keeps_ascii_only() {
        let ids = parse_pfam_field("PF00001\u{b2} PF00002.\u{0663}4 \u{00c9}PF00003");
        let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["PF00001", "PF00002", "PF00003"]);
    }

    #[test]
    fn extraction_dedups_and_handles_short_rows() {
        let table = "id\tpfam\nA\tPF00001;PF00002\nB\nC\tPF00001.3\r\n";
        let ids = extract_identifiers(Cursor::new(table), 2).unwrap();
        let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["PF00001", "PF00002"]);
    }

    #[test]
    fn extraction_ignores_header_row() {
        let table = "PF00009\nPF00001\n";
        let ids = extract_identifiers(Cursor::new(table), 1).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(ids.iter().all(|id| id.as_str() == "PF00001"));
    }

    #[test]
    fn extraction_without_identifiers_fails() {
        let table = "id\tpfam\nA\t-\nB\tnone\n";
        let err = extract_identifiers(Cursor::new(table), 2).unwrap_err();
        assert_matches!(err, PfamError::NoIdentifiersFound { column: 2 });
    }

    #[test]
    fn extraction_is_repeatable() {
        let table = "pfam\nPF00010 PF00011\nPF00010\n";
        let first = extract_identifiers(Cursor::new(table), 1).unwrap();
        let second = extract_identifiers(Cursor::new(table), 1).unwrap();
        assert_eq!(first, second);
    }
}
