use std::collections::BTreeSet;

use assert_matches::assert_matches;

use pfam_subset::domain::{BareIdentifier, FetcherKind, VersionedAccession};
use pfam_subset::error::PfamError;

#[test]
fn parse_bare_identifier_valid() {
    let id: BareIdentifier = "PF00069".parse().unwrap();
    assert_eq!(id.as_str(), "PF00069");
}

#[test]
fn parse_bare_identifier_invalid() {
    let err = "PF0006".parse::<BareIdentifier>().unwrap_err();
    assert_matches!(err, PfamError::InvalidIdentifier(_));
}

#[test]
fn parse_versioned_accession_valid() {
    let acc: VersionedAccession = "PF00069.28".parse().unwrap();
    assert_eq!(acc.bare().as_str(), "PF00069");
    assert_eq!(acc.version(), "28");
}

#[test]
fn accessions_sort_by_family_then_numeric_version() {
    let set: BTreeSet<VersionedAccession> = ["PF00002.1", "PF00001.10", "PF00001.9"]
        .iter()
        .map(|value| value.parse().unwrap())
        .collect();
    let ordered: Vec<String> = set.iter().map(|acc| acc.to_string()).collect();
    assert_eq!(ordered, ["PF00001.9", "PF00001.10", "PF00002.1"]);
    assert_eq!(set.iter().max().unwrap().to_string(), "PF00002.1");
}

#[test]
fn accession_serializes_as_string() {
    let acc: VersionedAccession = "PF00001.3".parse().unwrap();
    let json = serde_json::to_string(&acc).unwrap();
    assert_eq!(json, "\"PF00001.3\"");
    let back: VersionedAccession = serde_json::from_str(&json).unwrap();
    assert_eq!(back, acc);
}

#[test]
fn fetcher_kind_from_config_json() {
    let kind: FetcherKind = serde_json::from_str("\"hmmfetch\"").unwrap();
    assert_eq!(kind, FetcherKind::Hmmfetch);
    assert_eq!(FetcherKind::default(), FetcherKind::Auto);
}
