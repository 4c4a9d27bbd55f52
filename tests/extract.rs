use std::path::Path;

use assert_matches::assert_matches;

use ttd_uniprot_resolver::config::{ResolverConfig, TARGET_DOWNLOAD_FILE};
use ttd_uniprot_resolver::error::ResolveError;
use ttd_uniprot_resolver::extract::AccessionExtractor;

fn fixture() -> AccessionExtractor {
    let path = Path::new("tests/fixtures").join(TARGET_DOWNLOAD_FILE);
    AccessionExtractor::open(path, ResolverConfig::default().header_rows).unwrap()
}

#[test]
fn missing_source_fails_fast() {
    let temp = tempfile::tempdir().unwrap();
    let err = AccessionExtractor::open(temp.path().join(TARGET_DOWNLOAD_FILE), 40)
        .err()
        .unwrap();
    assert_matches!(err, ResolveError::SourceNotFound(path) if path.ends_with(TARGET_DOWNLOAD_FILE));
}

#[test]
fn fixture_entities_in_file_order() {
    let entities = fixture()
        .entities()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    let summary: Vec<(String, Vec<String>)> = entities
        .iter()
        .map(|entity| {
            (
                entity.entity_id.to_string(),
                entity.accessions.iter().map(|acc| acc.to_string()).collect(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("T47101".to_string(), vec!["FGFR1_HUMAN".to_string()]),
            (
                "T00033".to_string(),
                vec!["TGFR1_HUMAN".to_string(), "TGFR2_HUMAN".to_string()]
            ),
            ("T00210".to_string(), vec!["GBRA1_HUMAN".to_string()]),
            ("T00999".to_string(), vec!["NOPE_HUMAN".to_string()]),
        ]
    );
}

#[test]
fn blocks_include_targets_without_accessions() {
    let blocks = fixture()
        .blocks()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(blocks.len(), 5);
    assert_eq!(blocks[2].entity_id.as_str(), "T00111");
    assert!(blocks[2].accessions().is_empty());
    assert_eq!(blocks[2].field("TARGTYPE"), Some("Research target"));
}

#[test]
fn index_deduplicates_accessions() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join(TARGET_DOWNLOAD_FILE);
    std::fs::write(
        &path,
        "T1\tTARGETID\tT1\nT1\tUNIPROID\tP1;P2\n\nT2\tTARGETID\tT2\nT2\tUNIPROID\tP2/P3\n",
    )
    .unwrap();
    let index = AccessionExtractor::open(&path, 0).unwrap().index().unwrap();
    assert_eq!(index.len(), 2);
    let unique: Vec<String> = index
        .unique_accessions()
        .into_iter()
        .map(|acc| acc.to_string())
        .collect();
    assert_eq!(unique, vec!["P1", "P2", "P3"]);
}

#[test]
fn header_only_file_has_no_entities() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join(TARGET_DOWNLOAD_FILE);
    std::fs::write(&path, "title\nnotes\n").unwrap();
    let index = AccessionExtractor::open(&path, 2).unwrap().index().unwrap();
    assert!(index.is_empty());
}

#[test]
fn target_records_from_fixture() {
    use ttd_uniprot_resolver::aggregate::ResolutionTable;
    use ttd_uniprot_resolver::domain::ResolutionRecord;
    use ttd_uniprot_resolver::targets::target_infos;

    let table: ResolutionTable = [ResolutionRecord {
        entity_id: "T47101".parse().unwrap(),
        canonical_ids: ["P11362".parse().unwrap()].into_iter().collect(),
    }]
    .into_iter()
    .collect();
    let targets = target_infos(&fixture(), &table).unwrap();

    assert_eq!(targets.len(), 5);
    assert_eq!(targets[0].curie(), "UniProtKB:P11362");
    assert_eq!(targets[0].target_type.as_deref(), Some("successful target"));
    assert_eq!(targets[0].bioclass.as_deref(), Some("Kinase"));
    assert_eq!(targets[2].curie(), "ttd_target_id:T00111");
    assert_eq!(targets[2].target_type.as_deref(), Some("research target"));
    assert!(targets[2].bioclass.is_none());
}
