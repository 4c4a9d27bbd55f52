use std::str::FromStr;

use clap::ValueEnum;
use serde_json::json;

use ttd_uniprot_resolver::domain::{
    Accession, AttributionPolicy, UnresolvedAccession, UnresolvedReason,
};

#[test]
fn unresolved_accession_json_shape() {
    let item = UnresolvedAccession::new(
        Accession::from_str("NOPE_HUMAN").unwrap(),
        UnresolvedReason::RetriesExhausted { attempts: 3 },
    );
    assert_eq!(
        serde_json::to_value(&item).unwrap(),
        json!({
            "accession": "NOPE_HUMAN",
            "reason": {"kind": "retries-exhausted", "attempts": 3}
        })
    );
    assert_eq!(
        serde_json::to_value(UnresolvedReason::NotFound).unwrap(),
        json!({"kind": "not-found"})
    );
}

#[test]
fn reason_display_is_readable() {
    let reason = UnresolvedReason::SubmissionFailed {
        message: "status 400".to_string(),
    };
    assert_eq!(reason.to_string(), "submission failed: status 400");
}

#[test]
fn attribution_policy_parses_cli_values() {
    assert_eq!(
        AttributionPolicy::from_str("last-match", false).unwrap(),
        AttributionPolicy::LastMatch
    );
    assert_eq!(
        AttributionPolicy::from_str("all-owners", false).unwrap(),
        AttributionPolicy::AllOwners
    );
    assert!(AttributionPolicy::from_str("first", false).is_err());
    assert_eq!(AttributionPolicy::LastMatch.to_string(), "last-match");
}
