//! Integration tests for the keyless CLI.
//!
//! Each test writes signature, publications and calendar fixtures into a
//! temporary directory, invokes the `keyless` binary via `assert_cmd`, and
//! checks outputs and exit codes.

#![allow(deprecated)] // cargo_bin deprecation: macro replacement not yet stable

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use chrono::{DateTime, Utc};
use keyless_chain::engine::{
    aggregate_output, calculate_chain_index, calendar_output, compute_output,
};
use keyless_chain::{
    AggregationHashChain, CalendarHashChain, CalendarLink, ChainLink, DataHash, HashAlgorithm,
    PublicationData, PublicationRecord, Signature, SignatureParts,
};
use predicates::prelude::*;

/// Convenience: get a `Command` for the `keyless` binary.
fn keyless() -> Command {
    Command::cargo_bin("keyless").expect("keyless binary not found")
}

fn time(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("valid time")
}

fn hash(data: &[u8]) -> DataHash {
    HashAlgorithm::Sha256.digest(data).expect("sha256")
}

/// Aggregation chain over SHA-256 of 32 zero bytes, aggregated at second 4.
/// `first_correction` is the level correction of its first link.
fn aggregation_chain(input_hash: DataHash, first_correction: u64) -> AggregationHashChain {
    let links = vec![
        ChainLink::left(hash(b"left sibling"), first_correction),
        ChainLink::right(hash(b"right sibling"), 0),
    ];
    let index = calculate_chain_index(&links).expect("index");
    AggregationHashChain {
        input_hash,
        aggregation_time: time(4),
        chain_index: vec![index],
        links,
        algorithm: HashAlgorithm::Sha256,
    }
}

fn zero_document() -> DataHash {
    HashAlgorithm::Sha256.digest(&[0_u8; 32]).expect("sha256")
}

/// Calendar chain to second 6 or 7; both shapes register second 4.
fn calendar_chain(chains: &[AggregationHashChain], publication_secs: i64) -> CalendarHashChain {
    CalendarHashChain {
        input_hash: aggregate_output(chains).expect("fold").output_hash,
        aggregation_time: time(4),
        publication_time: time(publication_secs),
        links: vec![
            CalendarLink::left(hash(b"cal sibling 0")),
            CalendarLink::left(hash(b"cal sibling 1")),
            CalendarLink::right(hash(b"cal sibling 2")),
        ],
    }
}

fn publication_of(chain: &CalendarHashChain) -> PublicationRecord {
    PublicationRecord {
        publication_data: PublicationData {
            publication_time: chain.publication_time,
            published_hash: calendar_output(chain).expect("root"),
        },
        references: vec![],
        repository_uris: vec![],
    }
}

fn signature(chains: Vec<AggregationHashChain>, publication: bool) -> Signature {
    let calendar = calendar_chain(&chains, 6);
    let publication_record = publication.then(|| publication_of(&calendar));
    Signature::new(SignatureParts {
        aggregation_chains: chains,
        calendar_chain: Some(calendar),
        publication_record,
        ..Default::default()
    })
    .expect("signature")
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> PathBuf {
    std::fs::write(path, serde_json::to_string_pretty(value).expect("serialize")).expect("write");
    path.to_path_buf()
}

fn write_signature(dir: &Path, sig: &Signature) -> PathBuf {
    write_json(&dir.join("signature.json"), sig)
}

fn write_publications(dir: &Path, publications: &[PublicationRecord]) -> PathBuf {
    write_json(
        &dir.join("publications.json"),
        &serde_json::json!({ "publications": publications }),
    )
}

fn write_calendar(dir: &Path, chains: &[CalendarHashChain]) -> PathBuf {
    write_json(&dir.join("calendar.json"), &serde_json::json!({ "chains": chains }))
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

// ─── verify tests ───────────────────────────────────────────

#[test]
fn verify_internal_passes() {
    let dir = tempfile::tempdir().unwrap();
    let sig = signature(vec![aggregation_chain(zero_document(), 0)], false);
    let sig_path = write_signature(dir.path(), &sig);

    keyless()
        .args(["verify", path_str(&sig_path), "--policy", "internal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[PASS] AggregationChainIndex"))
        .stdout(predicate::str::contains("Verification PASSED"));
}

#[test]
fn verify_flipped_link_fails_with_index_code() {
    let dir = tempfile::tempdir().unwrap();
    let sig = signature(vec![aggregation_chain(zero_document(), 0)], false);
    let sig_path = write_signature(dir.path(), &sig);

    // Flip the first link of the bottom chain
    let mut value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&sig_path).unwrap()).unwrap();
    value["aggregation_chains"][0]["links"][0]["direction"] = "right".into();
    std::fs::write(&sig_path, serde_json::to_string(&value).unwrap()).unwrap();

    keyless()
        .args(["verify", path_str(&sig_path), "--policy", "internal"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("INT-10"))
        .stdout(predicate::str::contains("Verification FAILED"));
}

#[test]
fn verify_wrong_document_hash_fails() {
    let dir = tempfile::tempdir().unwrap();
    let sig = signature(vec![aggregation_chain(zero_document(), 0)], false);
    let sig_path = write_signature(dir.path(), &sig);
    let other = hash(b"another document").to_hex();

    keyless()
        .args([
            "verify",
            path_str(&sig_path),
            "--policy",
            "internal",
            "--document-hash",
            &other,
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("GEN-01"));
}

#[test]
fn verify_default_policy_falls_back_to_publications_file() {
    let dir = tempfile::tempdir().unwrap();
    let sig = signature(vec![aggregation_chain(zero_document(), 0)], true);
    let sig_path = write_signature(dir.path(), &sig);
    let publications = write_publications(
        dir.path(),
        &[sig.publication_record().expect("publication").clone()],
    );

    keyless()
        .args([
            "verify",
            path_str(&sig_path),
            "--publications",
            path_str(&publications),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy key-based: INCONCLUSIVE"))
        .stdout(predicate::str::contains("Policy publications-file: OK"))
        .stdout(predicate::str::contains("Verification PASSED"));
}

#[test]
fn verify_without_trust_anchors_is_inconclusive() {
    let dir = tempfile::tempdir().unwrap();
    let sig = signature(vec![aggregation_chain(zero_document(), 0)], false);
    let sig_path = write_signature(dir.path(), &sig);

    keyless()
        .args(["verify", path_str(&sig_path)])
        .assert()
        .failure()
        .stdout(predicate::str::contains("GEN-02"))
        .stdout(predicate::str::contains("INCONCLUSIVE"));
}

#[test]
fn verify_publications_file_extends_through_calendar() {
    let dir = tempfile::tempdir().unwrap();
    let chains = vec![aggregation_chain(zero_document(), 0)];
    let sig = signature(chains.clone(), false);
    let sig_path = write_signature(dir.path(), &sig);
    let later = calendar_chain(&chains, 7);
    let publications = write_publications(dir.path(), &[publication_of(&later)]);
    let calendar = write_calendar(dir.path(), &[later]);

    keyless()
        .args([
            "verify",
            path_str(&sig_path),
            "--policy",
            "publications-file",
            "--publications",
            path_str(&publications),
            "--calendar",
            path_str(&calendar),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy publications-file-extending: OK"));
}

#[test]
fn verify_calendar_based() {
    let dir = tempfile::tempdir().unwrap();
    let chains = vec![aggregation_chain(zero_document(), 0)];
    let sig = signature(chains.clone(), false);
    let sig_path = write_signature(dir.path(), &sig);
    let calendar = write_calendar(dir.path(), &[calendar_chain(&chains, 6)]);

    keyless()
        .args([
            "verify",
            path_str(&sig_path),
            "--policy",
            "calendar-based",
            "--calendar",
            path_str(&calendar),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Verification PASSED"));
}

#[test]
fn verify_user_publication() {
    let dir = tempfile::tempdir().unwrap();
    let sig = signature(vec![aggregation_chain(zero_document(), 0)], true);
    let sig_path = write_signature(dir.path(), &sig);
    let published = &sig.publication_record().expect("publication").publication_data;

    keyless()
        .args([
            "verify",
            path_str(&sig_path),
            "--policy",
            "user-publication",
            "--user-publication-time",
            &published.publication_time.timestamp().to_string(),
            "--user-publication-hash",
            &published.published_hash.to_hex(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy user-publication: OK"));
}

#[test]
fn verify_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let sig = signature(vec![aggregation_chain(zero_document(), 0)], false);
    let sig_path = write_signature(dir.path(), &sig);

    let output = keyless()
        .args(["verify", path_str(&sig_path), "--policy", "internal", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["passed"], true);
    assert_eq!(report["result"]["state"], "OK");
    assert_eq!(report["result"]["policies"][0]["policy"], "internal");
}

#[test]
fn verify_unknown_policy_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let sig = signature(vec![aggregation_chain(zero_document(), 0)], false);
    let sig_path = write_signature(dir.path(), &sig);

    keyless()
        .args(["verify", path_str(&sig_path), "--policy", "strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown policy"));
}

#[test]
fn verify_policy_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let sig = signature(vec![aggregation_chain(zero_document(), 0)], false);
    let sig_path = write_signature(dir.path(), &sig);
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "policy = \"internal\"\n").unwrap();

    keyless()
        .args(["verify", path_str(&sig_path), "--config", path_str(&config)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy internal: OK"));
}

#[test]
fn verify_malformed_signature_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let sig_path = dir.path().join("signature.json");
    std::fs::write(&sig_path, r#"{"aggregation_chains": []}"#).unwrap();

    keyless()
        .args(["verify", path_str(&sig_path)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid signature"));
}

// ─── inspect tests ──────────────────────────────────────────

#[test]
fn inspect_shows_recomputed_chains() {
    let dir = tempfile::tempdir().unwrap();
    let sig = signature(vec![aggregation_chain(zero_document(), 0)], true);
    let sig_path = write_signature(dir.path(), &sig);

    keyless()
        .args(["inspect", path_str(&sig_path)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Aggregation chain 0 (SHA-256"))
        .stdout(predicate::str::contains("Calendar chain (3 links)"))
        .stdout(predicate::str::contains("Record:            publication"));
}

#[test]
fn inspect_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let sig = signature(vec![aggregation_chain(zero_document(), 0)], false);
    let sig_path = write_signature(dir.path(), &sig);

    let output = keyless()
        .args(["inspect", path_str(&sig_path), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["chains"][0]["output_level"], 2);
    assert_eq!(summary["calendar"]["link_count"], 3);
    assert_eq!(summary["record"], "none");
}

// ─── prepend tests ──────────────────────────────────────────

#[test]
fn prepend_writes_verifiable_signature() {
    let dir = tempfile::tempdir().unwrap();
    let local = AggregationHashChain {
        input_hash: hash(b"local document"),
        aggregation_time: time(4),
        chain_index: vec![],
        links: vec![ChainLink::left(hash(b"local sibling"), 0)],
        algorithm: HashAlgorithm::Sha256,
    };
    let local_output = compute_output(&local, 0).expect("fold");
    let upper = aggregation_chain(local_output.output_hash, local_output.output_level);
    let sig_path = write_signature(dir.path(), &signature(vec![upper], false));
    let chain_path = write_json(&dir.path().join("chain.json"), &local);
    let output = dir.path().join("prepended.json");

    keyless()
        .args([
            "prepend",
            path_str(&sig_path),
            path_str(&chain_path),
            "--output",
            path_str(&output),
        ])
        .assert()
        .success();

    let prepended: Signature =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(prepended.aggregation_chains().len(), 2);
    assert_eq!(prepended.input_hash(), &local.input_hash);

    keyless()
        .args(["verify", path_str(&output), "--policy", "internal"])
        .assert()
        .success();
}

#[test]
fn prepend_rejects_mismatched_chain() {
    let dir = tempfile::tempdir().unwrap();
    let sig_path = write_signature(
        dir.path(),
        &signature(vec![aggregation_chain(zero_document(), 1)], false),
    );
    let unrelated = AggregationHashChain {
        input_hash: hash(b"unrelated"),
        aggregation_time: time(4),
        chain_index: vec![],
        links: vec![ChainLink::left(hash(b"x"), 0)],
        algorithm: HashAlgorithm::Sha256,
    };
    let chain_path = write_json(&dir.path().join("chain.json"), &unrelated);

    keyless()
        .args(["prepend", path_str(&sig_path), path_str(&chain_path)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not match"));
}

// ─── extend tests ───────────────────────────────────────────

#[test]
fn extend_to_publication_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let chains = vec![aggregation_chain(zero_document(), 0)];
    let sig_path = write_signature(dir.path(), &signature(chains.clone(), false));
    let later = calendar_chain(&chains, 7);
    let publication = publication_of(&later);
    let publications = write_publications(dir.path(), std::slice::from_ref(&publication));
    let calendar = write_calendar(dir.path(), &[later]);
    let output = dir.path().join("extended.json");

    keyless()
        .args([
            "extend",
            path_str(&sig_path),
            "--calendar",
            path_str(&calendar),
            "--publications",
            path_str(&publications),
            "--output",
            path_str(&output),
        ])
        .assert()
        .success();

    let extended: Signature =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(extended.publication_record(), Some(&publication));

    keyless()
        .args([
            "verify",
            path_str(&output),
            "--policy",
            "publications-file",
            "--publications",
            path_str(&publications),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy publications-file: OK"));
}

#[test]
fn extend_to_head_without_publications() {
    let dir = tempfile::tempdir().unwrap();
    let chains = vec![aggregation_chain(zero_document(), 0)];
    let sig_path = write_signature(dir.path(), &signature(chains.clone(), false));
    let calendar = write_calendar(
        dir.path(),
        &[calendar_chain(&chains, 6), calendar_chain(&chains, 7)],
    );

    let output = keyless()
        .args(["extend", path_str(&sig_path), "--calendar", path_str(&calendar)])
        .output()
        .unwrap();
    assert!(output.status.success());

    let extended: Signature = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(extended.publication_time(), Some(time(7)));
    assert!(extended.is_extended());
}

#[test]
fn extend_without_matching_publication_fails() {
    let dir = tempfile::tempdir().unwrap();
    let chains = vec![aggregation_chain(zero_document(), 0)];
    let sig_path = write_signature(dir.path(), &signature(chains.clone(), false));
    let publications = write_publications(dir.path(), &[]);
    let calendar = write_calendar(dir.path(), &[calendar_chain(&chains, 7)]);

    keyless()
        .args([
            "extend",
            path_str(&sig_path),
            "--calendar",
            path_str(&calendar),
            "--publications",
            path_str(&publications),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no publication"));
}
