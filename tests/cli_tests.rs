// CLI integration tests for the covbase binary
//
// Each test builds a throwaway baseline store and declaration on disk and
// drives the real binary.

#![allow(deprecated)]

use covbase::baseline::{stamp_fingerprint, DocumentFormat};
use covbase::covariate::CovariateDeclaration;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DECLARATION: &str = r#"
day_groups = [{ days = ["SATURDAY", "SUNDAY"] }]
time_periods = ["08:00/4h"]
region_groups = [{ regions = ["FR", "DE"], label = "EU_CORE" }]
[[custom]]
key = "llm_model"
category = "CONFIGURATION"
"#;

fn baseline(
    footprint: &str,
    generated_at: &str,
    covariates: &[(&str, &str)],
    successes: u64,
    failures: u64,
) -> String {
    let samples = successes + failures;
    let mut text = format!(
        "schemaVersion: \"1.1\"\nuseCaseId: shopping.search\ngeneratedAt: \"{}\"\nfootprint: \"{}\"\nexpiresInDays: 90\ncovariates:\n",
        generated_at, footprint
    );
    for (key, value) in covariates {
        text.push_str(&format!("  {}: \"{}\"\n", key, value));
    }
    text.push_str(&format!(
        "execution:\n  samplesPlanned: {samples}\n  samplesExecuted: {samples}\n  terminationReason: COMPLETED\n\
         statistics:\n  successRate:\n    observed: {rate}\n    standardError: 0.02\n    confidenceInterval95: [0.5, 1.0]\n  successes: {successes}\n  failures: {failures}\n\
         cost:\n  totalTimeMs: 5000\n  totalTokens: 12000\n",
        rate = successes as f64 / samples as f64
    ));
    stamp_fingerprint(&text, DocumentFormat::Yaml).unwrap()
}

/// Store with a weekday-morning baseline and a weekend one, both on gpt-x
fn setup_store() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    let footprint = CovariateDeclaration::from_toml_str(DECLARATION)
        .unwrap()
        .footprint();
    fs::write(dir.path().join("declaration.toml"), DECLARATION).unwrap();

    let store = dir.path().join("baselines");
    fs::create_dir(&store).unwrap();
    fs::write(
        store.join("shopping.search-weekday.yaml"),
        baseline(
            &footprint,
            "2026-10-01T12:00:00Z",
            &[
                ("day_of_week", "WEEKDAY"),
                ("time_of_day", "08:00/4h"),
                ("region", "EU_CORE"),
                ("llm_model", "gpt-x"),
            ],
            95,
            5,
        ),
    )
    .unwrap();
    fs::write(
        store.join("shopping.search-weekend.yaml"),
        baseline(
            &footprint,
            "2026-10-04T12:00:00Z",
            &[
                ("day_of_week", "WEEKEND"),
                ("time_of_day", "08:00/4h"),
                ("region", "EU_CORE"),
                ("llm_model", "gpt-x"),
            ],
            80,
            20,
        ),
    )
    .unwrap();
    (dir, footprint)
}

fn select_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("covbase").unwrap();
    cmd.env_remove("COVBASE_REGION")
        .arg("select")
        .arg("--baselines")
        .arg(dir.join("baselines"))
        .arg("--use-case")
        .arg("shopping.search")
        .arg("--declaration")
        .arg(dir.join("declaration.toml"))
        .arg("--tz-id")
        .arg("Europe/Paris");
    cmd
}

#[test]
fn test_select_prefers_matching_weekday_baseline() {
    let (dir, footprint) = setup_store();
    // 2026-10-13 is a Tuesday
    select_cmd(dir.path())
        .arg("--now")
        .arg("2026-10-13T09:30:00+02:00")
        .arg("--region")
        .arg("fr")
        .arg("--custom")
        .arg("llm_model=gpt-x")
        .assert()
        .success()
        .stdout(predicate::str::contains(footprint))
        .stdout(predicate::str::contains("Selected:   shopping.search-weekday.yaml"))
        .stdout(predicate::str::contains("region = EU_CORE"))
        .stdout(predicate::str::contains("WARNING").not());
}

#[test]
fn test_select_json_reports_soft_mismatch() {
    let (dir, _) = setup_store();
    // Saturday afternoon: day matches the weekend baseline, time does not
    let output = select_cmd(dir.path())
        .arg("--format")
        .arg("json")
        .arg("--now")
        .arg("2026-10-17T15:00:00+02:00")
        .arg("--region")
        .arg("DE")
        .arg("--custom")
        .arg("llm_model=gpt-x")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["selected"], "shopping.search-weekend.yaml");
    assert_eq!(json["ambiguous"], false);
    assert_eq!(json["score"], 3);
    assert_eq!(json["profile"]["time_of_day"], "00:00/8h, 12:00/12h");
    assert!(json["warnings"][0]
        .as_str()
        .unwrap()
        .contains("time_of_day"));
}

#[test]
fn test_select_reports_available_footprints_when_none_match() {
    let (dir, _) = setup_store();
    fs::write(
        dir.path().join("declaration.toml"),
        "timezone = true\n",
    )
    .unwrap();
    select_cmd(dir.path())
        .arg("--now")
        .arg("2026-10-13T09:30:00+02:00")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No match for"))
        .stderr(predicate::str::contains("available:"));
}

#[test]
fn test_evaluate_pass_and_fail_exit_codes() {
    let (dir, _) = setup_store();
    let evaluate = |successes: &str| {
        let mut cmd = assert_cmd::Command::cargo_bin("covbase").unwrap();
        cmd.env_remove("COVBASE_REGION")
            .arg("evaluate")
            .arg("--baselines")
            .arg(dir.path().join("baselines"))
            .arg("--use-case")
            .arg("shopping.search")
            .arg("--declaration")
            .arg(dir.path().join("declaration.toml"))
            .arg("--now")
            .arg("2026-10-13T09:30:00+02:00")
            .arg("--region")
            .arg("FR")
            .arg("--custom")
            .arg("llm_model=gpt-x")
            .arg("--successes")
            .arg(successes)
            .arg("--samples")
            .arg("100");
        cmd
    };

    evaluate("94")
        .assert()
        .success()
        .stdout(predicate::str::contains("Verdict:    PASS"));
    evaluate("70")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Verdict:    FAIL"));
}

#[test]
fn test_validate_lists_every_violation() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("broken.yaml");
    fs::write(
        &file,
        "schemaVersion: \"0.1\"\nuseCaseId: search\ngeneratedAt: \"not a time\"\n",
    )
    .unwrap();

    let mut cmd = assert_cmd::Command::cargo_bin("covbase").unwrap();
    cmd.arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("schemaVersion"))
        .stderr(predicate::str::contains("generatedAt"))
        .stderr(predicate::str::contains("contentFingerprint"));
}

#[test]
fn test_validate_accepts_stamped_record() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("good.yaml");
    fs::write(
        &file,
        baseline("a1b2c3d4", "2026-10-01T12:00:00Z", &[("region", "EU_CORE")], 9, 1),
    )
    .unwrap();

    let mut cmd = assert_cmd::Command::cargo_bin("covbase").unwrap();
    cmd.arg("validate")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid (shopping.search 1.1, 10 samples"));
}

#[test]
fn test_sample_size_undersized() {
    let mut cmd = assert_cmd::Command::cargo_bin("covbase").unwrap();
    cmd.arg("sample-size")
        .arg("--target")
        .arg("0.9999")
        .arg("--samples")
        .arg("200")
        .assert()
        .success()
        .stdout(predicate::str::contains("UNDERSIZED"))
        .stdout(predicate::str::contains("needs at least 95"));
}

#[test]
fn test_spec_malformed_id() {
    let dir = TempDir::new().unwrap();
    let mut cmd = assert_cmd::Command::cargo_bin("covbase").unwrap();
    cmd.arg("spec")
        .arg("--dir")
        .arg(dir.path())
        .arg("shopping.search")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed specification id"));
}

#[test]
fn test_spec_resolves_json_document() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("shopping.search-v2.json"),
        r#"{
  "specId": "shopping.search:v2",
  "useCaseId": "shopping.search",
  "version": 2,
  "approvedAt": "2026-09-01T09:00:00Z",
  "approvedBy": "qa-lead",
  "requirements": { "minPassRate": 0.92, "successCriteria": "cites a product" }
}"#,
    )
    .unwrap();

    let mut cmd = assert_cmd::Command::cargo_bin("covbase").unwrap();
    cmd.arg("spec")
        .arg("--dir")
        .arg(dir.path())
        .arg("shopping.search:v2")
        .assert()
        .success()
        .stdout(predicate::str::contains("Min pass rate: 0.92"))
        .stdout(predicate::str::contains("cites a product"));
}
