use std::path::PathBuf;

use tally_recon::config::ReconConfig;
use tally_recon::load::load_source;
use tally_recon::model::{DuplicateKey, RecordStatus, ReconReport, SourceSide};
use tally_recon::{run, ReconciliationConfig, Value};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn build(config_file: &str) -> ReconciliationConfig {
    let dir = fixtures_dir();
    let config_str = std::fs::read_to_string(dir.join(config_file)).unwrap();
    let config = ReconConfig::from_toml(&config_str).unwrap();

    let load = |id: &str, source: &tally_recon::config::SourceConfig| {
        let path = dir.join(&source.file);
        let text = std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
        load_source(
            id,
            &source.display_name(),
            source.resolved_format().unwrap(),
            &text,
            &source.key_field,
        )
        .unwrap()
    };

    let source_a = load("principal", &config.sources.principal);
    let source_b = load("counterparty", &config.sources.counterparty);
    config.build(source_a, source_b)
}

fn load_and_run(config_file: &str) -> ReconReport {
    run(&build(config_file)).unwrap()
}

fn find<'a>(report: &'a ReconReport, key: &str) -> &'a tally_recon::ReconciliationResult {
    report
        .results
        .iter()
        .find(|r| r.key == key)
        .unwrap_or_else(|| panic!("no result for key {key}"))
}

// -------------------------------------------------------------------------
// Configured mappings
// -------------------------------------------------------------------------

#[test]
fn invoices_vs_ledger_summary() {
    let report = load_and_run("invoices-vs-ledger.recon.toml");

    assert_eq!(report.meta.config_name, "Invoices vs Ledger");
    assert_eq!(report.meta.source_a, "Invoices");
    assert_eq!(report.meta.source_b, "Ledger");

    let s = &report.summary;
    assert_eq!(s.total, 6);
    assert_eq!(s.matching, 1);
    assert_eq!(s.different, 2);
    assert_eq!(s.missing_b, 1);
    assert_eq!(s.missing_a, 2);
    assert_eq!(s.total_breaks, 15);
}

#[test]
fn invoices_vs_ledger_result_order() {
    let report = load_and_run("invoices-vs-ledger.recon.toml");
    let keys: Vec<&str> = report.results.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(&keys[..5], &["INV-001", "INV-002", "INV-003", "INV-004", "INV-009"]);
    assert!(keys[5].starts_with("unkeyed-"));
}

#[test]
fn tolerant_rules_absorb_small_differences() {
    let report = load_and_run("invoices-vs-ledger.recon.toml");
    let r = find(&report, "INV-001");
    assert_eq!(r.status, RecordStatus::Matching);
    assert_eq!(r.breaks, 0);
    let names: Vec<&str> = r.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Customer", "Total", "Issued", "State"]);
}

#[test]
fn break_reasons_per_rule() {
    let report = load_and_run("invoices-vs-ledger.recon.toml");

    let globex = find(&report, "INV-002");
    assert_eq!(globex.status, RecordStatus::Different);
    assert_eq!(globex.breaks, 1);
    assert_eq!(globex.fields[0].break_reason.as_deref(), Some("Similarity: 60.0%"));

    let initech = find(&report, "INV-003");
    assert_eq!(initech.breaks, 2);
    assert_eq!(
        initech.fields[1].break_reason.as_deref(),
        Some("Difference: 5 (6.67% of principal)")
    );
    assert_eq!(
        initech.fields[2].break_reason.as_deref(),
        Some("Date difference: 4.0 days")
    );
    assert!(initech.fields[3].matching);
}

#[test]
fn one_sided_rows() {
    let report = load_and_run("invoices-vs-ledger.recon.toml");

    let umbrella = find(&report, "INV-004");
    assert_eq!(umbrella.status, RecordStatus::MissingB);
    assert_eq!(umbrella.breaks, 4);
    assert!(umbrella.fields.iter().all(|f| !f.matching && f.value_b.is_empty()));

    // Last write wins for the duplicated counterparty key.
    let hooli = find(&report, "INV-009");
    assert_eq!(hooli.status, RecordStatus::MissingA);
    assert_eq!(hooli.fields[1].value_b, Value::Number(13.0));
}

#[test]
fn diagnostics_surface_data_quality() {
    let report = load_and_run("invoices-vs-ledger.recon.toml");
    let d = &report.diagnostics;
    assert_eq!(d.skipped_principal, vec![4]);
    assert_eq!(d.placeholder_counterparty, vec![5]);
    assert_eq!(
        d.duplicate_keys,
        vec![DuplicateKey {
            side: SourceSide::Counterparty,
            key: "INV-009".into(),
            count: 2,
        }]
    );
}

#[test]
fn reruns_are_identical() {
    let config = build("invoices-vs-ledger.recon.toml");
    let first = run(&config).unwrap();
    let second = run(&config).unwrap();
    assert_eq!(first.results, second.results);
    assert_eq!(first.summary, second.summary);
    assert_eq!(first.diagnostics, second.diagnostics);
}

#[test]
fn report_serializes_statuses() {
    let report = load_and_run("invoices-vs-ledger.recon.toml");
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["results"][0]["status"], "matching");
    assert_eq!(json["results"][3]["status"], "missing-b");
    assert_eq!(json["results"][4]["status"], "missing-a");
    assert_eq!(json["results"][3]["fields"][0]["value_b"], serde_json::Value::Null);
    assert_eq!(json["summary"]["missing_a"], 2);
}

// -------------------------------------------------------------------------
// Mapper-proposed mappings
// -------------------------------------------------------------------------

#[test]
fn auto_mapping_uses_synonyms() {
    let config = build("auto-mapped.recon.toml");
    let pairs: Vec<(&str, &str, &str)> = config
        .mappings
        .iter()
        .map(|m| {
            (
                m.source_field_a.as_str(),
                m.source_field_b.as_str(),
                m.display_name.as_str(),
            )
        })
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("customer_name", "client", "Client"),
            ("amount", "total", "Total"),
            ("status", "state", "State"),
        ]
    );
}

#[test]
fn auto_mapping_compares_exactly() {
    let report = load_and_run("auto-mapped.recon.toml");
    let acme = find(&report, "INV-001");
    assert_eq!(acme.status, RecordStatus::Different);
    assert_eq!(acme.breaks, 1);
    assert_eq!(acme.fields[1].break_reason.as_deref(), Some("Difference: 1"));
}
