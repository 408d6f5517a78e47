// Integration tests for the `tally` binary: exit codes, stdout/stderr contract.
// Run with: cargo test -p tally-cli --test cli_tests -- --nocapture

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn tally() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tally"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const CUSTOMERS: &str = "id,name,amount\n1,Acme,10\n2,Globex,20\n";

const AUTO_CONFIG: &str = r#"
name = "Customers"

[sources.principal]
name = "Billing"
file = "a.csv"
key_field = "id"

[sources.counterparty]
name = "CRM"
file = "b.csv"
key_field = "id"
"#;

/// Config + both sources in a fresh directory; sources resolve relative to it.
fn workspace(a: &str, b: &str) -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.csv", a);
    write(dir.path(), "b.csv", b);
    let config = write(dir.path(), "customers.recon.toml", AUTO_CONFIG);
    (dir, config)
}

// ===========================================================================
// tally run
// ===========================================================================

#[test]
fn run_all_matching_exits_zero() {
    let (_dir, config) = workspace(CUSTOMERS, CUSTOMERS);
    let output = tally().args(["run", &config, "--json"]).output().unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["meta"]["config_name"], "Customers");
    assert_eq!(report["summary"]["total"], 2);
    assert_eq!(report["summary"]["matching"], 2);
    assert_eq!(report["results"][0]["key"], "1");
    assert_eq!(report["results"][0]["status"], "matching");

    let err = stderr(&output);
    assert!(err.contains("Customers: 2 records, 2 matching"), "stderr: {err}");
}

#[test]
fn run_with_breaks_exits_one() {
    let (dir, config) = workspace(CUSTOMERS, "id,name,amount\n1,Acme,10\n2,Globex,25\n");
    let out_path = dir.path().join("result.json");
    let output = tally()
        .args(["run", &config, "--output", out_path.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty(), "no --json, stdout stays empty");

    let err = stderr(&output);
    assert!(err.contains("error: 1 of 2 records not matching"), "stderr: {err}");
    assert!(err.contains("breaks: 1 total (Amount 1)"), "stderr: {err}");

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(written["summary"]["different"], 1);
    assert_eq!(written["results"][1]["fields"][2]["break_reason"], "Difference: 5");
}

#[test]
fn run_one_sided_records_exit_one() {
    let (_dir, config) = workspace(CUSTOMERS, "id,name,amount\n1,Acme,10\n3,Initech,30\n");
    let output = tally().args(["run", &config, "--json"]).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["missing_a"], 1);
    assert_eq!(report["summary"]["missing_b"], 1);
    assert!(stderr(&output).contains("1 only in Billing, 1 only in CRM"));
}

#[test]
fn run_reports_diagnostics_on_stderr() {
    let (_dir, config) = workspace(
        "id,name,amount\n1,Acme,10\n,Nobody,0\n",
        "id,name,amount\n1,Acme,10\n1,Acme,10\n",
    );
    let output = tally().args(["run", &config]).output().unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let err = stderr(&output);
    assert!(err.contains("duplicate keys: counterparty '1' x2"), "stderr: {err}");
    assert!(err.contains("1 Billing record(s) without a key were skipped"), "stderr: {err}");
}

#[test]
fn run_explicit_mappings_with_rules() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.csv", "id,name,amount\n1,Acme Corp,100\n");
    write(dir.path(), "b.json", r#"[{"ref": 1, "client": "Acme Corp.", "total": 101}]"#);
    let config = write(
        dir.path(),
        "rules.recon.toml",
        r#"
name = "Rules"

[sources.principal]
file = "a.csv"
key_field = "id"

[sources.counterparty]
file = "b.json"
key_field = "ref"

[[mappings]]
principal = "name"
counterparty = "client"
rule = { type = "fuzzy", fuzzy_threshold = 0.85 }

[[mappings]]
principal = "amount"
counterparty = "total"
rule = { type = "numeric", numeric_tolerance = { type = "percentage", value = 2.0 } }
"#,
    );

    let output = tally().args(["run", &config, "--json"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["meta"]["source_a"], "a");
    assert_eq!(report["meta"]["source_b"], "b");
    assert_eq!(report["results"][0]["fields"][0]["name"], "Name");
    assert_eq!(report["results"][0]["fields"][1]["name"], "Total");
}

#[test]
fn run_tab_separated_source() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.csv", CUSTOMERS);
    write(dir.path(), "b.tsv", "id\tname\tamount\n1\tAcme\t10\n2\tGlobex\t20\n");
    let config = write(
        dir.path(),
        "tsv.recon.toml",
        &AUTO_CONFIG.replace("b.csv", "b.tsv"),
    );

    let output = tally().args(["run", &config, "--json"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["matching"], 2);
    let columns: Vec<&String> = report["results"][0]["source_b_data"]
        .as_object()
        .unwrap()
        .keys()
        .collect();
    assert_eq!(columns, vec!["id", "name", "amount"]);
}

#[test]
fn run_invalid_config_exits_three() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(
        dir.path(),
        "bad.recon.toml",
        &format!(
            "{AUTO_CONFIG}\n[[mappings]]\nprincipal = \"name\"\ncounterparty = \"name\"\nrule = {{ type = \"fuzzy\", fuzzy_threshold = 1.5 }}\n"
        ),
    );
    let output = tally().args(["run", &config]).output().unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("error: config validation error: mapping #1"));
}

#[test]
fn run_empty_source_exits_three() {
    let (_dir, config) = workspace("id,name,amount\n", CUSTOMERS);
    let output = tally().args(["run", &config]).output().unwrap();

    assert_eq!(output.status.code(), Some(3));
    let err = stderr(&output);
    assert!(err.contains("principal source has no records"), "stderr: {err}");
    assert!(err.contains("hint:"), "stderr: {err}");
}

#[test]
fn run_missing_source_file_exits_four() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.csv", CUSTOMERS);
    let config = write(dir.path(), "customers.recon.toml", AUTO_CONFIG);
    let output = tally().args(["run", &config]).output().unwrap();

    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("cannot read"));
}

#[test]
fn run_malformed_json_source_exits_four() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.csv", CUSTOMERS);
    write(dir.path(), "b.json", r#"{"id": 1}"#);
    let config = write(
        dir.path(),
        "json.recon.toml",
        &AUTO_CONFIG.replace("b.csv", "b.json"),
    );
    let output = tally().args(["run", &config]).output().unwrap();

    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("source 'CRM': expected a top-level array of objects"));
}

#[test]
fn run_missing_config_exits_four() {
    let output = tally().args(["run", "/nonexistent/x.recon.toml"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("cannot read config"));
}

#[test]
fn run_verbose_logs_engine_progress() {
    let (_dir, config) = workspace(CUSTOMERS, CUSTOMERS);
    let output = tally().args(["run", &config, "--verbose"]).output().unwrap();

    assert!(output.status.success());
    assert!(stderr(&output).contains("loaded source"));
}

// ===========================================================================
// tally map
// ===========================================================================

#[test]
fn map_prints_toml_mappings() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "invoices.csv", "customer_name,amount\nAcme,10\n");
    let b = write(dir.path(), "ledger.json", r#"[{"client": "Acme", "total": 10}]"#);

    let output = tally().args(["map", &a, &b]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: toml::Value = toml::from_str(&stdout).unwrap();
    let mappings = parsed["mappings"].as_array().unwrap();
    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings[0]["principal"].as_str(), Some("customer_name"));
    assert_eq!(mappings[0]["counterparty"].as_str(), Some("client"));
    assert_eq!(mappings[1]["display_name"].as_str(), Some("Total"));

    assert!(stderr(&output).contains("2 mapping(s) proposed from 2 x 2 fields"));
}

#[test]
fn map_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.csv", "invoice_id,Amount\n1,10\n");
    let b = write(dir.path(), "b.csv", "Invoice_ID,amount\n1,10\n");

    let output = tally().args(["map", &a, &b, "--json"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let mappings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let mappings = mappings.as_array().unwrap();
    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings[0]["display_name"], "Invoice Id");
    assert_eq!(mappings[1]["source_field_a"], "Amount");
    assert_eq!(mappings[1]["source_field_b"], "amount");
    assert_eq!(mappings[1]["display_name"], "Amount");
}

#[test]
fn map_unknown_extension_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.xlsx", "");
    let b = write(dir.path(), "b.csv", "id\n1\n");

    let output = tally().args(["map", &a, &b]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let err = stderr(&output);
    assert!(err.contains("cannot infer format"), "stderr: {err}");
    assert!(err.contains("hint:  use a .csv, .tsv or .json file"), "stderr: {err}");
}

// ===========================================================================
// tally validate + usage
// ===========================================================================

#[test]
fn validate_accepts_good_config() {
    let (_dir, config) = workspace(CUSTOMERS, CUSTOMERS);
    let output = tally().args(["validate", &config]).output().unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let err = stderr(&output);
    assert!(err.contains("valid: recon 'Customers'"), "stderr: {err}");
    assert!(err.contains("mappings proposed at run time"), "stderr: {err}");
}

#[test]
fn validate_rejects_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "x.recon.toml", "name = \"x\"\n[sources.principal]\nfile = \"a.csv\"\n");
    let output = tally().args(["validate", &config]).output().unwrap();

    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("config parse error"));
}

#[test]
fn missing_subcommand_is_usage_error() {
    let output = tally().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}
