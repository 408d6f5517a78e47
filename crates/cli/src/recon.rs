//! `tally run | map | validate`: config-driven two-source reconciliation.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tally_recon::config::{SourceConfig, SourceFormat};
use tally_recon::load::{load_records, load_source};
use tally_recon::model::{DataSource, ReconReport};
use tally_recon::{generate_default_mappings, ReconConfig, ReconError};

use crate::exit_codes::EXIT_RECON_MISMATCH;
use crate::CliError;

// ============================================================================
// run
// ============================================================================

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = read_config(&config_path)?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let source_a = load_configured_source(base_dir, "principal", &config.sources.principal)?;
    let source_b = load_configured_source(base_dir, "counterparty", &config.sources.counterparty)?;

    let input = config.build(source_a, source_b);
    let report = tally_recon::run(&input).map_err(CliError::recon)?;

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::io(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&report);

    let s = &report.summary;
    if s.matching < s.total {
        return Err(CliError {
            code: EXIT_RECON_MISMATCH,
            message: format!("{} of {} records not matching", s.total - s.matching, s.total),
            hint: None,
        });
    }

    Ok(())
}

fn read_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| CliError::io(format!("cannot read config: {e}")))?;
    ReconConfig::from_toml(&config_str).map_err(CliError::recon)
}

fn load_configured_source(
    base_dir: &Path,
    id: &str,
    source: &SourceConfig,
) -> Result<DataSource, CliError> {
    let path = base_dir.join(&source.file);
    let text = std::fs::read_to_string(&path)
        .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))
        .map_err(CliError::recon)?;
    let format = source.resolved_format().map_err(CliError::recon)?;
    let loaded = load_source(id, &source.display_name(), format, &text, &source.key_field)
        .map_err(CliError::recon)?;
    tracing::debug!(
        source = id,
        file = %path.display(),
        records = loaded.data.len(),
        fields = loaded.fields.len(),
        "loaded source"
    );
    Ok(loaded)
}

/// Human summary to stderr.
fn print_summary(report: &ReconReport) {
    let s = &report.summary;
    let m = &report.meta;
    eprintln!(
        "{}: {} records, {} matching, {} different, {} only in {}, {} only in {} ({:.1}% matching)",
        m.config_name,
        s.total,
        s.matching,
        s.different,
        s.missing_b,
        m.source_a,
        s.missing_a,
        m.source_b,
        s.match_rate,
    );

    let field_breaks: Vec<String> = s
        .breaks_by_field
        .iter()
        .filter(|f| f.breaks > 0)
        .map(|f| format!("{} {}", f.name, f.breaks))
        .collect();
    if !field_breaks.is_empty() {
        eprintln!("breaks: {} total ({})", s.total_breaks, field_breaks.join(", "));
    }

    let d = &report.diagnostics;
    if d.is_clean() {
        return;
    }
    if !d.duplicate_keys.is_empty() {
        let keys: Vec<String> = d
            .duplicate_keys
            .iter()
            .map(|k| format!("{} '{}' x{}", k.side, k.key, k.count))
            .collect();
        eprintln!("warning: duplicate keys: {}", keys.join(", "));
    }
    if !d.skipped_principal.is_empty() {
        eprintln!(
            "warning: {} {} record(s) without a key were skipped",
            d.skipped_principal.len(),
            m.source_a,
        );
    }
    if !d.placeholder_counterparty.is_empty() {
        eprintln!(
            "warning: {} {} record(s) without a key were reported as unmatched",
            d.placeholder_counterparty.len(),
            m.source_b,
        );
    }
}

// ============================================================================
// map
// ============================================================================

#[derive(Serialize)]
struct ProposedMappings {
    mappings: Vec<ProposedMapping>,
}

#[derive(Serialize)]
struct ProposedMapping {
    principal: String,
    counterparty: String,
    display_name: String,
}

pub fn cmd_map(principal: PathBuf, counterparty: PathBuf, json_output: bool) -> Result<(), CliError> {
    let source_a = load_for_mapping("principal", &principal)?;
    let source_b = load_for_mapping("counterparty", &counterparty)?;

    let mappings = generate_default_mappings(&source_a, &source_b);
    eprintln!(
        "{} mapping(s) proposed from {} x {} fields",
        mappings.len(),
        source_a.fields.len(),
        source_b.fields.len(),
    );

    if json_output {
        let json_str = serde_json::to_string_pretty(&mappings)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    if mappings.is_empty() {
        return Ok(());
    }

    let proposed = ProposedMappings {
        mappings: mappings
            .into_iter()
            .map(|m| ProposedMapping {
                principal: m.source_field_a,
                counterparty: m.source_field_b,
                display_name: m.display_name,
            })
            .collect(),
    };
    let toml_str = toml::to_string(&proposed)
        .map_err(|e| CliError::io(format!("TOML serialization error: {e}")))?;
    print!("{toml_str}");
    Ok(())
}

fn load_for_mapping(id: &str, path: &Path) -> Result<DataSource, CliError> {
    let format = SourceFormat::from_path(path).ok_or_else(|| {
        CliError::args(format!("cannot infer format of {}", path.display()))
            .with_hint("use a .csv, .tsv or .json file")
    })?;
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(id);
    load_records(id, name, format, &text).map_err(CliError::recon)
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let key = config.key_mapping();
    let mappings = if config.mappings.is_empty() {
        "mappings proposed at run time".to_string()
    } else {
        format!("{} mapping(s)", config.mappings.len())
    };
    eprintln!(
        "valid: recon '{}' ({} '{}' <-> {} '{}'), {}",
        config.name,
        config.sources.principal.display_name(),
        key.source_a_field,
        config.sources.counterparty.display_name(),
        key.source_b_field,
        mappings,
    );
    for m in &config.mappings {
        let rule = m.rule.as_ref().map_or("exact", |r| r.name());
        eprintln!("  {} <-> {} ({rule})", m.principal, m.counterparty);
    }
    Ok(())
}
