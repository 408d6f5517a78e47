use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::compare::{compare_values_with_rules, get_break_reason};
use crate::error::ReconError;
use crate::model::{
    field_value, DataSource, Diagnostics, DuplicateKey, FieldMapping, FieldResult, ReconMeta,
    ReconReport, ReconciliationConfig, ReconciliationResult, Record, SourceSide,
};
use crate::summary::compute_summary;
use crate::value::Value;

pub const MISSING_IN_COUNTERPARTY: &str = "Missing in counterparty data";
pub const MISSING_IN_PRINCIPAL: &str = "Missing in principal data";

/// Run reconciliation per config. Returns results + summary + diagnostics.
pub fn run(config: &ReconciliationConfig) -> Result<ReconReport, ReconError> {
    let (source_a, source_b) = check_inputs(config)?;
    let (results, diagnostics) = reconcile(source_a, source_b, config);
    let summary = compute_summary(&results);

    Ok(ReconReport {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            source_a: source_a.name.clone(),
            source_b: source_b.name.clone(),
        },
        summary,
        diagnostics,
        results,
    })
}

/// Join both sources on the key mapping and classify every key.
///
/// Principal-derived rows come first in principal order, then counterparty
/// rows that were never matched, in the order their keys were first seen.
pub fn perform_reconciliation(
    config: &ReconciliationConfig,
) -> Result<Vec<ReconciliationResult>, ReconError> {
    let (source_a, source_b) = check_inputs(config)?;
    let (results, _) = reconcile(source_a, source_b, config);
    Ok(results)
}

fn check_inputs(config: &ReconciliationConfig) -> Result<(&DataSource, &DataSource), ReconError> {
    let source_a = config
        .source_a
        .as_ref()
        .ok_or(ReconError::MissingSource(SourceSide::Principal))?;
    let source_b = config
        .source_b
        .as_ref()
        .ok_or(ReconError::MissingSource(SourceSide::Counterparty))?;
    if config.mappings.is_empty() {
        return Err(ReconError::NoMappings);
    }
    if source_a.data.is_empty() {
        return Err(ReconError::EmptyData(SourceSide::Principal));
    }
    if source_b.data.is_empty() {
        return Err(ReconError::EmptyData(SourceSide::Counterparty));
    }
    Ok((source_a, source_b))
}

fn reconcile(
    source_a: &DataSource,
    source_b: &DataSource,
    config: &ReconciliationConfig,
) -> (Vec<ReconciliationResult>, Diagnostics) {
    let key_a = &config.key_mapping.source_a_field;
    let key_b = &config.key_mapping.source_b_field;
    let mappings = &config.mappings;

    debug!(
        principal = %source_a.name,
        counterparty = %source_b.name,
        principal_records = source_a.data.len(),
        counterparty_records = source_b.data.len(),
        mappings = mappings.len(),
        "starting reconciliation"
    );

    let mut diagnostics = Diagnostics::default();
    let mut index = CounterpartyIndex::build(source_b, key_b, &mut diagnostics);
    let mut principal_keys = KeyCounter::default();
    let mut results = Vec::with_capacity(source_a.data.len() + index.len());

    for (row, record_a) in source_a.data.iter().enumerate() {
        let key_value = field_value(record_a, key_a);
        if key_value.is_empty() {
            warn!(row, field = %key_a, "principal record has no key; skipped");
            diagnostics.skipped_principal.push(row);
            continue;
        }

        let key = key_value.display_string();
        principal_keys.observe(&key);

        let result = match index.take(&key) {
            Some(record_b) => compare_records(key, record_a, record_b, mappings),
            None => missing_counterparty(key, record_a, mappings),
        };
        results.push(result);
    }

    for (key, record_b) in index.into_remaining() {
        results.push(missing_principal(key, record_b, mappings));
    }

    diagnostics
        .duplicate_keys
        .extend(principal_keys.duplicates(SourceSide::Principal));
    for dup in &diagnostics.duplicate_keys {
        warn!(side = %dup.side, key = %dup.key, count = dup.count, "duplicate key");
    }

    debug!(results = results.len(), "reconciliation finished");
    (results, diagnostics)
}

fn compare_records(
    key: String,
    record_a: &Record,
    record_b: &Record,
    mappings: &[FieldMapping],
) -> ReconciliationResult {
    let fields = mappings
        .iter()
        .map(|m| {
            let value_a = field_value(record_a, &m.source_field_a);
            let value_b = field_value(record_b, &m.source_field_b);
            let rule = m.matching_rule.as_ref();
            let matching = compare_values_with_rules(value_a, value_b, rule);
            let break_reason = (!matching).then(|| get_break_reason(value_a, value_b, rule));
            FieldResult {
                name: m.display_name.clone(),
                value_a: value_a.clone(),
                value_b: value_b.clone(),
                matching,
                break_reason,
                field_a: m.source_field_a.clone(),
                field_b: m.source_field_b.clone(),
            }
        })
        .collect();

    ReconciliationResult::new(key, Some(record_a.clone()), Some(record_b.clone()), fields)
}

fn missing_counterparty(key: String, record_a: &Record, mappings: &[FieldMapping]) -> ReconciliationResult {
    let fields = mappings
        .iter()
        .map(|m| FieldResult {
            name: m.display_name.clone(),
            value_a: field_value(record_a, &m.source_field_a).clone(),
            value_b: Value::Null,
            matching: false,
            break_reason: Some(MISSING_IN_COUNTERPARTY.to_string()),
            field_a: m.source_field_a.clone(),
            field_b: m.source_field_b.clone(),
        })
        .collect();

    ReconciliationResult::new(key, Some(record_a.clone()), None, fields)
}

fn missing_principal(key: String, record_b: &Record, mappings: &[FieldMapping]) -> ReconciliationResult {
    let fields = mappings
        .iter()
        .map(|m| FieldResult {
            name: m.display_name.clone(),
            value_a: Value::Null,
            value_b: field_value(record_b, &m.source_field_b).clone(),
            matching: false,
            break_reason: Some(MISSING_IN_PRINCIPAL.to_string()),
            field_a: m.source_field_a.clone(),
            field_b: m.source_field_b.clone(),
        })
        .collect();

    ReconciliationResult::new(key, None, Some(record_b.clone()), fields)
}

// ---------------------------------------------------------------------------
// Counterparty lookup
// ---------------------------------------------------------------------------

/// Insertion-ordered key → record lookup over the counterparty source.
///
/// A repeated key overwrites the earlier record but keeps the slot of its
/// first occurrence. Taken keys leave an empty slot behind.
struct CounterpartyIndex<'a> {
    slots: Vec<Option<(String, &'a Record)>>,
    positions: HashMap<String, usize>,
}

impl<'a> CounterpartyIndex<'a> {
    fn build(source: &'a DataSource, key_field: &str, diagnostics: &mut Diagnostics) -> Self {
        let mut index = Self {
            slots: Vec::with_capacity(source.data.len()),
            positions: HashMap::with_capacity(source.data.len()),
        };
        let mut keys = KeyCounter::default();

        for (row, record) in source.data.iter().enumerate() {
            let key_value = field_value(record, key_field);
            let key = if key_value.is_empty() {
                warn!(row, field = %key_field, "counterparty record has no key; using placeholder");
                diagnostics.placeholder_counterparty.push(row);
                placeholder_key(source, row)
            } else {
                key_value.display_string()
            };

            keys.observe(&key);
            match index.positions.get(&key) {
                Some(&slot) => index.slots[slot] = Some((key, record)),
                None => {
                    index.positions.insert(key.clone(), index.slots.len());
                    index.slots.push(Some((key, record)));
                }
            }
        }

        diagnostics
            .duplicate_keys
            .extend(keys.duplicates(SourceSide::Counterparty));
        index
    }

    fn len(&self) -> usize {
        self.positions.len()
    }

    fn take(&mut self, key: &str) -> Option<&'a Record> {
        let slot = self.positions.remove(key)?;
        self.slots[slot].take().map(|(_, record)| record)
    }

    fn into_remaining(self) -> impl Iterator<Item = (String, &'a Record)> {
        self.slots.into_iter().flatten()
    }
}

/// Stable stand-in key for a counterparty record with no key value.
/// Derived from the source id and row so reruns produce the same key.
fn placeholder_key(source: &DataSource, row: usize) -> String {
    let name = format!("{}:{row}", source.id);
    format!("unkeyed-{}", Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
}

/// Counts key occurrences, remembering first-seen order.
#[derive(Default)]
struct KeyCounter {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl KeyCounter {
    fn observe(&mut self, key: &str) {
        match self.counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                self.order.push(key.to_string());
                self.counts.insert(key.to_string(), 1);
            }
        }
    }

    fn duplicates(self, side: SourceSide) -> Vec<DuplicateKey> {
        let counts = self.counts;
        self.order
            .into_iter()
            .filter_map(|key| {
                let count = counts.get(&key).copied().unwrap_or(0);
                (count > 1).then_some(DuplicateKey { side, key, count })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
