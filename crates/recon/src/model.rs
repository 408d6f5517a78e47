use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::{Value, NULL};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Which side of the reconciliation a source sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSide {
    /// Source A, the reference dataset.
    Principal,
    /// Source B, the comparison dataset.
    Counterparty,
}

impl SourceSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Principal => "principal",
            Self::Counterparty => "counterparty",
        }
    }
}

impl std::fmt::Display for SourceSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Csv,
    Json,
    Api,
    #[default]
    Uploaded,
}

/// One row: field name to value, in source column order. Absent fields read as null.
pub type Record = IndexMap<String, Value>;

/// Read a field, treating an absent field the same as an explicit null.
pub fn field_value<'a>(record: &'a Record, field: &str) -> &'a Value {
    record.get(field).unwrap_or(&NULL)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub source_type: SourceType,
    pub fields: Vec<String>,
    pub data: Vec<Record>,
    pub key_field: String,
}

impl DataSource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source_type,
            fields: Vec::new(),
            data: Vec::new(),
            key_field: String::new(),
        }
    }

    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    /// Replace the records, listing fields in first-seen order.
    pub fn with_records(mut self, data: Vec<Record>) -> Self {
        let mut fields: Vec<String> = Vec::new();
        for record in &data {
            for name in record.keys() {
                if !fields.contains(name) {
                    fields.push(name.clone());
                }
            }
        }
        self.fields = fields;
        self.data = data;
        self
    }
}

// ---------------------------------------------------------------------------
// Mappings + rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceKind {
    Absolute,
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericTolerance {
    #[serde(rename = "type")]
    pub kind: ToleranceKind,
    pub value: f64,
}

impl Default for NumericTolerance {
    fn default() -> Self {
        Self {
            kind: ToleranceKind::Absolute,
            value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateTolerance {
    pub days: f64,
}

impl Default for DateTolerance {
    fn default() -> Self {
        Self { days: 1.0 }
    }
}

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;

/// Tolerance policy applied when comparing two mapped values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchingRule {
    #[default]
    Exact,
    Fuzzy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fuzzy_threshold: Option<f64>,
    },
    Numeric {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        numeric_tolerance: Option<NumericTolerance>,
    },
    Date {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date_tolerance: Option<DateTolerance>,
    },
    /// Reserved. Compared as [`MatchingRule::Exact`] until an evaluator exists.
    Custom { custom_rule: String },
}

impl MatchingRule {
    pub fn fuzzy(threshold: f64) -> Self {
        Self::Fuzzy {
            fuzzy_threshold: Some(threshold),
        }
    }

    pub fn numeric(kind: ToleranceKind, value: f64) -> Self {
        Self::Numeric {
            numeric_tolerance: Some(NumericTolerance { kind, value }),
        }
    }

    pub fn date(days: f64) -> Self {
        Self::Date {
            date_tolerance: Some(DateTolerance { days }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy { .. } => "fuzzy",
            Self::Numeric { .. } => "numeric",
            Self::Date { .. } => "date",
            Self::Custom { .. } => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field_a: String,
    pub source_field_b: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_rule: Option<MatchingRule>,
}

impl FieldMapping {
    pub fn new(
        source_field_a: impl Into<String>,
        source_field_b: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            source_field_a: source_field_a.into(),
            source_field_b: source_field_b.into(),
            display_name: display_name.into(),
            matching_rule: None,
        }
    }

    pub fn with_rule(mut self, rule: MatchingRule) -> Self {
        self.matching_rule = Some(rule);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMapping {
    pub source_a_field: String,
    pub source_b_field: String,
}

impl KeyMapping {
    pub fn new(source_a_field: impl Into<String>, source_b_field: impl Into<String>) -> Self {
        Self {
            source_a_field: source_a_field.into(),
            source_b_field: source_b_field.into(),
        }
    }
}

/// Everything one engine invocation needs. Built fresh per run.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationConfig {
    pub name: String,
    pub source_a: Option<DataSource>,
    pub source_b: Option<DataSource>,
    pub mappings: Vec<FieldMapping>,
    pub key_mapping: KeyMapping,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    #[serde(rename = "matching")]
    Matching,
    #[serde(rename = "different")]
    Different,
    #[serde(rename = "missing-a")]
    MissingA,
    #[serde(rename = "missing-b")]
    MissingB,
}

impl RecordStatus {
    /// Status is a function of which sides are present and the break count.
    pub fn derive(has_a: bool, has_b: bool, breaks: usize) -> Self {
        match (has_a, has_b) {
            (_, false) => Self::MissingB,
            (false, true) => Self::MissingA,
            (true, true) if breaks > 0 => Self::Different,
            (true, true) => Self::Matching,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matching => "matching",
            Self::Different => "different",
            Self::MissingA => "missing-a",
            Self::MissingB => "missing-b",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResult {
    pub name: String,
    pub value_a: Value,
    pub value_b: Value,
    pub matching: bool,
    pub break_reason: Option<String>,
    pub field_a: String,
    pub field_b: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub key: String,
    pub source_a_data: Option<Record>,
    pub source_b_data: Option<Record>,
    pub fields: Vec<FieldResult>,
    pub status: RecordStatus,
    pub breaks: usize,
}

impl ReconciliationResult {
    /// Assemble a result, deriving `breaks` and `status` from the parts.
    pub fn new(
        key: String,
        source_a_data: Option<Record>,
        source_b_data: Option<Record>,
        fields: Vec<FieldResult>,
    ) -> Self {
        let breaks = fields.iter().filter(|f| !f.matching).count();
        let status = RecordStatus::derive(source_a_data.is_some(), source_b_data.is_some(), breaks);
        Self {
            key,
            source_a_data,
            source_b_data,
            fields,
            status,
            breaks,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary + Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconSummary {
    pub total: usize,
    pub matching: usize,
    pub different: usize,
    pub missing_a: usize,
    pub missing_b: usize,
    pub total_breaks: usize,
    /// Share of results that fully match, as a percentage.
    pub match_rate: f64,
    pub breaks_by_field: Vec<FieldBreakCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldBreakCount {
    pub name: String,
    pub breaks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub side: SourceSide,
    pub key: String,
    pub count: usize,
}

/// Per-record anomalies that the join tolerates but the caller may want to see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub duplicate_keys: Vec<DuplicateKey>,
    /// Indexes of principal records dropped for having no key.
    pub skipped_principal: Vec<usize>,
    /// Indexes of counterparty records given a placeholder key.
    pub placeholder_counterparty: Vec<usize>,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.duplicate_keys.is_empty()
            && self.skipped_principal.is_empty()
            && self.placeholder_counterparty.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub source_a: String,
    pub source_b: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub diagnostics: Diagnostics,
    pub results: Vec<ReconciliationResult>,
}
