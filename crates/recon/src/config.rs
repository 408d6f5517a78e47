use std::path::Path;

use serde::Deserialize;

use crate::error::ReconError;
use crate::mapper::{get_display_name, propose_mappings};
use crate::model::{
    DataSource, FieldMapping, KeyMapping, MatchingRule, ReconciliationConfig, ToleranceKind,
};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// A reconciliation run described in TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    pub sources: SourcesConfig,
    /// Join fields. Defaults to each source's `key_field`.
    #[serde(default)]
    pub key: Option<KeyConfig>,
    /// Explicit mappings. When empty the field mapper proposes them.
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub principal: SourceConfig,
    pub counterparty: SourceConfig,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub file: String,
    pub key_field: String,
    #[serde(default)]
    pub format: Option<SourceFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Delimited text; the delimiter is detected from the first lines.
    Csv,
    /// Tab-separated text.
    Tsv,
    Json,
}

impl SourceFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl SourceConfig {
    /// Display name: explicit name, else the file stem.
    pub fn display_name(&self) -> String {
        if let Some(ref name) = self.name {
            return name.clone();
        }
        Path::new(&self.file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file)
            .to_string()
    }

    pub fn resolved_format(&self) -> Result<SourceFormat, ReconError> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        SourceFormat::from_path(Path::new(&self.file)).ok_or_else(|| {
            ReconError::ConfigValidation(format!(
                "cannot infer format of '{}'; set format = \"csv\", \"tsv\" or \"json\"",
                self.file
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Key + Mappings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct KeyConfig {
    pub principal: String,
    pub counterparty: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MappingConfig {
    pub principal: String,
    pub counterparty: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub rule: Option<MatchingRule>,
}

impl MappingConfig {
    pub fn to_field_mapping(&self) -> FieldMapping {
        FieldMapping {
            source_field_a: self.principal.clone(),
            source_field_b: self.counterparty.clone(),
            display_name: self
                .display_name
                .clone()
                .unwrap_or_else(|| get_display_name(&self.principal, &self.counterparty)),
            matching_rule: self.rule.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate + Build
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        for (side, source) in [
            ("principal", &self.sources.principal),
            ("counterparty", &self.sources.counterparty),
        ] {
            if source.file.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "source '{side}': file must not be empty"
                )));
            }
            if source.key_field.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "source '{side}': key_field must not be empty"
                )));
            }
            source.resolved_format()?;
        }

        if let Some(ref key) = self.key {
            if key.principal.trim().is_empty() || key.counterparty.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "key: both principal and counterparty fields are required".into(),
                ));
            }
        }

        for (i, mapping) in self.mappings.iter().enumerate() {
            if mapping.principal.trim().is_empty() || mapping.counterparty.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "mapping #{}: both principal and counterparty fields are required",
                    i + 1
                )));
            }
            if let Some(ref rule) = mapping.rule {
                validate_rule(rule)
                    .map_err(|msg| ReconError::ConfigValidation(format!("mapping #{}: {msg}", i + 1)))?;
            }
        }

        Ok(())
    }

    pub fn key_mapping(&self) -> KeyMapping {
        match self.key {
            Some(ref key) => KeyMapping::new(&key.principal, &key.counterparty),
            None => KeyMapping::new(
                &self.sources.principal.key_field,
                &self.sources.counterparty.key_field,
            ),
        }
    }

    /// Configured mappings, or mapper proposals when none are configured.
    pub fn field_mappings(&self, source_a: &DataSource, source_b: &DataSource) -> Vec<FieldMapping> {
        if self.mappings.is_empty() {
            propose_mappings(&source_a.fields, &source_b.fields)
        } else {
            self.mappings.iter().map(MappingConfig::to_field_mapping).collect()
        }
    }

    /// Assemble the engine input from already-loaded sources.
    pub fn build(&self, source_a: DataSource, source_b: DataSource) -> ReconciliationConfig {
        let mappings = self.field_mappings(&source_a, &source_b);
        ReconciliationConfig {
            name: self.name.clone(),
            source_a: Some(source_a),
            source_b: Some(source_b),
            mappings,
            key_mapping: self.key_mapping(),
        }
    }
}

fn validate_rule(rule: &MatchingRule) -> Result<(), String> {
    match rule {
        MatchingRule::Fuzzy {
            fuzzy_threshold: Some(t),
        } if !(0.0..=1.0).contains(t) => Err(format!("fuzzy_threshold must be in [0, 1], got {t}")),
        MatchingRule::Numeric {
            numeric_tolerance: Some(tol),
        } if !tol.value.is_finite() || tol.value < 0.0 => {
            let kind = match tol.kind {
                ToleranceKind::Absolute => "absolute",
                ToleranceKind::Percentage => "percentage",
            };
            Err(format!("{kind} tolerance must be a non-negative number, got {}", tol.value))
        }
        MatchingRule::Date {
            date_tolerance: Some(tol),
        } if !tol.days.is_finite() || tol.days < 0.0 => {
            Err(format!("date tolerance days must be non-negative, got {}", tol.days))
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
