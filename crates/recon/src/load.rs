//! Source ingestion: CSV and JSON text into [`DataSource`] records.
//!
//! Lives outside the engine. The engine never reads files; callers load
//! sources here (or build them any other way) and pass them in.

use chrono::NaiveDate;

use crate::config::SourceFormat;
use crate::error::ReconError;
use crate::model::{DataSource, Record, SourceType};
use crate::value::Value;

/// Load source text in the given format.
pub fn load_source(
    id: &str,
    name: &str,
    format: SourceFormat,
    text: &str,
    key_field: &str,
) -> Result<DataSource, ReconError> {
    Ok(load_records(id, name, format, text)?.with_key_field(key_field))
}

/// Load source text without a key field, e.g. to inspect its fields.
pub fn load_records(
    id: &str,
    name: &str,
    format: SourceFormat,
    text: &str,
) -> Result<DataSource, ReconError> {
    match format {
        SourceFormat::Csv => load_csv(id, name, text),
        SourceFormat::Tsv => load_delimited(id, name, text, b'\t'),
        SourceFormat::Json => load_json(id, name, text),
    }
}

/// Parse delimited text with a header row, detecting the delimiter.
pub fn load_csv(id: &str, name: &str, text: &str) -> Result<DataSource, ReconError> {
    let text = strip_bom(text);
    load_delimited(id, name, text, sniff_delimiter(text))
}

/// Parse delimited text with a header row. Cells are typed with
/// [`Value::infer`]; short rows leave trailing fields absent.
pub fn load_delimited(
    id: &str,
    name: &str,
    text: &str,
    delimiter: u8,
) -> Result<DataSource, ReconError> {
    let text = strip_bom(text);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let parse_err = |e: csv::Error| ReconError::Parse {
        source: name.to_string(),
        message: e.to_string(),
    };

    let headers: Vec<String> = reader
        .headers()
        .map_err(parse_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut data = Vec::new();
    for row in reader.records() {
        let row = row.map_err(parse_err)?;
        let mut record = Record::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            record.insert(header.clone(), Value::infer(cell));
        }
        data.push(record);
    }

    let mut source = DataSource::new(id, name, SourceType::Csv);
    source.fields = headers;
    source.data = data;
    Ok(source)
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Pick the delimiter that splits the first lines most consistently.
///
/// Each candidate scores `lines agreeing with line 1 * fields on line 1`;
/// a candidate that leaves line 1 whole is never chosen. Falls back to comma.
fn sniff_delimiter(text: &str) -> u8 {
    const CANDIDATES: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample: Vec<&str> = text.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0usize;

    for &delimiter in CANDIDATES {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delimiter)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map_or(1, |r| r.len())
            })
            .collect();

        let Some(&target) = counts.first() else {
            continue;
        };
        if target <= 1 {
            continue;
        }
        let score = counts.iter().filter(|&&c| c == target).count() * target;
        if score > best_score {
            best_score = score;
            best = delimiter;
        }
    }

    best
}

/// Parse a JSON array of flat objects. Field order is first-seen order.
pub fn load_json(id: &str, name: &str, text: &str) -> Result<DataSource, ReconError> {
    let err = |message: String| ReconError::Parse {
        source: name.to_string(),
        message,
    };

    let parsed: serde_json::Value =
        serde_json::from_str(text).map_err(|e| err(format!("invalid JSON: {e}")))?;
    let rows = parsed
        .as_array()
        .ok_or_else(|| err("expected a top-level array of objects".into()))?;

    let mut fields: Vec<String> = Vec::new();
    let mut data = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let object = row
            .as_object()
            .ok_or_else(|| err(format!("record {i} is not an object")))?;
        let mut record = Record::new();
        for (field, raw) in object {
            let value = json_scalar(raw)
                .ok_or_else(|| err(format!("record {i}, field '{field}': nested values are not supported")))?;
            if !fields.contains(field) {
                fields.push(field.clone());
            }
            record.insert(field.clone(), value);
        }
        data.push(record);
    }

    let mut source = DataSource::new(id, name, SourceType::Json);
    source.fields = fields;
    source.data = data;
    Ok(source)
}

fn json_scalar(raw: &serde_json::Value) -> Option<Value> {
    match raw {
        serde_json::Value::Null => Some(Value::Null),
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => n.as_f64().map(Value::Number),
        serde_json::Value::String(s) => Some(match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => Value::Date(d),
            Err(_) => Value::String(s.clone()),
        }),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}
