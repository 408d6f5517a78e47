//! Field mapper: proposes which counterparty field lines up with each
//! principal field, by name similarity.

use crate::model::{DataSource, FieldMapping};

/// Minimum score for a proposed pair to be kept.
pub const MIN_MAPPING_SCORE: u32 = 60;

const SCORE_EXACT: u32 = 100;
const SCORE_CONTAINS: u32 = 70;
const SCORE_SYNONYM: u32 = 60;

/// Key term and the names that mean the same thing.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("customer", &["client", "buyer", "purchaser"]),
    ("product", &["item", "service", "offering"]),
    ("amount", &["value", "price", "cost", "total"]),
    ("date", &["transaction_date", "created", "timestamp"]),
    ("status", &["payment_status", "state", "condition"]),
];

pub fn generate_default_mappings(source_a: &DataSource, source_b: &DataSource) -> Vec<FieldMapping> {
    propose_mappings(&source_a.fields, &source_b.fields)
}

/// Best counterparty field per principal field. Counterparty fields may be reused.
pub fn propose_mappings(fields_a: &[String], fields_b: &[String]) -> Vec<FieldMapping> {
    let mut mappings = Vec::new();

    for field_a in fields_a {
        let mut best: Option<(&String, u32)> = None;
        for field_b in fields_b {
            let score = score_fields(field_a, field_b);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((field_b, score));
            }
        }

        if let Some((field_b, score)) = best {
            if score >= MIN_MAPPING_SCORE {
                mappings.push(FieldMapping::new(
                    field_a.clone(),
                    field_b.clone(),
                    get_display_name(field_a, field_b),
                ));
            }
        }
    }

    mappings
}

pub fn score_fields(a: &str, b: &str) -> u32 {
    let la = a.to_lowercase();
    let lb = b.to_lowercase();

    if la == lb {
        SCORE_EXACT
    } else if la.contains(&lb) || lb.contains(&la) {
        SCORE_CONTAINS
    } else if are_synonyms(&la, &lb) {
        SCORE_SYNONYM
    } else {
        0
    }
}

fn are_synonyms(la: &str, lb: &str) -> bool {
    SYNONYMS.iter().any(|(term, synonyms)| {
        let hit = |x: &str, y: &str| x.contains(term) && synonyms.iter().any(|s| y.contains(s));
        hit(la, lb) || hit(lb, la)
    })
}

/// Column label for a mapped pair: the shared name, or else the shorter one.
pub fn get_display_name(a: &str, b: &str) -> String {
    if a.to_lowercase() == b.to_lowercase() {
        return title_case(a);
    }
    let shorter = if a.chars().count() <= b.chars().count() { a } else { b };
    title_case(shorter)
}

/// `invoice_id` → `Invoice Id`, `customerName` → `Customer Name`.
pub fn title_case(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for c in name.chars() {
        if c == '_' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else {
            let boundary = c.is_uppercase()
                && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.push(c);
        }
        prev = Some(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
