//! Matching rules: pure comparison of two field values.
//!
//! Emptiness is checked before any rule applies: two nulls match, one null
//! never does. Values a rule cannot interpret (a non-numeric value under a
//! numeric rule, an unparsable date under a date rule) are a non-match.

use crate::model::{
    DateTolerance, MatchingRule, NumericTolerance, ToleranceKind, DEFAULT_FUZZY_THRESHOLD,
};
use crate::value::{format_number, Value};

const MS_PER_DAY: f64 = 86_400_000.0;

pub const PRINCIPAL_EMPTY: &str = "Principal value is empty";
pub const COUNTERPARTY_EMPTY: &str = "Counterparty value is empty";
pub const VALUE_MISMATCH: &str = "Value mismatch";

/// Compare two values under `rule` (exact when absent).
pub fn compare_values_with_rules(a: &Value, b: &Value, rule: Option<&MatchingRule>) -> bool {
    if a.is_empty() || b.is_empty() {
        return a.is_empty() && b.is_empty();
    }

    match rule.unwrap_or(&MatchingRule::Exact) {
        MatchingRule::Exact | MatchingRule::Custom { .. } => exact_match(a, b),
        MatchingRule::Fuzzy { fuzzy_threshold } => {
            fuzzy_match(a, b, fuzzy_threshold.unwrap_or(DEFAULT_FUZZY_THRESHOLD))
        }
        MatchingRule::Numeric { numeric_tolerance } => {
            numeric_match(a, b, &numeric_tolerance.unwrap_or_default())
        }
        MatchingRule::Date { date_tolerance } => {
            date_match(a, b, &date_tolerance.unwrap_or_default())
        }
    }
}

/// Trimmed, case-insensitive text equality.
pub fn exact_match(a: &Value, b: &Value) -> bool {
    normalized(a) == normalized(b)
}

pub fn fuzzy_match(a: &Value, b: &Value, threshold: f64) -> bool {
    let (na, nb) = (normalized(a), normalized(b));
    na == nb || similarity(&na, &nb) >= threshold
}

pub fn numeric_match(a: &Value, b: &Value, tolerance: &NumericTolerance) -> bool {
    let (Some(x), Some(y)) = (a.as_number(), b.as_number()) else {
        return false;
    };
    match tolerance.kind {
        ToleranceKind::Absolute => (x - y).abs() <= tolerance.value,
        ToleranceKind::Percentage => {
            if x == 0.0 && y == 0.0 {
                return true;
            }
            if x == 0.0 || y == 0.0 {
                return false;
            }
            // Relative to the mean of both sides, not to `a`.
            (x - y).abs() / ((x + y) / 2.0) * 100.0 <= tolerance.value
        }
    }
}

pub fn date_match(a: &Value, b: &Value, tolerance: &DateTolerance) -> bool {
    match day_difference(a, b) {
        Some(days) => days <= tolerance.days,
        None => false,
    }
}

/// Absolute difference in (fractional) days, if both sides parse as dates.
pub fn day_difference(a: &Value, b: &Value) -> Option<f64> {
    let (x, y) = (a.as_datetime()?, b.as_datetime()?);
    let ms = (x - y).num_milliseconds() as f64;
    Some(ms.abs() / MS_PER_DAY)
}

/// Edit distance with unit insertion, deletion and substitution costs.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());

    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=m {
        dp[0][j] = j;
    }

    for i in 1..=n {
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
        }
    }

    dp[n][m]
}

/// `1 - distance / longest length`, in `[0, 1]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Human-readable explanation for a mismatched pair.
pub fn get_break_reason(a: &Value, b: &Value, rule: Option<&MatchingRule>) -> String {
    if a.is_empty() {
        return PRINCIPAL_EMPTY.to_string();
    }
    if b.is_empty() {
        return COUNTERPARTY_EMPTY.to_string();
    }

    let specific = match rule {
        Some(MatchingRule::Fuzzy { .. }) => {
            let pct = similarity(&normalized(a), &normalized(b)) * 100.0;
            Some(format!("Similarity: {pct:.1}%"))
        }
        Some(MatchingRule::Numeric { .. }) => numeric_reason(a, b),
        Some(MatchingRule::Date { .. }) => {
            day_difference(a, b).map(|days| format!("Date difference: {days:.1} days"))
        }
        Some(MatchingRule::Exact) | Some(MatchingRule::Custom { .. }) | None => None,
    };

    specific.unwrap_or_else(|| default_reason(a, b))
}

fn numeric_reason(a: &Value, b: &Value) -> Option<String> {
    let (x, y) = (a.as_number()?, b.as_number()?);
    let diff = (x - y).abs();
    if x == 0.0 {
        return Some(format!("Difference: {}", format_amount(diff)));
    }
    // Relative to the principal value, unlike the match test.
    let pct = diff / x.abs() * 100.0;
    Some(format!(
        "Difference: {} ({pct:.2}% of principal)",
        format_amount(diff)
    ))
}

fn default_reason(a: &Value, b: &Value) -> String {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            format!("Difference: {}", format_amount((x - y).abs()))
        }
        _ => VALUE_MISMATCH.to_string(),
    }
}

fn format_amount(n: f64) -> String {
    // Two decimals, minus float noise like 0.30000000000000004.
    format_number((n * 100.0).round() / 100.0)
}

fn normalized(v: &Value) -> String {
    v.display_string().trim().to_lowercase()
}
