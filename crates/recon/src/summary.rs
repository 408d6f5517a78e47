use crate::model::{FieldBreakCount, ReconSummary, ReconciliationResult, RecordStatus};

/// Compute summary statistics from classified results.
pub fn compute_summary(results: &[ReconciliationResult]) -> ReconSummary {
    let mut matching = 0;
    let mut different = 0;
    let mut missing_a = 0;
    let mut missing_b = 0;
    let mut total_breaks = 0;
    let mut breaks_by_field: Vec<FieldBreakCount> = Vec::new();

    for r in results {
        match r.status {
            RecordStatus::Matching => matching += 1,
            RecordStatus::Different => different += 1,
            RecordStatus::MissingA => missing_a += 1,
            RecordStatus::MissingB => missing_b += 1,
        }
        total_breaks += r.breaks;

        for field in &r.fields {
            let pos = match breaks_by_field.iter().position(|c| c.name == field.name) {
                Some(pos) => pos,
                None => {
                    breaks_by_field.push(FieldBreakCount {
                        name: field.name.clone(),
                        breaks: 0,
                    });
                    breaks_by_field.len() - 1
                }
            };
            if !field.matching {
                breaks_by_field[pos].breaks += 1;
            }
        }
    }

    let match_rate = if results.is_empty() {
        0.0
    } else {
        matching as f64 / results.len() as f64 * 100.0
    };

    ReconSummary {
        total: results.len(),
        matching,
        different,
        missing_a,
        missing_b,
        total_breaks,
        match_rate,
        breaks_by_field,
    }
}
