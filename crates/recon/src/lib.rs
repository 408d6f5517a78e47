//! `tally-recon`: two-source field reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded sources and field mappings, returns
//! classified per-key results. The [`load`] and [`config`] modules are the
//! only places that touch text formats; nothing here does file IO.

pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod load;
pub mod mapper;
pub mod model;
pub mod summary;
pub mod value;

pub use compare::{compare_values_with_rules, get_break_reason, levenshtein};
pub use config::ReconConfig;
pub use engine::{perform_reconciliation, run};
pub use error::ReconError;
pub use mapper::{generate_default_mappings, get_display_name};
pub use model::{
    DataSource, FieldMapping, KeyMapping, MatchingRule, ReconReport, ReconciliationConfig,
    ReconciliationResult, Record, RecordStatus,
};
pub use value::Value;
