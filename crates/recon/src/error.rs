use std::fmt;

use crate::model::SourceSide;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty name, bad tolerance, etc.).
    ConfigValidation(String),
    /// A source was not supplied to the engine.
    MissingSource(SourceSide),
    /// No field mappings were supplied to the engine.
    NoMappings,
    /// A source was supplied but holds no records.
    EmptyData(SourceSide),
    /// Source data could not be parsed into records.
    Parse { source: String, message: String },
    /// IO error (file read, etc.).
    Io(String),
}

impl ReconError {
    /// Configuration errors are the caller's to fix before invoking again.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse(_)
                | Self::ConfigValidation(_)
                | Self::MissingSource(_)
                | Self::NoMappings
                | Self::EmptyData(_)
        )
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingSource(side) => write!(f, "{side} source is not configured"),
            Self::NoMappings => write!(f, "at least one field mapping is required"),
            Self::EmptyData(side) => write!(f, "{side} source has no records"),
            Self::Parse { source, message } => {
                write!(f, "source '{source}': {message}")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
