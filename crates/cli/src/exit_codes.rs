//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                               |
//! |------|-------------------------------------------------------|
//! | 0    | Success: every result is `matching` / config is valid |
//! | 1    | Reconciled, but at least one result is not matching  |
//! | 2    | CLI usage error (bad args, unknown file format)       |
//! | 3    | Invalid config or engine input                        |
//! | 4    | IO or parse failure reading sources / writing output  |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant below
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

/// Success - command completed and nothing was out of balance.
pub const EXIT_SUCCESS: u8 = 0;

/// Reconciliation found breaks or one-sided records.
/// Like `diff(1)`, exit 1 means "sources differ."
pub const EXIT_RECON_MISMATCH: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config failed to parse or validate, or the engine rejected its input.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 3;

/// A file could not be read or written, or source data failed to parse.
pub const EXIT_RECON_RUNTIME: u8 = 4;
