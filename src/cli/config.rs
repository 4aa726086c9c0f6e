//! Config command.

use super::write_line;
use crate::Result;
use crate::config::VotesConfig;
use std::io::Write;

/// Prints the effective configuration as TOML.
///
/// # Errors
///
/// Returns an error if the configuration cannot be rendered or written.
pub fn run_config(config: &VotesConfig, out: &mut impl Write) -> Result<()> {
    write_line(out, config.to_toml_string()?.trim_end())
}
