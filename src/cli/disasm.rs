//! Listing command implementation.

use std::fs;
use std::path::Path;

use ratchet::bytecode::{assemble, disassemble};
use ratchet::instrument::instrument;

use super::CliError;

/// Execute the disasm command.
///
/// # Errors
///
/// Returns an error if the file cannot be read, assembled, or instrumented.
pub(crate) fn execute(file: &Path, instrumented: bool) -> Result<(), CliError> {
    let source = fs::read_to_string(file)
        .map_err(|e| CliError::new(format!("Failed to read {}: {e}", file.display())))?;
    let name = file
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CliError::new(format!("Bad file name: {}", file.display())))?;

    let mut code = assemble(name, &source).map_err(|e| CliError::new(e.to_string()))?;
    if instrumented {
        code = instrument(&code).map_err(|e| CliError::new(e.to_string()))?;
    }
    let listing = disassemble(&code).map_err(|e| CliError::new(e.to_string()))?;
    print!("{listing}");
    Ok(())
}
