//! Bot directory validation command implementation.

use std::fs;
use std::path::{Path, PathBuf};

use ratchet::bytecode::{CodeObject, assemble};
use ratchet::instrument::{instrument, meter_sites};
use ratchet::sandbox::{Bundle, MAIN_MODULE, SOURCE_EXTENSION};

use super::CliError;

/// Execute the validate command.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or any file fails to
/// assemble or instrument.
pub(crate) fn execute(bot: &Path) -> Result<(), CliError> {
    let mut files: Vec<PathBuf> = fs::read_dir(bot)
        .map_err(|e| CliError::new(format!("Failed to read {}: {e}", bot.display())))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|e| e == SOURCE_EXTENSION))
        .collect();
    files.sort();

    println!("Validating: {}", bot.display());
    println!();

    let has_main = files
        .iter()
        .any(|path| path.file_stem().is_some_and(|s| s == MAIN_MODULE));
    print_check(&format!("{MAIN_MODULE}.{SOURCE_EXTENSION} present"), has_main);
    if !has_main {
        return Err(CliError::new(format!(
            "No main module (expected {MAIN_MODULE}.{SOURCE_EXTENSION})"
        )));
    }

    let mut failures = 0_usize;
    for path in &files {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        println!();
        println!("{}:", path.display());
        let source = fs::read_to_string(path)?;
        let code = match assemble(name, &source) {
            Ok(code) => {
                print_check("assembles", true);
                code
            }
            Err(e) => {
                print_check("assembles", false);
                println!("    {e}");
                failures += 1;
                continue;
            }
        };
        match instrument(&code) {
            Ok(metered) => {
                print_check("instruments", true);
                println!("    units:          {}", units(&metered).len());
                println!("    metering sites: {}", total_sites(&metered));
                println!("    code size:      {} -> {} bytes", code.code.len(), metered.code.len());
            }
            Err(e) => {
                print_check("instruments", false);
                println!("    {e}");
                failures += 1;
            }
        }
    }

    println!();
    if failures > 0 {
        return Err(CliError::new(format!("{failures} file(s) failed validation")));
    }

    let bundle = Bundle::from_dir(bot)?;
    println!("Bundle: {} module(s)", bundle.len());
    println!("Validation successful!");
    Ok(())
}

fn units(code: &CodeObject) -> Vec<&CodeObject> {
    let mut out = vec![code];
    for nested in code.nested() {
        out.extend(units(nested));
    }
    out
}

fn total_sites(code: &CodeObject) -> usize {
    units(code)
        .into_iter()
        .filter_map(|unit| meter_sites(unit).ok())
        .sum()
}

fn print_check(name: &str, ok: bool) {
    let status = if ok { "OK" } else { "FAILED" };
    let symbol = if ok { "✓" } else { "✗" };
    println!("  {symbol} {name}: {status}");
}
