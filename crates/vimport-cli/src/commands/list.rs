//! `import-video list` command implementation
//!
//! Read-only export of the ledger, sorted by filename. Does not take the
//! instance lock.

use crate::error::{CliError, Result};
use crate::ledger::Ledger;
use colored::Colorize;
use std::path::Path;
use tracing::debug;
use vimport_common::FileRecord;

/// Export column headers
pub const COLUMNS: [&str; 6] = [
    "FILENAME",
    "GIVEN_NAME",
    "CAMERA",
    "CREATED_ON",
    "DISCOVERED_ON",
    "UPLOADED_ON",
];

/// Load every record, or none when the ledger has not been created yet
pub fn load_records(storage: &Path) -> Result<Vec<FileRecord>> {
    if !storage.exists() {
        debug!(storage = %storage.display(), "No ledger yet");
        return Ok(Vec::new());
    }
    let ledger = Ledger::open_read_only(storage)?;
    let records = ledger.all()?;
    ledger.close()?;
    Ok(records)
}

/// Export the ledger in `format` to `output` or stdout
pub fn run(storage: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let records = load_records(storage)?;
    let formatted = render(&records, format)?;

    if let Some(file_path) = output {
        std::fs::write(file_path, formatted)?;
        println!(
            "{} Output written to: {}",
            "✓".green(),
            file_path.display().to_string().cyan()
        );
    } else {
        print!("{}", formatted);
    }

    Ok(())
}

/// Render records as csv, table or json
pub fn render(records: &[FileRecord], format: &str) -> Result<String> {
    match format {
        "csv" => Ok(format_as_csv(records)),
        "table" => Ok(format_as_table(records)),
        "json" => format_as_json(records),
        _ => Err(CliError::config(format!(
            "Unknown format: '{}'. Use csv, table or json",
            format
        ))),
    }
}

fn row(record: &FileRecord) -> [String; 6] {
    [
        record.filename.display().to_string(),
        record.given_name.clone(),
        record.camera_name.clone(),
        record.capture_timestamp.clone(),
        record.discovered_on.clone(),
        record.uploaded_on.clone().unwrap_or_default(),
    ]
}

fn format_as_csv(records: &[FileRecord]) -> String {
    let mut output = String::new();
    output.push_str(&COLUMNS.join(","));
    output.push('\n');

    for record in records {
        let cells: Vec<String> = row(record).iter().map(|v| csv_escape(v)).collect();
        output.push_str(&cells.join(","));
        output.push('\n');
    }

    output
}

fn format_as_table(records: &[FileRecord]) -> String {
    use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(COLUMNS);

    for record in records {
        let mut cells = row(record);
        if cells[5].is_empty() {
            cells[5] = "-".to_string();
        }
        table.add_row(cells);
    }

    format!("{}\n", table)
}

fn format_as_json(records: &[FileRecord]) -> Result<String> {
    let mut json = serde_json::to_string_pretty(records)?;
    json.push('\n');
    Ok(json)
}

/// Escape CSV value
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
