//! `import-video status` command implementation
//!
//! Shows how far the ledger has come.

use crate::error::Result;
use crate::instance::{lock_path_for, process_alive};
use crate::ledger::{Ledger, LedgerStats};
use crate::progress::format_bytes;
use colored::Colorize;
use std::path::Path;

/// Ledger totals, all zero when the ledger does not exist yet
pub fn load_stats(storage: &Path) -> Result<LedgerStats> {
    if !storage.exists() {
        return Ok(LedgerStats::default());
    }
    let ledger = Ledger::open_read_only(storage)?;
    let stats = ledger.stats()?;
    ledger.close()?;
    Ok(stats)
}

/// Pid of a live import holding the ledger, if any
pub fn running_import(storage: &Path) -> Option<u32> {
    let contents = std::fs::read_to_string(lock_path_for(storage)).ok()?;
    let pid = contents.trim().parse().ok()?;
    process_alive(pid).then_some(pid)
}

/// Show ledger status
pub fn run(storage: &Path) -> Result<()> {
    if !storage.exists() {
        println!("No ledger found at {}.", storage.display());
        println!("Run 'import-video upload <folder>' to start one.");
        return Ok(());
    }

    let stats = load_stats(storage)?;

    println!("{}", "Ledger:".cyan().bold());
    println!("  File:            {}", storage.display());
    match running_import(storage) {
        Some(pid) => println!("  Import running:  {}", format!("pid {}", pid).yellow()),
        None => println!("  Import running:  no"),
    }
    println!();

    println!("{}", "Summary:".cyan().bold());
    println!("  Total files:     {}", stats.total);
    println!("  Uploaded:        {}", stats.uploaded.to_string().green());
    println!("  Pending:         {}", stats.pending);
    println!("  Pending in jobs: {}", stats.pending_assigned);
    println!("  Pending size:    {}", format_bytes(stats.pending_bytes));

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vimport_common::{FileRecord, ShardAssignment};

    #[test]
    fn test_stats_of_missing_ledger() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load_stats(&dir.path().join("none.db")).unwrap(), LedgerStats::default());
    }

    #[test]
    fn test_stats() {
        let dir = TempDir::new().unwrap();
        let storage = dir.path().join("ledger.db");
        let ledger = Ledger::open(&storage).unwrap();

        let mut done = FileRecord::new("k1", "/v/a.mp4", "a", "t", "d").with_size(10);
        done.mark_uploaded("u");
        let mut assigned = FileRecord::new("k2", "/v/b.mp4", "a", "t", "d").with_size(20);
        assigned.assignment = Some(ShardAssignment::new("j", "s", "http://up"));
        let fresh = FileRecord::new("k3", "/v/c.mp4", "a", "t", "d").with_size(30);
        for r in [&done, &assigned, &fresh] {
            ledger.put(&r.key, r).unwrap();
        }
        ledger.close().unwrap();

        let stats = load_stats(&storage).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.uploaded, 1);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.pending_assigned, 1);
        assert_eq!(stats.pending_bytes, 50);
    }

    #[test]
    fn test_running_import() {
        let dir = TempDir::new().unwrap();
        let storage = dir.path().join("ledger.db");
        assert_eq!(running_import(&storage), None);

        std::fs::write(lock_path_for(&storage), std::process::id().to_string()).unwrap();
        assert_eq!(running_import(&storage), Some(std::process::id()));
    }
}
