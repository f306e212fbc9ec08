//! Trade lifecycle (C6, spec.md §4.6): entry/exit, persistence, and
//! the derived summary.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

pub mod lifecycle;
pub mod persistence;
pub mod summary;

use anyhow::Result;
use std::path::PathBuf;

use lifecycle::TradeLifecycle;
use persistence::Snapshot;
use summary::Summary;

/// Loads the persisted snapshot, wires it into a `TradeLifecycle`,
/// and owns the paths used for subsequent saves.
pub struct TradeBook {
    pub lifecycle: TradeLifecycle,
    snapshot_path: PathBuf,
}

impl TradeBook {
    pub fn load(snapshot_path: PathBuf, trade_log_path: PathBuf) -> Result<Self> {
        let snapshot = persistence::load_snapshot(&snapshot_path)?;
        let lifecycle = TradeLifecycle::new(snapshot.active_trades, snapshot.inactive_trades, trade_log_path);
        Ok(Self { lifecycle, snapshot_path })
    }

    /// Recompute the summary and rewrite the snapshot atomically
    /// (spec.md §4.6 Persistence — after every state change, and on a
    /// 60s timer).
    pub fn persist(&self) -> Result<()> {
        let active = self.lifecycle.snapshot_active();
        let inactive = self.lifecycle.snapshot_inactive();
        let active_refs: Vec<&_> = active.values().collect();
        let inactive_refs: Vec<&_> = inactive.iter().collect();
        let summary = summary::build_summary(&active_refs, &inactive_refs);
        let snapshot = Snapshot { active_trades: active, inactive_trades: inactive, summary: Some(summary) };
        persistence::save_snapshot(&self.snapshot_path, &snapshot)
    }

    pub fn summary(&self) -> Summary {
        let active = self.lifecycle.snapshot_active();
        let inactive = self.lifecycle.snapshot_inactive();
        let active_refs: Vec<&_> = active.values().collect();
        let inactive_refs: Vec<&_> = inactive.iter().collect();
        summary::build_summary(&active_refs, &inactive_refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_with_missing_files_yields_empty_book() {
        let dir = std::env::temp_dir();
        let snap = dir.join(format!("trade-agent-test-book-{}.json", std::process::id()));
        let log = dir.join(format!("trade-agent-test-book-{}.jsonl", std::process::id()));
        let book = TradeBook::load(snap.clone(), log).unwrap();
        assert_eq!(book.lifecycle.active_count(), 0);
        assert_eq!(book.summary().open_trades, 0);
        let _ = std::fs::remove_file(&snap);
    }

    #[test]
    fn persist_writes_snapshot_with_summary() {
        let dir = std::env::temp_dir();
        let snap = dir.join(format!("trade-agent-test-persist-{}.json", std::process::id()));
        let log = dir.join(format!("trade-agent-test-persist-{}.jsonl", std::process::id()));
        let book = TradeBook::load(snap.clone(), log).unwrap();
        book.persist().unwrap();
        let loaded = persistence::load_snapshot(&snap).unwrap();
        assert!(loaded.summary.is_some());
        let _ = std::fs::remove_file(&snap);
    }
}
