//! Trade persistence (spec.md §4.6): atomic snapshot rewrite and the
//! append-only trade log.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use alloy::primitives::Address;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use crate::types::{ActiveTrade, InactiveTrade};
use super::summary::Summary;

/// On-disk trades snapshot (spec.md §6): `{active_trades,
/// inactive_trades, summary}`, rewritten atomically after every state
/// change and every 60s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub active_trades: HashMap<Address, ActiveTrade>,
    pub inactive_trades: Vec<InactiveTrade>,
    #[serde(default)]
    pub summary: Option<Summary>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            active_trades: HashMap::new(),
            inactive_trades: Vec::new(),
            summary: None,
        }
    }
}

/// Load a snapshot from `path`. Tolerates the legacy flat form
/// `{pair: ActiveTrade}` (spec.md I8): every value moves into
/// `active_trades`, `inactive_trades` is empty, and any `summary` key
/// from that legacy shape is discarded (the summary is derived fresh,
/// never trusted from disk in the legacy form).
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        return Ok(Snapshot::default());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;

    if value.get("active_trades").is_some() {
        return serde_json::from_value(value).with_context(|| format!("decoding {}", path.display()));
    }

    // Legacy flat form: every top-level key is a pair address mapping
    // directly to an ActiveTrade.
    let flat: HashMap<Address, ActiveTrade> =
        serde_json::from_value(value).with_context(|| format!("decoding legacy snapshot {}", path.display()))?;
    Ok(Snapshot {
        active_trades: flat,
        inactive_trades: Vec::new(),
        summary: None,
    })
}

/// Write the snapshot atomically: write to `<path>.tmp`, then rename
/// over the live file, so a crash mid-write never corrupts the last
/// good snapshot.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let body = serde_json::to_string_pretty(snapshot).context("serializing trades snapshot")?;
    std::fs::write(&tmp_path, body).with_context(|| format!("writing {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogEventType {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStatus {
    Success,
    Failed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeLogRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: LogEventType,
    pub status: LogStatus,
    pub symbol: String,
    pub pair: Address,
    pub policy_id: String,
    pub action_percent: u8,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Append one JSON object per line to the trade log. Opens in append
/// mode (creating the file if missing), the same check-exists →
/// create-if-new → append-and-flush idiom the teacher uses for its CSV
/// logs, generalized from a per-file CSV header to a headerless
/// JSON-lines stream (each line is already self-describing).
pub fn append_trade_log(path: &Path, record: &TradeLogRecord) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening trade log {}", path.display()))?;
    let line = serde_json::to_string(record).context("serializing trade log record")?;
    writeln!(file, "{}", line).context("writing trade log line")?;
    file.flush().context("flushing trade log")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CloseReason, Fork, PairSnapshot, Protocol};
    use rust_decimal_macros::dec;

    fn sample_active_trade() -> ActiveTrade {
        ActiveTrade {
            pair: PairSnapshot {
                pair_address: Address::ZERO,
                token0: Address::ZERO,
                token1: Address::ZERO,
                token0_decimals: 18,
                token1_decimals: 18,
                protocol: Protocol::V3,
                fork: Fork::Uniswap,
                fee_bps: 3000,
                symbol: "TEST".into(),
            },
            base_token: Address::ZERO,
            policy_id: "p1".into(),
            entry_price: 1.0,
            eth_spent: dec!(0.01),
            eth_sold: dec!(0.0),
            tokens_bought: 100.0,
            tokens_in_possession: 100.0,
            tokens_in_possession_raw: "100000000000000000000".into(),
            current_price: 1.0,
            price_change_pct: 0.0,
            min_price_since_entry: 1.0,
            max_price_since_entry: 1.0,
            opened_at: 0,
        }
    }

    #[test]
    fn missing_snapshot_file_yields_empty_default() {
        let path = Path::new("/tmp/trade-agent-test-snapshot-missing.json");
        let snapshot = load_snapshot(path).unwrap();
        assert!(snapshot.active_trades.is_empty());
    }

    #[test]
    fn snapshot_round_trips_i7() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("trade-agent-test-snap-{}.json", std::process::id()));
        let mut snapshot = Snapshot::default();
        snapshot.active_trades.insert(Address::repeat_byte(1), sample_active_trade());
        save_snapshot(&path, &snapshot).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.active_trades.len(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn legacy_flat_snapshot_migrates_i8() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("trade-agent-test-legacy-{}.json", std::process::id()));
        let pair = Address::repeat_byte(2);
        let legacy = serde_json::json!({
            format!("{:#x}", pair): sample_active_trade(),
            "summary": {"some": "stale data"},
        });
        std::fs::write(&path, serde_json::to_string(&legacy).unwrap()).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.active_trades.len(), 1);
        assert!(loaded.inactive_trades.is_empty());
        assert!(loaded.summary.is_none());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn append_trade_log_creates_file_and_appends_lines() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("trade-agent-test-log-{}.jsonl", std::process::id()));
        let record = TradeLogRecord {
            timestamp: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            event_type: LogEventType::Buy,
            status: LogStatus::Success,
            symbol: "TEST".into(),
            pair: Address::ZERO,
            policy_id: "p1".into(),
            action_percent: 100,
            amount_in: dec!(0.01),
            amount_out: dec!(100.0),
            error: None,
        };
        append_trade_log(&path, &record).unwrap();
        append_trade_log(&path, &record).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn close_reason_serializes_snake_case() {
        let json = serde_json::to_string(&CloseReason::ZeroBalance).unwrap();
        assert_eq!(json, "\"zero_balance\"");
    }
}
