//! Autonomous on-chain trading agent library.
//!
//! Feed ingestion, rolling aggregation, a sandboxed policy language,
//! multi-protocol swap execution, and the trade lifecycle that ties
//! them together behind a local control API.
//!
//! Author: AI-Generated
//! Created: 2026-01-28
//! Modified: 2026-02-14 — replaced the arbitrage-bot module tree with
//! the trading agent's (aggregation, policy, chain, swap, trade, feed,
//! control, supervisor); dropped the legacy DEX-arbitrage/paper-trading/
//! tax modules (see DESIGN.md's final trim pass).

pub mod aggregation;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod control;
pub mod error;
pub mod feed;
pub mod policy;
pub mod supervisor;
pub mod swap;
pub mod trade;
pub mod types;

pub use config::Settings;
pub use error::AgentError;
