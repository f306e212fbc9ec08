//! AgentError — the typed error kinds of spec.md §7, mapped to
//! Control API status codes by `control::handlers`.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("config error: {0}")]
    Config(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("policy {policy_id} failed to compile: {reason}")]
    PolicyCompile { policy_id: String, reason: String },

    #[error("policy {policy_id} runtime error: {reason}")]
    PolicyRuntime { policy_id: String, reason: String },

    #[error("swap execution failed: {0}")]
    SwapExecution(String),

    #[error("reconciliation error: {0}")]
    Reconciliation(String),

    #[error("no active trade for pair {0}")]
    NoSuchTrade(String),

    #[error("pair {0} not known to the feed")]
    UnknownPair(String),

    #[error("pair {0} is locked by an in-flight entry or exit")]
    Locked(String),

    #[error("malformed request: {0}")]
    BadRequest(String),
}

impl AgentError {
    /// HTTP status code this error maps to on the Control API,
    /// per spec.md §7's "400/404/409/500" table.
    pub fn status_code(&self) -> u16 {
        match self {
            AgentError::BadRequest(_) => 400,
            AgentError::NoSuchTrade(_) | AgentError::UnknownPair(_) => 404,
            AgentError::Locked(_) => 409,
            _ => 500,
        }
    }
}
