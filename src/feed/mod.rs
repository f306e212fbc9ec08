//! Feed client (C7, spec.md §4.7): a persistent bidirectional
//! WebSocket connection to the market data server, reconnecting
//! forever with exponential backoff.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

pub mod events;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use events::{parse_event, FeedEvent, SubscribeMarketData};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

pub struct FeedClient {
    url: String,
    chains: Vec<String>,
}

impl FeedClient {
    pub fn new(url: String, chains: Vec<String>) -> Self {
        Self { url, chains }
    }

    /// Run forever, reconnecting on any stream error or close with
    /// exponential backoff (1s doubling, capped at 10s, no give-up —
    /// the supervisor's entire data plane depends on this channel).
    /// Parsed events are pushed onto `tx`; the receiver drives
    /// aggregation and the USD price cache.
    pub async fn run(&self, tx: mpsc::UnboundedSender<FeedEvent>) {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            let connected_at = tokio::time::Instant::now();
            match self.run_once(&tx).await {
                Ok(()) => warn!("feed socket closed cleanly; reconnecting"),
                Err(e) => warn!(error = %e, "feed socket error; reconnecting"),
            }
            // A connection that stayed up a while counts as a
            // successful cycle: reset backoff instead of compounding
            // it on top of an unrelated later failure.
            if connected_at.elapsed() >= MAX_BACKOFF {
                backoff = INITIAL_BACKOFF;
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    async fn run_once(&self, tx: &mpsc::UnboundedSender<FeedEvent>) -> Result<()> {
        let (ws, _resp) = tokio_tungstenite::connect_async(&self.url)
            .await
            .context("connecting to feed server")?;
        info!(url = %self.url, "feed socket connected");
        let (mut write, mut read) = ws.split();

        let subscribe = SubscribeMarketData::new(self.chains.clone());
        let body = serde_json::to_string(&subscribe).context("encoding subscribe message")?;
        write.send(Message::Text(body)).await.context("sending subscribeMarketData")?;

        // Backoff resets on a clean connect; a fresh `run_once` call
        // after this one returns will start at INITIAL_BACKOFF again
        // because the caller owns the backoff variable, not this fn.
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            tokio::select! {
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match parse_event(&text) {
                                Some(event) => {
                                    if tx.send(event).is_err() {
                                        return Ok(());
                                    }
                                }
                                None => debug!("dropping malformed feed frame"),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
                _ = ticker.tick() => {
                    if write.send(Message::Ping(Vec::new())).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let mut backoff = INITIAL_BACKOFF;
        for _ in 0..10 {
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
        assert_eq!(backoff, MAX_BACKOFF);
    }

    #[test]
    fn initial_backoff_is_one_second() {
        assert_eq!(INITIAL_BACKOFF, Duration::from_secs(1));
    }
}
