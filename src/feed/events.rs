//! Feed wire protocol (spec.md §4.7, §9): a JSON envelope carrying
//! the three named event kinds the feed server emits, plus the
//! client's subscribe request.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `subscribeMarketData({chains:[...]})`, sent once per connection
/// after the socket opens.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeMarketData {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub chains: Vec<String>,
}

impl SubscribeMarketData {
    pub fn new(chains: Vec<String>) -> Self {
        Self { kind: "subscribeMarketData", chains }
    }
}

/// One of the three server-emitted event kinds (spec.md §4.7).
#[derive(Debug, Clone)]
pub enum FeedEvent {
    MarketData(Value),
    UsdRatesUpdate(Value),
    SubscribeMarketDataAck(Value),
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    rest: Value,
}

/// Parse one text frame from the feed socket into a `FeedEvent`. An
/// envelope whose `type` doesn't match a known kind is kept as
/// `Unknown` rather than dropped, so a protocol addition on the
/// server side is visible in logs instead of silently discarded.
pub fn parse_event(text: &str) -> Option<FeedEvent> {
    let envelope: Envelope = serde_json::from_str(text).ok()?;
    let payload = envelope.rest.get("data").cloned().unwrap_or(envelope.rest);
    Some(match envelope.kind.as_str() {
        "marketData" => FeedEvent::MarketData(payload),
        "usdRates_update" => FeedEvent::UsdRatesUpdate(payload),
        "subscribeMarketDataAck" => FeedEvent::SubscribeMarketDataAck(payload),
        other => FeedEvent::Unknown(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_message_serializes_expected_shape() {
        let msg = SubscribeMarketData::new(vec!["base_v3".into(), "base_v4".into()]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "subscribeMarketData");
        assert_eq!(json["chains"][0], "base_v3");
    }

    #[test]
    fn parse_event_routes_market_data() {
        let text = r#"{"type":"marketData","data":{"pairAddress":"0x1"}}"#;
        match parse_event(text) {
            Some(FeedEvent::MarketData(v)) => assert_eq!(v["pairAddress"], "0x1"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_event_routes_usd_rates_update() {
        let text = r#"{"type":"usdRates_update","data":{"weth":3000.0}}"#;
        assert!(matches!(parse_event(text), Some(FeedEvent::UsdRatesUpdate(_))));
    }

    #[test]
    fn parse_event_keeps_unknown_kinds_instead_of_dropping() {
        let text = r#"{"type":"somethingNew","data":{}}"#;
        match parse_event(text) {
            Some(FeedEvent::Unknown(kind)) => assert_eq!(kind, "somethingNew"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_event_rejects_malformed_json() {
        assert!(parse_event("not json").is_none());
    }
}
