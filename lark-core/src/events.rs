//! Events emitted by the detection pipeline and session manager.
//!
//! The library surfaces booleans and channels; these serde types are the
//! structured form the satellite binary (or any embedding application)
//! logs or forwards.

use serde::{Deserialize, Serialize};

/// A wake word fired.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WakeEvent {
    /// Detector/model identifier.
    pub model_id: String,
    /// Display phrase, e.g. `"hey lark"`.
    pub wake_word: String,
}

/// A speech episode ended and was long enough to count as an utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtteranceEndedEvent {
    /// Episode length, from first to last sound.
    pub duration_ms: u64,
}

/// The session manager's connection state changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEvent {
    pub connected: bool,
    /// Remote address, when connected and resolvable.
    pub peer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_event_serializes_camel_case() {
        let event = WakeEvent {
            model_id: "hey_lark_v2".into(),
            wake_word: "hey lark".into(),
        };
        let json = serde_json::to_value(&event).expect("serialize wake event");
        assert_eq!(json["modelId"], "hey_lark_v2");
        assert_eq!(json["wakeWord"], "hey lark");

        let round_trip: WakeEvent = serde_json::from_value(json).expect("deserialize wake event");
        assert_eq!(round_trip.model_id, "hey_lark_v2");
    }

    #[test]
    fn connection_event_round_trips() {
        let event = ConnectionEvent {
            connected: true,
            peer: Some("10.0.0.7:50412".into()),
        };
        let json = serde_json::to_string(&event).expect("serialize connection event");
        let round_trip: ConnectionEvent =
            serde_json::from_str(&json).expect("deserialize connection event");
        assert!(round_trip.connected);
        assert_eq!(round_trip.peer.as_deref(), Some("10.0.0.7:50412"));
    }

    #[test]
    fn utterance_event_round_trips() {
        let event = UtteranceEndedEvent { duration_ms: 730 };
        let json = serde_json::to_value(&event).expect("serialize utterance event");
        assert_eq!(json["durationMs"], 730);
    }
}
