//! Wire messages exchanged between the feed server and its subscribers

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FeedError;
use crate::types::{Category, PlatformSnapshot, SimulationStatus};
use crate::visibility::Viewport;

/// Messages produced by the server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full set of platforms at one tick
    PlatformUpdate {
        platforms: Vec<PlatformSnapshot>,
        timestamp: i64,
    },

    /// Run-state change outside the regular cadence
    SimulationStatus {
        data: SimulationStatus,
        timestamp: i64,
    },

    /// Sent once when a session opens
    Connected { session_id: String, timestamp: i64 },

    Ping { timestamp: i64 },

    Pong { timestamp: i64 },
}

impl ServerMessage {
    /// Tag value, also used as the event name on the stream transport
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::PlatformUpdate { .. } => "platform_update",
            ServerMessage::SimulationStatus { .. } => "simulation_status",
            ServerMessage::Connected { .. } => "connected",
            ServerMessage::Ping { .. } => "ping",
            ServerMessage::Pong { .. } => "pong",
        }
    }

    /// Serialize once; the frame is then shared by every session
    pub fn to_frame(&self) -> Result<OutboundFrame, FeedError> {
        let json = serde_json::to_string(self)?;
        Ok(OutboundFrame {
            kind: self.kind(),
            json: Arc::from(json),
        })
    }
}

/// A serialized server message ready to be written to any number of sessions
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundFrame {
    pub kind: &'static str,
    pub json: Arc<str>,
}

impl OutboundFrame {
    pub fn as_str(&self) -> &str {
        &self.json
    }
}

/// Messages sent by subscribers to the server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Answer to a server ping; echoes its timestamp
    Pong {
        #[serde(default)]
        timestamp: i64,
    },

    /// Latency probe; answered with a pong carrying the same timestamp
    Ping {
        #[serde(default)]
        timestamp: i64,
    },

    RequestInitialData {
        #[serde(default)]
        timestamp: i64,
    },

    StartSimulation {
        #[serde(default)]
        timestamp: i64,
    },

    StopSimulation {
        #[serde(default)]
        timestamp: i64,
    },

    ViewportUpdate {
        bounds: Viewport,
        #[serde(default)]
        zoom: Option<f64>,
        #[serde(default)]
        timestamp: i64,
    },

    FilterUpdate {
        #[serde(default)]
        categories: Vec<Category>,
        #[serde(default)]
        timestamp: i64,
    },

    /// Any type this build does not know about
    #[serde(other)]
    Unknown,
}

/// A frame received by the subscriber client, decoded once at ingress
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    /// Platform records, possibly delta-tagged, not yet reconstructed
    PlatformUpdate { records: Vec<Value>, timestamp: i64 },
    Status {
        status: SimulationStatus,
        timestamp: i64,
    },
    Pong { timestamp: i64 },
    Ping { timestamp: i64 },
    Unknown { kind: String },
}

impl InboundMessage {
    /// Decode a text frame.
    ///
    /// An untagged object carrying a `platforms` array is read as a platform update.
    pub fn parse(text: &str) -> Result<Self, FeedError> {
        let mut value: Value = serde_json::from_str(text)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| FeedError::protocol("frame is not a JSON object"))?;
        let timestamp = obj.get("timestamp").map(read_timestamp).unwrap_or(0);

        let kind = obj.get("type").and_then(Value::as_str).map(str::to_string);
        match kind.as_deref() {
            Some("platform_update") => Self::platforms(obj, timestamp),
            Some("simulation_status") => {
                let data = obj
                    .remove("data")
                    .ok_or_else(|| FeedError::protocol("simulation_status without data"))?;
                Ok(InboundMessage::Status {
                    status: serde_json::from_value(data)?,
                    timestamp,
                })
            }
            Some("pong") => Ok(InboundMessage::Pong { timestamp }),
            Some("ping") => Ok(InboundMessage::Ping { timestamp }),
            Some(other) => Ok(InboundMessage::Unknown {
                kind: other.to_string(),
            }),
            None if obj.contains_key("platforms") => Self::platforms(obj, timestamp),
            None => Err(FeedError::protocol("untagged frame without platforms")),
        }
    }

    fn platforms(obj: &mut Map<String, Value>, timestamp: i64) -> Result<Self, FeedError> {
        match obj.remove("platforms") {
            Some(Value::Array(records)) => Ok(InboundMessage::PlatformUpdate { records, timestamp }),
            _ => Err(FeedError::protocol("platforms is not an array")),
        }
    }
}

fn read_timestamp(value: &Value) -> i64 {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;

    #[test]
    fn test_platform_update_frame() {
        let msg = ServerMessage::PlatformUpdate {
            platforms: vec![PlatformSnapshot::new(
                "SAT-1",
                Category::Space,
                Position::new(0.0, 0.0, 400_000.0),
            )],
            timestamp: 1_700_000_000_000,
        };
        let frame = msg.to_frame().unwrap();
        assert_eq!(frame.kind, "platform_update");
        assert!(frame.as_str().contains(r#""type":"platform_update""#));
        assert!(frame.as_str().contains("SAT-1"));
    }

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"request_initial_data","timestamp":5}"#).unwrap();
        assert_eq!(msg, ClientMessage::RequestInitialData { timestamp: 5 });

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"viewport_update","bounds":{"north":10,"south":0,"east":10,"west":0},"zoom":5}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::ViewportUpdate { zoom: Some(z), .. } if z == 5.0));
    }

    #[test]
    fn test_unknown_client_message() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"teleport","timestamp":1}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
    }

    #[test]
    fn test_inbound_tagged_update() {
        let text = r#"{"type":"platform_update","platforms":[{"id":"A"}],"timestamp":7}"#;
        match InboundMessage::parse(text).unwrap() {
            InboundMessage::PlatformUpdate { records, timestamp } => {
                assert_eq!(records.len(), 1);
                assert_eq!(timestamp, 7);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_inbound_untagged_platform_list() {
        let text = r#"{"platforms":[{"id":"A"},{"id":"B"}],"timestamp":9}"#;
        assert!(matches!(
            InboundMessage::parse(text).unwrap(),
            InboundMessage::PlatformUpdate { ref records, timestamp: 9 } if records.len() == 2
        ));
    }

    #[test]
    fn test_inbound_status_and_pong() {
        let text = r#"{"type":"simulation_status","data":{"running":true,"time":3.5,"platformCount":2,"speed":1.0},"timestamp":1}"#;
        assert!(matches!(
            InboundMessage::parse(text).unwrap(),
            InboundMessage::Status { ref status, .. } if status.running && status.platform_count == 2
        ));

        let pong = InboundMessage::parse(r#"{"type":"pong","timestamp":1234.0}"#).unwrap();
        assert_eq!(pong, InboundMessage::Pong { timestamp: 1234 });
    }

    #[test]
    fn test_inbound_rejects_garbage() {
        assert!(matches!(InboundMessage::parse("not json"), Err(FeedError::Protocol(_))));
        assert!(matches!(InboundMessage::parse("[1,2]"), Err(FeedError::Protocol(_))));
        assert!(matches!(
            InboundMessage::parse(r#"{"hello":"world"}"#),
            Err(FeedError::Protocol(_))
        ));
        assert!(matches!(
            InboundMessage::parse(r#"{"type":"platform_update","platforms":3}"#),
            Err(FeedError::Protocol(_))
        ));
    }

    #[test]
    fn test_inbound_unknown_type_is_not_an_error() {
        assert_eq!(
            InboundMessage::parse(r#"{"type":"connected","session_id":"x"}"#).unwrap(),
            InboundMessage::Unknown {
                kind: "connected".to_string()
            }
        );
    }
}
