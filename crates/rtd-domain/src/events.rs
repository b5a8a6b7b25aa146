use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::control::TurnControl;
use crate::media::{AudioEncoding, VideoContentType};

fn to_base64<S: serde::Serializer>(data: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&BASE64.encode(data))
}

fn from_base64<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(d)?;
    BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
}

/// Client-visible events. Tagged on `type`; binary payloads are
/// base64-encoded on the wire and raw bytes internally (see
/// [`crate::media::AudioChunk`]/[`crate::media::VideoFrame`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    TextDelta {
        token: String,
    },
    AudioChunk {
        #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
        data: Vec<u8>,
        timestamp_ms: f64,
        duration_ms: f64,
        encoding: AudioEncoding,
        sample_rate: u32,
    },
    VideoFrame {
        #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
        data: Vec<u8>,
        timestamp_ms: f64,
        frame_index: u64,
        width: u32,
        height: u32,
        content_type: VideoContentType,
        drift_ms: f64,
    },
    TurnComplete {
        turn_id: String,
    },
    Error {
        code: &'static str,
        message: String,
    },
}

/// Events a client may send inbound. Unknown `type` values don't even
/// reach this enum — the receive loop drops them before `serde_json`
/// would fail to match a variant (see the gateway's `ws` module).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    UserText {
        text: String,
        #[serde(default)]
        control: Option<TurnControl>,
    },
    Interrupt {},
    ControlUpdate {
        control: TurnControl,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{AudioChunk, VideoFrame};

    #[test]
    fn audio_chunk_round_trips_base64() {
        let chunk = AudioChunk::new(vec![1, 2, 3, 4, 5], 12.0, 24_000, AudioEncoding::Pcm);
        let event = OutboundEvent::AudioChunk {
            data: chunk.data.clone(),
            timestamp_ms: chunk.timestamp_ms,
            duration_ms: chunk.duration_ms,
            encoding: chunk.encoding.clone(),
            sample_rate: chunk.sample_rate,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "audio_chunk");
        assert!(json["data"].as_str().unwrap().len() > 0);
        let back: OutboundEvent = serde_json::from_value(json).unwrap();
        match back {
            OutboundEvent::AudioChunk { data, .. } => assert_eq!(data, vec![1, 2, 3, 4, 5]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn video_frame_serializes_tag_and_fields() {
        let frame = VideoFrame {
            data: vec![0u8; 4],
            timestamp_ms: 40.0,
            frame_index: 3,
            width: 256,
            height: 256,
            content_type: VideoContentType::RawRgb,
        };
        let event = OutboundEvent::VideoFrame {
            data: frame.data.clone(),
            timestamp_ms: frame.timestamp_ms,
            frame_index: frame.frame_index,
            width: frame.width,
            height: frame.height,
            content_type: frame.content_type,
            drift_ms: 12.5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "video_frame");
        assert_eq!(json["frame_index"], 3);
        assert_eq!(json["drift_ms"], 12.5);
    }

    #[test]
    fn inbound_user_text_without_control() {
        let event: InboundEvent =
            serde_json::from_str(r#"{"type":"user_text","text":"hi"}"#).unwrap();
        match event {
            InboundEvent::UserText { text, control } => {
                assert_eq!(text, "hi");
                assert!(control.is_none());
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn inbound_interrupt_has_no_fields() {
        let event: InboundEvent = serde_json::from_str(r#"{"type":"interrupt"}"#).unwrap();
        assert!(matches!(event, InboundEvent::Interrupt {}));
    }

    #[test]
    fn inbound_unknown_type_fails_to_parse() {
        let res: std::result::Result<InboundEvent, _> =
            serde_json::from_str(r#"{"type":"not_a_real_event"}"#);
        assert!(res.is_err());
    }
}
