//! # GTFS-realtime binary decoder
//!
//! Hand-written `prost` messages covering only the part of the
//! GTFS-realtime `FeedMessage` schema the alert proxy reads. Unknown fields
//! (trip updates, vehicle positions, extensions) are skipped by prost.

use prost::Message;

use crate::feed::error::DecodeError;
use crate::feed::types::{secs_to_ms, ActivePeriod, DecodedFeed, InformedEntity, RawAlertEntity};

/// Protocol buffer messages (proto2, so every scalar is optional on the wire).
pub mod pb {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FeedMessage {
        #[prost(message, optional, tag = "1")]
        pub header: Option<FeedHeader>,
        #[prost(message, repeated, tag = "2")]
        pub entity: Vec<FeedEntity>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FeedHeader {
        #[prost(string, optional, tag = "1")]
        pub gtfs_realtime_version: Option<String>,
        #[prost(int32, optional, tag = "2")]
        pub incrementality: Option<i32>,
        /// POSIX seconds.
        #[prost(uint64, optional, tag = "3")]
        pub timestamp: Option<u64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FeedEntity {
        #[prost(string, optional, tag = "1")]
        pub id: Option<String>,
        #[prost(bool, optional, tag = "2")]
        pub is_deleted: Option<bool>,
        #[prost(message, optional, tag = "5")]
        pub alert: Option<Alert>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Alert {
        #[prost(message, repeated, tag = "1")]
        pub active_period: Vec<TimeRange>,
        #[prost(message, repeated, tag = "5")]
        pub informed_entity: Vec<EntitySelector>,
        /// `Cause` enum value.
        #[prost(int32, optional, tag = "6")]
        pub cause: Option<i32>,
        /// `Effect` enum value.
        #[prost(int32, optional, tag = "7")]
        pub effect: Option<i32>,
        #[prost(message, optional, tag = "8")]
        pub url: Option<TranslatedString>,
        #[prost(message, optional, tag = "10")]
        pub header_text: Option<TranslatedString>,
        #[prost(message, optional, tag = "11")]
        pub description_text: Option<TranslatedString>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TimeRange {
        #[prost(uint64, optional, tag = "1")]
        pub start: Option<u64>,
        #[prost(uint64, optional, tag = "2")]
        pub end: Option<u64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct EntitySelector {
        #[prost(string, optional, tag = "1")]
        pub agency_id: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub route_id: Option<String>,
        #[prost(int32, optional, tag = "3")]
        pub route_type: Option<i32>,
        #[prost(message, optional, tag = "4")]
        pub trip: Option<TripDescriptor>,
        #[prost(string, optional, tag = "5")]
        pub stop_id: Option<String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TripDescriptor {
        #[prost(string, optional, tag = "1")]
        pub trip_id: Option<String>,
        #[prost(string, optional, tag = "5")]
        pub route_id: Option<String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TranslatedString {
        #[prost(message, repeated, tag = "1")]
        pub translation: Vec<Translation>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Translation {
        #[prost(string, optional, tag = "1")]
        pub text: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub language: Option<String>,
    }
}

/// GTFS-realtime `Alert.Cause` name, or the raw number for values we don't know.
pub fn cause_name(value: i32) -> String {
    let name = match value {
        1 => "UNKNOWN_CAUSE",
        2 => "OTHER_CAUSE",
        3 => "TECHNICAL_PROBLEM",
        4 => "STRIKE",
        5 => "DEMONSTRATION",
        6 => "ACCIDENT",
        7 => "HOLIDAY",
        8 => "WEATHER",
        9 => "MAINTENANCE",
        10 => "CONSTRUCTION",
        11 => "POLICE_ACTIVITY",
        12 => "MEDICAL_EMERGENCY",
        other => return other.to_string(),
    };
    name.to_string()
}

/// GTFS-realtime `Alert.Effect` name, or the raw number for values we don't know.
pub fn effect_name(value: i32) -> String {
    let name = match value {
        1 => "NO_SERVICE",
        2 => "REDUCED_SERVICE",
        3 => "SIGNIFICANT_DELAYS",
        4 => "DETOUR",
        5 => "ADDITIONAL_SERVICE",
        6 => "MODIFIED_SERVICE",
        7 => "OTHER_EFFECT",
        8 => "UNKNOWN_EFFECT",
        9 => "STOP_MOVED",
        10 => "NO_EFFECT",
        11 => "ACCESSIBILITY_ISSUE",
        other => return other.to_string(),
    };
    name.to_string()
}

pub fn decode(raw: &[u8]) -> Result<DecodedFeed, DecodeError> {
    let msg = pb::FeedMessage::decode(raw)?;

    let feed_timestamp = msg.header.and_then(|h| h.timestamp).map(secs_to_ms);

    let entities = msg
        .entity
        .into_iter()
        .filter(|e| !e.is_deleted.unwrap_or(false))
        .filter_map(|e| {
            let id = e.id;
            e.alert.map(|a| from_pb_alert(id, a))
        })
        .collect();

    Ok(DecodedFeed {
        feed_timestamp,
        entities,
    })
}

fn first_text(ts: Option<pb::TranslatedString>) -> Option<String> {
    ts?.translation.into_iter().next()?.text
}

fn from_pb_alert(id: Option<String>, a: pb::Alert) -> RawAlertEntity {
    RawAlertEntity {
        id,
        header: first_text(a.header_text),
        description: first_text(a.description_text),
        cause: a.cause.map(cause_name),
        effect: a.effect.map(effect_name),
        active_periods: a
            .active_period
            .into_iter()
            .map(|p| ActivePeriod {
                start: p.start.map(secs_to_ms),
                end: p.end.map(secs_to_ms),
            })
            .collect(),
        informed_entities: a
            .informed_entity
            .into_iter()
            .map(|ie| InformedEntity {
                route_id: ie.route_id,
                stop_id: ie.stop_id,
                trip_id: ie.trip.and_then(|t| t.trip_id),
                route_type: ie.route_type,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translated(text: &str) -> Option<pb::TranslatedString> {
        Some(pb::TranslatedString {
            translation: vec![
                pb::Translation {
                    text: Some(text.to_string()),
                    language: Some("en".into()),
                },
                pb::Translation {
                    text: Some("ignored".into()),
                    language: Some("fr".into()),
                },
            ],
        })
    }

    #[test]
    fn decodes_alert_fields_and_converts_seconds() {
        let msg = pb::FeedMessage {
            header: Some(pb::FeedHeader {
                gtfs_realtime_version: Some("2.0".into()),
                incrementality: None,
                timestamp: Some(1_700_000_000),
            }),
            entity: vec![pb::FeedEntity {
                id: Some("a1".into()),
                is_deleted: None,
                alert: Some(pb::Alert {
                    active_period: vec![pb::TimeRange {
                        start: Some(1_700_000_000),
                        end: None,
                    }],
                    informed_entity: vec![pb::EntitySelector {
                        route_id: Some("1".into()),
                        route_type: Some(1),
                        trip: Some(pb::TripDescriptor {
                            trip_id: Some("t9".into()),
                            route_id: None,
                        }),
                        ..Default::default()
                    }],
                    cause: Some(10),
                    effect: Some(4),
                    header_text: translated("Line 1 delayed"),
                    ..Default::default()
                }),
            }],
        };

        let out = decode(&msg.encode_to_vec()).unwrap();
        assert_eq!(out.feed_timestamp, Some(1_700_000_000_000));
        assert_eq!(out.entities.len(), 1);
        let e = &out.entities[0];
        assert_eq!(e.id.as_deref(), Some("a1"));
        assert_eq!(e.header.as_deref(), Some("Line 1 delayed"));
        assert_eq!(e.description, None);
        assert_eq!(e.cause.as_deref(), Some("CONSTRUCTION"));
        assert_eq!(e.effect.as_deref(), Some("DETOUR"));
        assert_eq!(e.active_periods[0].start, Some(1_700_000_000_000));
        assert_eq!(e.active_periods[0].end, None);
        assert_eq!(e.informed_entities[0].trip_id.as_deref(), Some("t9"));
        assert_eq!(e.informed_entities[0].stop_id, None);
    }

    #[test]
    fn skips_entities_without_alert_or_deleted() {
        let msg = pb::FeedMessage {
            header: None,
            entity: vec![
                pb::FeedEntity {
                    id: Some("vehicle-only".into()),
                    ..Default::default()
                },
                pb::FeedEntity {
                    id: Some("gone".into()),
                    is_deleted: Some(true),
                    alert: Some(pb::Alert::default()),
                },
            ],
        };
        let out = decode(&msg.encode_to_vec()).unwrap();
        assert!(out.entities.is_empty());
        assert_eq!(out.feed_timestamp, None);
    }

    #[test]
    fn unknown_enum_values_pass_through() {
        assert_eq!(cause_name(99), "99");
        assert_eq!(effect_name(11), "ACCESSIBILITY_ISSUE");
    }

    #[test]
    fn truncated_bytes_fail_whole_payload() {
        let msg = pb::FeedMessage {
            header: None,
            entity: vec![pb::FeedEntity {
                id: Some("a".into()),
                is_deleted: None,
                alert: Some(pb::Alert {
                    header_text: translated("Something long enough to cut"),
                    ..Default::default()
                }),
            }],
        };
        let bytes = msg.encode_to_vec();
        let cut = &bytes[..bytes.len() - 5];
        assert!(matches!(decode(cut), Err(DecodeError::Binary(_))));
    }
}
