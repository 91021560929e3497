// tests/feed_decode.rs
//
// decode → normalize over synthetic feeds in both wire formats: N well-formed
// alerts in, N alerts out with matching fields.

use prost::Message;
use ttc_rt_proxy::feed::decode::binary::pb;
use ttc_rt_proxy::feed::decode::{decode, FeedFormat};
use ttc_rt_proxy::feed::error::DecodeError;
use ttc_rt_proxy::feed::normalize::normalize_all;
use ttc_rt_proxy::feed::types::ActivePeriod;

struct Expected {
    header: &'static str,
    cause: (i32, &'static str),
    effect: (i32, &'static str),
    start: u64,
    end: u64,
}

const FIXTURES: [Expected; 3] = [
    Expected {
        header: "Line 1 delayed",
        cause: (3, "TECHNICAL_PROBLEM"),
        effect: (3, "SIGNIFICANT_DELAYS"),
        start: 1_700_000_000,
        end: 1_700_003_600,
    },
    Expected {
        header: "504 King diverting",
        cause: (10, "CONSTRUCTION"),
        effect: (4, "DETOUR"),
        start: 1_700_100_000,
        end: 1_700_200_000,
    },
    Expected {
        header: "Bloor station elevator out",
        cause: (9, "MAINTENANCE"),
        effect: (11, "ACCESSIBILITY_ISSUE"),
        start: 1_699_000_000,
        end: 1_701_000_000,
    },
];

fn binary_feed() -> Vec<u8> {
    let entity = FIXTURES
        .iter()
        .enumerate()
        .map(|(i, f)| pb::FeedEntity {
            id: Some(format!("e{i}")),
            is_deleted: None,
            alert: Some(pb::Alert {
                active_period: vec![pb::TimeRange {
                    start: Some(f.start),
                    end: Some(f.end),
                }],
                cause: Some(f.cause.0),
                effect: Some(f.effect.0),
                header_text: Some(pb::TranslatedString {
                    translation: vec![pb::Translation {
                        text: Some(f.header.to_string()),
                        language: Some("en".into()),
                    }],
                }),
                ..Default::default()
            }),
        })
        .collect();

    pb::FeedMessage {
        header: Some(pb::FeedHeader {
            gtfs_realtime_version: Some("2.0".into()),
            incrementality: Some(0),
            timestamp: Some(1_700_000_123),
        }),
        entity,
    }
    .encode_to_vec()
}

fn text_feed() -> String {
    let mut out = String::from("header {\n  gtfs_realtime_version: \"2.0\"\n  timestamp: 1700000123\n}\n");
    for (i, f) in FIXTURES.iter().enumerate() {
        out.push_str(&format!(
            "entity {{\n  id: \"e{i}\"\n  alert {{\n    active_period {{\n      start: {}\n      end: {}\n    }}\n    cause: {}\n    effect: {}\n    header_text {{\n      translation {{\n        text: \"{}\"\n        language: \"en\"\n      }}\n    }}\n  }}\n}}\n",
            f.start, f.end, f.cause.1, f.effect.1, f.header
        ));
    }
    out
}

fn check_round_trip(raw: &[u8], format: FeedFormat) {
    let decoded = decode(raw, format).expect("decode");
    assert_eq!(decoded.feed_timestamp, Some(1_700_000_123_000));

    let (alerts, dropped) = normalize_all(decoded.entities);
    assert_eq!(dropped, 0);
    assert_eq!(alerts.len(), FIXTURES.len());

    for (i, (a, f)) in alerts.iter().zip(FIXTURES.iter()).enumerate() {
        assert_eq!(a.id, format!("e{i}"));
        assert_eq!(a.header, f.header);
        assert_eq!(a.cause.as_deref(), Some(f.cause.1));
        assert_eq!(a.effect.as_deref(), Some(f.effect.1));
        assert_eq!(
            a.active_periods,
            vec![ActivePeriod {
                start: Some(f.start as i64 * 1000),
                end: Some(f.end as i64 * 1000),
            }]
        );
    }
}

#[test]
fn binary_feed_round_trips_through_normalize() {
    check_round_trip(&binary_feed(), FeedFormat::Binary);
}

#[test]
fn text_feed_round_trips_through_normalize() {
    check_round_trip(text_feed().as_bytes(), FeedFormat::Text);
}

#[test]
fn format_is_never_sniffed() {
    // Text handed to the binary decoder is a decode failure, not a guess.
    assert!(matches!(
        decode(b"alert {", FeedFormat::Binary),
        Err(DecodeError::Binary(_))
    ));
    // The same bytes as text are just an unterminated block.
    assert_eq!(
        decode(b"alert {", FeedFormat::Text),
        Err(DecodeError::Truncated(1))
    );
}

#[test]
fn truncated_binary_yields_single_error_no_partials() {
    let bytes = binary_feed();
    let res = decode(&bytes[..bytes.len() - 3], FeedFormat::Binary);
    assert!(matches!(res, Err(DecodeError::Binary(_))));
}

#[test]
fn missing_optional_fields_decode_to_none() {
    let raw = pb::FeedMessage {
        header: None,
        entity: vec![pb::FeedEntity {
            id: None,
            is_deleted: None,
            alert: Some(pb::Alert {
                header_text: Some(pb::TranslatedString {
                    translation: vec![pb::Translation {
                        text: Some("Minimal".into()),
                        language: None,
                    }],
                }),
                ..Default::default()
            }),
        }],
    }
    .encode_to_vec();

    let decoded = decode(&raw, FeedFormat::Binary).unwrap();
    assert_eq!(decoded.feed_timestamp, None);
    let (alerts, _) = normalize_all(decoded.entities);
    let a = &alerts[0];
    assert_eq!(a.cause, None);
    assert_eq!(a.effect, None);
    assert_eq!(a.description, "");
    assert!(a.active_periods.is_empty());
    assert!(a.informed_entities.is_empty());
    assert!(!a.id.is_empty(), "synthesized id expected");
}
