//! Line-oriented decoder for the protobuf text dump the feed serves with
//! `?format=text`.
//!
//! The grammar is regular enough for a small state machine: one depth
//! counter plus the depth at which each block we care about was opened.
//! Unknown lines and blocks are skipped, so new upstream fields don't break
//! decoding.

use crate::feed::error::DecodeError;
use crate::feed::types::{
    secs_to_ms, ActivePeriod, DecodedFeed, InformedEntity, RawAlertEntity, TimestampMs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    Header,
    Description,
    Ignore,
}

struct EntityBlock {
    depth: usize,
    id: Option<String>,
    alerts: Vec<RawAlertEntity>,
}

struct AlertBlock {
    depth: usize,
    alert: RawAlertEntity,
}

#[derive(Default)]
struct Parser {
    depth: usize,
    feed_timestamp: Option<TimestampMs>,
    entity: Option<EntityBlock>,
    alert: Option<AlertBlock>,
    period: Option<(usize, ActivePeriod)>,
    informed: Option<(usize, InformedEntity)>,
    text_target: Option<(usize, TextTarget)>,
    out: Vec<RawAlertEntity>,
}

pub fn decode(raw: &[u8]) -> Result<DecodedFeed, DecodeError> {
    let text = std::str::from_utf8(raw).map_err(|e| DecodeError::Utf8(e.valid_up_to()))?;

    let mut p = Parser::default();
    for (idx, line) in text.lines().enumerate() {
        p.line(idx + 1, line.trim())?;
    }
    if p.depth != 0 {
        return Err(DecodeError::Truncated(p.depth));
    }

    Ok(DecodedFeed {
        feed_timestamp: p.feed_timestamp,
        entities: p.out,
    })
}

impl Parser {
    fn line(&mut self, line_no: usize, line: &str) -> Result<(), DecodeError> {
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        if let Some(name) = line.strip_suffix('{') {
            self.open(name.trim());
            return Ok(());
        }
        if line == "}" {
            return self.close(line_no);
        }
        match line.split_once(':') {
            Some((key, value)) => self.field(line_no, key.trim(), value.trim()),
            None => Ok(()),
        }
    }

    fn open(&mut self, name: &str) {
        self.depth += 1;
        let depth = self.depth;

        if self.alert.is_none() {
            match name {
                "entity" => {
                    self.entity = Some(EntityBlock {
                        depth,
                        id: None,
                        alerts: Vec::new(),
                    })
                }
                "alert" => {
                    self.alert = Some(AlertBlock {
                        depth,
                        alert: RawAlertEntity::default(),
                    })
                }
                _ => {}
            }
            return;
        }

        match name {
            "active_period" if self.period.is_none() => {
                self.period = Some((depth, ActivePeriod::default()));
            }
            "informed_entity" if self.informed.is_none() => {
                self.informed = Some((depth, InformedEntity::default()));
            }
            _ if self.text_target.is_none() => {
                let target = match name {
                    "header_text" => Some(TextTarget::Header),
                    "description_text" => Some(TextTarget::Description),
                    "url" | "tts_header_text" | "tts_description_text" | "cause_detail"
                    | "effect_detail" => Some(TextTarget::Ignore),
                    _ => None,
                };
                if let Some(t) = target {
                    self.text_target = Some((depth, t));
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, line_no: usize) -> Result<(), DecodeError> {
        if self.depth == 0 {
            return Err(DecodeError::UnbalancedBrace(line_no));
        }
        let depth = self.depth;
        self.depth -= 1;

        if self.text_target.is_some_and(|(d, _)| d == depth) {
            self.text_target = None;
        }
        if self.period.as_ref().is_some_and(|(d, _)| *d == depth) {
            if let (Some((_, period)), Some(a)) = (self.period.take(), self.alert.as_mut()) {
                a.alert.active_periods.push(period);
            }
        }
        if self.informed.as_ref().is_some_and(|(d, _)| *d == depth) {
            if let (Some((_, ie)), Some(a)) = (self.informed.take(), self.alert.as_mut()) {
                a.alert.informed_entities.push(ie);
            }
        }
        if self.alert.as_ref().is_some_and(|a| a.depth == depth) {
            if let Some(a) = self.alert.take() {
                self.finish_alert(a.alert);
            }
        }
        if self.entity.as_ref().is_some_and(|e| e.depth == depth) {
            if let Some(e) = self.entity.take() {
                for mut alert in e.alerts {
                    if alert.id.is_none() {
                        alert.id = e.id.clone();
                    }
                    self.out.push(alert);
                }
            }
        }
        Ok(())
    }

    fn finish_alert(&mut self, alert: RawAlertEntity) {
        // A block without a usable header is simply not an alert.
        if alert.header.as_deref().map_or(true, |h| h.trim().is_empty()) {
            return;
        }
        match self.entity.as_mut() {
            Some(e) => e.alerts.push(alert),
            None => self.out.push(alert),
        }
    }

    fn field(&mut self, line_no: usize, key: &str, value: &str) -> Result<(), DecodeError> {
        let depth = self.depth;

        let Some(a) = self.alert.as_mut() else {
            match key {
                "timestamp" if self.feed_timestamp.is_none() => {
                    self.feed_timestamp = Some(secs_to_ms(parse_int(line_no, value)?));
                }
                "id" => {
                    if let Some(e) = self.entity.as_mut().filter(|e| e.depth == depth) {
                        e.id = Some(unquote(value));
                    }
                }
                _ => {}
            }
            return Ok(());
        };

        if let Some((idepth, ie)) = self.informed.as_mut() {
            let direct = *idepth == depth;
            match key {
                "route_id" if direct => ie.route_id = Some(unquote(value)),
                "stop_id" if direct => ie.stop_id = Some(unquote(value)),
                "route_type" if direct => ie.route_type = Some(parse_int(line_no, value)?),
                "trip_id" => ie.trip_id = Some(unquote(value)),
                _ => {}
            }
            return Ok(());
        }

        match key {
            "cause" => a.alert.cause = Some(unquote(value)),
            "effect" => a.alert.effect = Some(unquote(value)),
            "text" => {
                let slot = match self.text_target.map(|(_, t)| t) {
                    None | Some(TextTarget::Header) => &mut a.alert.header,
                    Some(TextTarget::Description) => &mut a.alert.description,
                    Some(TextTarget::Ignore) => return Ok(()),
                };
                if slot.is_none() {
                    *slot = Some(unquote(value));
                }
            }
            "start" | "end" => {
                let ms = secs_to_ms(parse_int(line_no, value)?);
                let period = match self.period.as_mut() {
                    Some((_, p)) => p,
                    None => {
                        if a.alert.active_periods.is_empty() {
                            a.alert.active_periods.push(ActivePeriod::default());
                        }
                        &mut a.alert.active_periods[0]
                    }
                };
                if key == "start" {
                    period.start = Some(ms);
                } else {
                    period.end = Some(ms);
                }
            }
            "id" if a.depth == depth => a.alert.id = Some(unquote(value)),
            _ => {}
        }
        Ok(())
    }
}

fn parse_int<T: std::str::FromStr>(line: usize, value: &str) -> Result<T, DecodeError> {
    value.trim().parse().map_err(|_| DecodeError::BadInteger {
        line,
        value: value.to_string(),
    })
}

/// Strip surrounding quotes and undo protobuf text escapes. Octal escapes
/// are raw bytes (multi-byte UTF-8 arrives as `\342\200\224`), so the result
/// is assembled as bytes and converted at the end.
fn unquote(value: &str) -> String {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    if !inner.contains('\\') {
        return inner.to_string();
    }

    let src = inner.as_bytes();
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        let b = src[i];
        if b != b'\\' || i + 1 == src.len() {
            out.push(b);
            i += 1;
            continue;
        }
        let next = src[i + 1];
        match next {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'"' | b'\'' | b'\\' => out.push(next),
            b'0'..=b'7' => {
                let digits = src[i + 1..]
                    .iter()
                    .take(3)
                    .take_while(|d| (b'0'..=b'7').contains(*d))
                    .count();
                let byte = src[i + 1..i + 1 + digits]
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                out.push(u8::try_from(byte).unwrap_or(u8::MAX));
                i += 1 + digits;
                continue;
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
        i += 2;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_alert_blocks_decode_in_any_field_order() {
        let feed = r#"
header {
  gtfs_realtime_version: "2.0"
  timestamp: 1700000000
}
alert {
  effect: DETOUR
  end: 1700003600
  text: "Line 1 delayed"
  start: 1700000000
  cause: CONSTRUCTION
}
"#;
        let out = decode(feed.as_bytes()).unwrap();
        assert_eq!(out.feed_timestamp, Some(1_700_000_000_000));
        assert_eq!(out.entities.len(), 1);
        let a = &out.entities[0];
        assert_eq!(a.header.as_deref(), Some("Line 1 delayed"));
        assert_eq!(a.cause.as_deref(), Some("CONSTRUCTION"));
        assert_eq!(a.effect.as_deref(), Some("DETOUR"));
        assert_eq!(
            a.active_periods,
            vec![ActivePeriod {
                start: Some(1_700_000_000_000),
                end: Some(1_700_003_600_000),
            }]
        );
    }

    #[test]
    fn block_without_header_is_dropped_silently() {
        let feed = "alert {\n  cause: WEATHER\n}\nalert {\n  text: \"   \"\n}\n";
        let out = decode(feed.as_bytes()).unwrap();
        assert!(out.entities.is_empty());
    }

    #[test]
    fn header_and_description_sub_blocks_are_told_apart() {
        let feed = r#"
entity {
  alert {
    description_text {
      translation {
        text: "Shuttle buses running"
      }
    }
    header_text {
      translation {
        text: "Line 2 closed"
        language: "en"
      }
      translation {
        text: "Ligne 2 fermée"
        language: "fr"
      }
    }
    url {
      translation {
        text: "https://ttc.ca"
      }
    }
  }
  id: "late-id"
}
"#;
        let out = decode(feed.as_bytes()).unwrap();
        let a = &out.entities[0];
        assert_eq!(a.header.as_deref(), Some("Line 2 closed"));
        assert_eq!(a.description.as_deref(), Some("Shuttle buses running"));
        assert_eq!(a.id.as_deref(), Some("late-id"));
    }

    #[test]
    fn informed_entities_and_periods_use_sub_blocks() {
        let feed = r#"
alert {
  active_period {
    start: 10
  }
  active_period {
    end: 20
  }
  informed_entity {
    route_id: "501"
    route_type: 0
    trip {
      trip_id: "T1"
      route_id: "ignored"
    }
  }
  text: "Streetcar diversion"
}
"#;
        let out = decode(feed.as_bytes()).unwrap();
        let a = &out.entities[0];
        assert_eq!(a.active_periods.len(), 2);
        assert_eq!(a.active_periods[0].start, Some(10_000));
        assert_eq!(a.active_periods[1].end, Some(20_000));
        assert_eq!(
            a.informed_entities,
            vec![InformedEntity {
                route_id: Some("501".into()),
                stop_id: None,
                trip_id: Some("T1".into()),
                route_type: Some(0),
            }]
        );
    }

    #[test]
    fn unrecognized_lines_are_ignored() {
        let feed = "alert {\n  severity_level: SEVERE\n  text: \"x\"\n  mystery\n}\n";
        let out = decode(feed.as_bytes()).unwrap();
        assert_eq!(out.entities.len(), 1);
    }

    #[test]
    fn framing_errors_fail_the_whole_payload() {
        assert_eq!(
            decode(b"alert {\n  text: \"x\"\n"),
            Err(DecodeError::Truncated(1))
        );
        assert_eq!(decode(b"}\n"), Err(DecodeError::UnbalancedBrace(1)));
        assert!(matches!(
            decode(b"alert {\n  start: soon\n}\n"),
            Err(DecodeError::BadInteger { line: 2, .. })
        ));
        assert!(matches!(decode(&[0xff, 0xfe]), Err(DecodeError::Utf8(0))));
    }

    #[test]
    fn unquote_handles_escapes() {
        assert_eq!(unquote(r#""a \"b\" c""#), r#"a "b" c"#);
        assert_eq!(unquote(r#""em\342\200\224dash""#), "em\u{2014}dash");
        assert_eq!(unquote("CONSTRUCTION"), "CONSTRUCTION");
    }
}
