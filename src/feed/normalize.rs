// src/feed/normalize.rs
use rand::{distr::Alphanumeric, Rng};

use crate::feed::types::{Alert, InformedEntity, RawAlertEntity};

/// Map a decoded entity onto the canonical [`Alert`] shape.
///
/// Returns `None` when the header is missing or blank: a header is the
/// minimum viable alert. This is a skip, not an error.
pub fn normalize(raw: RawAlertEntity) -> Option<Alert> {
    let header = non_blank(raw.header)?;

    Some(Alert {
        id: non_blank(raw.id).unwrap_or_else(synthesize_id),
        header,
        description: non_blank(raw.description).unwrap_or_default(),
        cause: non_blank(raw.cause),
        effect: non_blank(raw.effect),
        active_periods: raw.active_periods,
        informed_entities: raw
            .informed_entities
            .into_iter()
            .map(|ie| InformedEntity {
                route_id: non_blank(ie.route_id),
                stop_id: non_blank(ie.stop_id),
                trip_id: non_blank(ie.trip_id),
                route_type: ie.route_type,
            })
            .collect(),
    })
}

/// Normalize a batch. Returns (alerts, dropped_count).
pub fn normalize_all(raw: Vec<RawAlertEntity>) -> (Vec<Alert>, usize) {
    let total = raw.len();
    let alerts: Vec<Alert> = raw.into_iter().filter_map(normalize).collect();
    let dropped = total - alerts.len();
    (alerts, dropped)
}

fn non_blank(s: Option<String>) -> Option<String> {
    let s = s?;
    let t = s.trim();
    if t.is_empty() {
        None
    } else if t.len() == s.len() {
        Some(s)
    } else {
        Some(t.to_string())
    }
}

/// Short random token for entities the feed didn't give an id.
fn synthesize_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(11)
        .map(char::from)
        .collect()
}
