// src/feed/dedup.rs
use std::collections::HashSet;

use crate::feed::types::Alert;

/// Collapse alerts sharing an identity key (the header text, exact match).
/// Stable: the first occurrence wins and relative order is kept.
/// Returns (kept, removed_count).
pub fn dedup(alerts: Vec<Alert>) -> (Vec<Alert>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(alerts.len());
    let mut keep = Vec::with_capacity(alerts.len());
    let mut removed = 0usize;

    for a in alerts {
        if !seen.insert(a.identity_key().to_string()) {
            removed += 1;
            continue;
        }
        keep.push(a);
    }

    (keep, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(id: &str, header: &str) -> Alert {
        Alert {
            id: id.into(),
            header: header.into(),
            description: String::new(),
            cause: None,
            effect: None,
            active_periods: vec![],
            informed_entities: vec![],
        }
    }

    #[test]
    fn first_seen_wins() {
        let (kept, removed) = dedup(vec![
            alert("x1", "Line 1 delayed"),
            alert("x2", "Line 2 closed"),
            alert("x3", "Line 1 delayed"),
        ]);
        assert_eq!(removed, 1);
        assert_eq!(
            kept.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec!["x1", "x2"]
        );
    }

    #[test]
    fn header_match_is_case_sensitive() {
        let (kept, removed) = dedup(vec![alert("a", "Detour"), alert("b", "detour")]);
        assert_eq!(kept.len(), 2);
        assert_eq!(removed, 0);
    }
}
