use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Format: err-{sequence}-{random8}
///
/// The sequence is process-wide and strictly increasing, so ids stay distinct
/// even when several events share one clock tick.
pub fn generate_event_id() -> String {
    let seq = EVENT_SEQ.fetch_add(1, Ordering::Relaxed) + 1;
    let uuid = Uuid::new_v4().simple().to_string();
    format!("err-{}-{}", seq, &uuid[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::collections::HashSet;

    #[test]
    fn test_generate_event_id_format() {
        let id = generate_event_id();
        let re = Regex::new(r"^err-\d+-[a-f0-9]{8}$").unwrap();
        assert!(re.is_match(&id), "Generated ID: {}", id);
    }

    #[test]
    fn test_generate_event_id_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..500 {
            let id = generate_event_id();
            assert!(ids.insert(id.clone()), "Duplicate ID: {}", id);
        }
    }
}
