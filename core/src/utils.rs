// Copyright (c) Concord Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::snapshot::{EventIndex, HistorySnapshot};

/// Renders a set of event indices as `creator@hash` pairs for logs.
pub(crate) fn format_event_set(snapshot: &HistorySnapshot, events: &[EventIndex]) -> String {
    let rendered: Vec<String> = events
        .iter()
        .map(|&event| format!("{}@{}", snapshot.creator(event), snapshot.hash(event)))
        .collect();
    format!("{{{}}}", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use crate::event::{TestEvent, VerifiedEvent};

    use super::*;

    #[test]
    fn test_format_event_set() {
        let event = TestEvent::new("A").set_timestamp_ms(1).build();
        let snapshot =
            HistorySnapshot::build(vec![VerifiedEvent::new_for_test(event)]).unwrap();
        let rendered = format_event_set(&snapshot, &[0]);
        assert!(rendered.starts_with("{A@"));
        assert!(rendered.ends_with('}'));
    }
}
