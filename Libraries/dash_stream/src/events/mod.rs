//! Timed-event engine: pending inline/inband events, active events, and the periodic
//! timer that fires them against the playback clock.

pub mod timer;

use indexmap::IndexMap;
use tracing::debug;

use crate::types::ScheduledEvent;

pub use timer::EventTimer;

/// Scheme/value pair of events that ask for a manifest reload.
pub const MPD_RELOAD_SCHEME: &str = "urn:mpeg:dash:event:2012";
pub const MPD_RELOAD_VALUE: &str = "1";

pub fn is_reload_event(event: &ScheduledEvent) -> bool {
    event.stream.scheme_id_uri == MPD_RELOAD_SCHEME && event.stream.value == MPD_RELOAD_VALUE
}

/// What a single evaluation did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickOutcome {
    pub fired: Vec<u64>,
    pub expired: Vec<u64>,
    /// Number of reload requests to issue, one per fired reload event.
    pub reloads: usize,
}

/// The three event collections. Insertion order is kept so firing order is stable.
#[derive(Debug, Default)]
pub struct EventTables {
    inline: IndexMap<u64, ScheduledEvent>,
    inband: IndexMap<u64, ScheduledEvent>,
    active: IndexMap<u64, ScheduledEvent>,
}

impl EventTables {
    /// Drops every pending inline event and rebuilds the collection from `events`.
    pub fn replace_inline(&mut self, events: Vec<ScheduledEvent>) {
        self.inline.clear();
        for event in events {
            debug!("Add inline event with id {}", event.id);
            self.inline.insert(event.id, event);
        }
        debug!("Added {} inline events", self.inline.len());
    }

    /// Adds inband events whose id has not been seen yet. Returns how many were added.
    pub fn merge_inband(&mut self, events: Vec<ScheduledEvent>) -> usize {
        let mut added = 0;
        for event in events {
            if self.inband.contains_key(&event.id) {
                debug!("Repeated event with id {}", event.id);
                continue;
            }
            debug!("Add inband event with id {}", event.id);
            self.inband.insert(event.id, event);
            added += 1;
        }
        added
    }

    pub fn evaluate(&mut self, now: f64, tolerance: f64) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        trigger(&mut self.inband, &mut self.active, now, tolerance, &mut outcome);
        trigger(&mut self.inline, &mut self.active, now, tolerance, &mut outcome);

        self.active.retain(|id, event| {
            if event.end_seconds() < now {
                debug!("Remove Event {} at time {}", id, now);
                outcome.expired.push(*id);
                false
            } else {
                true
            }
        });
        outcome
    }

    pub fn clear(&mut self) {
        self.inline.clear();
        self.inband.clear();
        self.active.clear();
    }

    pub fn pending_inline(&self) -> usize {
        self.inline.len()
    }

    pub fn pending_inband(&self) -> usize {
        self.inband.len()
    }

    pub fn is_active(&self, id: u64) -> bool {
        self.active.contains_key(&id)
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }
}

fn trigger(
    pending: &mut IndexMap<u64, ScheduledEvent>,
    active: &mut IndexMap<u64, ScheduledEvent>,
    now: f64,
    tolerance: f64,
    outcome: &mut TickOutcome,
) {
    pending.retain(|id, event| {
        let presentation_time = event.presentation_seconds();
        let due = presentation_time == 0.0
            || (presentation_time <= now && now < presentation_time + tolerance);
        if !due {
            return true;
        }

        debug!("Start Event {} at {}", id, now);
        if event.duration > 0 {
            active.insert(*id, event.clone());
        }
        if is_reload_event(event) {
            outcome.reloads += 1;
        }
        outcome.fired.push(*id);
        false
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventStreamKey;

    fn event(id: u64, presentation_time: u64, duration: u64) -> ScheduledEvent {
        ScheduledEvent {
            id,
            presentation_time,
            duration,
            stream: EventStreamKey {
                scheme_id_uri: "urn:example:events".into(),
                value: "x".into(),
                timescale: 1000,
            },
        }
    }

    #[test]
    fn fires_inside_tolerance_window_only() {
        let mut tables = EventTables::default();
        tables.replace_inline(vec![event(1, 5000, 0)]);

        assert!(tables.evaluate(4.95, 0.1).fired.is_empty());
        assert!(tables.evaluate(5.1, 0.1).fired.is_empty());
        assert_eq!(tables.evaluate(5.05, 0.1).fired, vec![1]);
        assert_eq!(tables.pending_inline(), 0);
    }

    #[test]
    fn window_upper_bound_is_exclusive() {
        let mut tables = EventTables::default();
        tables.replace_inline(vec![event(1, 2000, 0)]);
        assert!(tables.evaluate(2.5, 0.5).fired.is_empty());
        assert_eq!(tables.evaluate(2.0, 0.5).fired, vec![1]);
    }

    #[test]
    fn zero_duration_never_becomes_active() {
        let mut tables = EventTables::default();
        tables.replace_inline(vec![event(1, 0, 0), event(2, 0, 3000)]);

        let outcome = tables.evaluate(0.0, 0.1);
        assert_eq!(outcome.fired, vec![1, 2]);
        assert!(!tables.is_active(1));
        assert!(tables.is_active(2));
    }

    #[test]
    fn active_events_expire_after_their_end() {
        let mut tables = EventTables::default();
        tables.replace_inline(vec![event(7, 1000, 2000)]);
        tables.evaluate(1.0, 0.1);
        assert!(tables.is_active(7));

        assert!(tables.evaluate(3.0, 0.1).expired.is_empty());
        assert_eq!(tables.evaluate(3.05, 0.1).expired, vec![7]);
        assert_eq!(tables.active_len(), 0);
    }

    #[test]
    fn inband_is_evaluated_before_inline() {
        let mut tables = EventTables::default();
        tables.replace_inline(vec![event(1, 0, 0)]);
        tables.merge_inband(vec![event(2, 0, 0)]);
        assert_eq!(tables.evaluate(0.0, 0.1).fired, vec![2, 1]);
    }

    #[test]
    fn reload_events_are_counted_once_each() {
        let mut tables = EventTables::default();
        let mut reload = event(3, 0, 0);
        reload.stream.scheme_id_uri = MPD_RELOAD_SCHEME.into();
        reload.stream.value = MPD_RELOAD_VALUE.into();
        tables.replace_inline(vec![reload]);

        assert_eq!(tables.evaluate(0.0, 0.1).reloads, 1);
        assert_eq!(tables.evaluate(0.0, 0.1).reloads, 0);
    }

    #[test]
    fn zero_timescale_counts_as_seconds() {
        let mut tables = EventTables::default();
        let mut e = event(9, 4, 0);
        e.stream.timescale = 0;
        tables.replace_inline(vec![e]);
        assert_eq!(tables.evaluate(4.0, 0.1).fired, vec![9]);
    }
}
