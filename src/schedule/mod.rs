//! Time-stamped show schedule
//!
//! A [`Schedule`] is the single globally ordered list of [`Event`]s that the
//! show runner replays against wall-clock time. It is produced by
//! [`synthesize`] from the per-sprite action lists and is plain data: it can be
//! serialized, printed, and fingerprinted.

/// Text and ordering helpers for events.
pub mod format;
/// Lockstep merge of per-sprite actions.
pub mod synthesizer;

use std::collections::BTreeSet;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::compiler::STOP_ALL;

pub use synthesizer::{Lane, synthesize};

/// Target of the closing land event when it addresses the whole fleet
pub const ALL_TARGET: &str = "ALL";

/// Command sent to every flying drone at the end of the show
pub const LAND_COMMAND: &str = "land";

/// What happens at an event's offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Fleet takeoff at offset zero
    Takeoff {
        /// Operator text
        text: String,
    },
    /// A wire command for `target`
    Command {
        /// SDK command text
        command: String,
    },
    /// An explicit wait in the sprite's script
    Wait {
        /// Seconds the script asked for
        duration: f64,
        /// Operator text, showing the original duration
        text: String,
    },
    /// A timing or threshold problem the operator should see
    Warning {
        /// Operator text
        text: String,
    },
    /// The closing landing bracket
    Land {
        /// Always [`LAND_COMMAND`]
        command: String,
        /// Drones that had any action
        targets: Vec<String>,
        /// Operator text
        text: String,
    },
}

/// A single time-stamped schedule entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds from show start
    pub time: f64,
    /// Drone name, `system`, or [`ALL_TARGET`]
    pub target: String,
    /// Event payload
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Create an event
    pub fn new(time: f64, target: impl Into<String>, kind: EventKind) -> Self {
        Self {
            time,
            target: target.into(),
            kind,
        }
    }

    /// Upper-case type name, as it appears in the serialized form
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            EventKind::Takeoff { .. } => "TAKEOFF",
            EventKind::Command { .. } => "COMMAND",
            EventKind::Wait { .. } => "WAIT",
            EventKind::Warning { .. } => "WARNING",
            EventKind::Land { .. } => "LAND",
        }
    }

    /// Whether this is a WARNING
    pub fn is_warning(&self) -> bool {
        matches!(self.kind, EventKind::Warning { .. })
    }

    /// Wire command carried by COMMAND and LAND events
    pub fn command(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Command { command } | EventKind::Land { command, .. } => Some(command),
            _ => None,
        }
    }

    /// Operator text carried by every kind except COMMAND
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Takeoff { text }
            | EventKind::Wait { text, .. }
            | EventKind::Warning { text }
            | EventKind::Land { text, .. } => Some(text),
            EventKind::Command { .. } => None,
        }
    }

    /// Whether this is the global abort sentinel
    pub fn is_stop_all(&self) -> bool {
        matches!(&self.kind, EventKind::Command { command } if command == STOP_ALL)
    }
}

/// The full show timeline
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schedule {
    /// Events, ordered by time with warnings first at equal times
    pub events: Vec<Event>,
    /// Offset of the landing bracket; `0.0` for an empty schedule
    pub total_time: f64,
}

impl Schedule {
    /// The schedule of a project with nothing to fly
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether there is nothing to fly
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Distinct event offsets, ascending
    pub fn offsets(&self) -> Vec<f64> {
        let mut offsets: Vec<f64> = self.events.iter().map(|event| event.time).collect();
        offsets.sort_by(f64::total_cmp);
        offsets.dedup();
        offsets
    }

    /// Events stamped exactly at `time`
    pub fn events_at(&self, time: f64) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |event| event.time == time)
    }

    /// Whether any sprite aborts the show
    pub fn contains_stop_all(&self) -> bool {
        self.events.iter().any(Event::is_stop_all)
    }

    /// Drones the schedule addresses (command, wait and land targets)
    pub fn participants(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        for event in &self.events {
            match &event.kind {
                EventKind::Command { .. } if !event.is_stop_all() => {
                    names.insert(event.target.as_str());
                }
                EventKind::Wait { .. } => {
                    names.insert(event.target.as_str());
                }
                EventKind::Land { targets, .. } => {
                    names.extend(targets.iter().map(String::as_str));
                }
                _ => {}
            }
        }
        names
    }

    /// Warning texts, in schedule order
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.events
            .iter()
            .filter(|event| event.is_warning())
            .filter_map(Event::text)
    }

    /// Pretty JSON encoding
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Content hash; equal schedules have equal fingerprints
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();

        for event in &self.events {
            if let Ok(encoded) = serde_json::to_vec(event) {
                hasher.update(&encoded);
            }
        }
        hasher.update(&self.total_time.to_le_bytes());

        format!("sched_{}", hasher.finalize().to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Schedule {
        Schedule {
            events: vec![
                Event::new(0.0, "system", EventKind::Takeoff { text: "up".into() }),
                Event::new(8.0, "D1", EventKind::Warning { text: "short".into() }),
                Event::new(8.0, "D1", EventKind::Command { command: "cw 90".into() }),
                Event::new(
                    8.0,
                    "D2",
                    EventKind::Wait {
                        duration: 1.0,
                        text: "wait 1.00s".into(),
                    },
                ),
                Event::new(9.0, "system", EventKind::Command { command: STOP_ALL.into() }),
                Event::new(
                    11.6,
                    ALL_TARGET,
                    EventKind::Land {
                        command: LAND_COMMAND.into(),
                        targets: vec!["D1".into(), "D2".into()],
                        text: "land".into(),
                    },
                ),
            ],
            total_time: 11.6,
        }
    }

    #[test]
    fn test_event_wire_shape() {
        let event = Event::new(8.0, "D1", EventKind::Command { command: "up 40".into() });
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(
            encoded,
            json!({"time": 8.0, "target": "D1", "type": "COMMAND", "command": "up 40"})
        );

        let decoded: Event = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_offsets_and_lookup() {
        let schedule = sample();
        assert_eq!(schedule.offsets(), vec![0.0, 8.0, 9.0, 11.6]);
        assert_eq!(schedule.events_at(8.0).count(), 3);
        assert!(schedule.contains_stop_all());
        assert_eq!(schedule.warnings().collect::<Vec<_>>(), vec!["short"]);
    }

    #[test]
    fn test_participants_skip_system() {
        let schedule = sample();
        let names: Vec<&str> = schedule.participants().into_iter().collect();
        assert_eq!(names, vec!["D1", "D2"]);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = sample();
        let mut b = sample();
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.total_time += 0.1;
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert!(a.fingerprint().starts_with("sched_"));
    }

    #[test]
    fn test_empty_schedule() {
        let schedule = Schedule::empty();
        assert!(schedule.is_empty());
        assert_eq!(schedule.total_time, 0.0);
        assert!(schedule.offsets().is_empty());
    }
}
