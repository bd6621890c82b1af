//! Replays recorded host events from a JSON Lines script.
//!
//! One event per line, stamped with its offset from the start of the replay:
//!
//! ```text
//! {"at_ms": 0, "kind": "state", "viewed_entity": 4, "camera": "driver", "track": "BL1", "phase": "no_session"}
//! {"at_ms": 500, "kind": "session_start"}
//! {"at_ms": 800, "kind": "telemetry", "cars": [{"entity_id": 4, "x": 0, "y": 0, "z": 0, "heading": 0}]}
//! {"at_ms": 9000, "kind": "session_end"}
//! ```

use crossbeam_channel::Sender;
use serde::Deserialize;
use std::io::BufRead;
use std::thread;
use std::time::{Duration, Instant};
use trackside::{EntityTelemetry, Event, StateUpdate, TransportError};

#[derive(Debug, Deserialize)]
struct ScriptLine {
    #[serde(default)]
    at_ms: u64,
    #[serde(flatten)]
    event: ScriptEvent,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ScriptEvent {
    State(StateUpdate),
    SessionStart,
    SessionEnd,
    Telemetry { cars: Vec<EntityTelemetry> },
}

impl From<ScriptEvent> for Event {
    fn from(event: ScriptEvent) -> Self {
        match event {
            ScriptEvent::State(update) => Event::StateChanged(update),
            ScriptEvent::SessionStart => Event::SessionStarted,
            ScriptEvent::SessionEnd => Event::SessionEnded,
            ScriptEvent::Telemetry { cars } => Event::Telemetry(cars),
        }
    }
}

/// Sends every scripted event at its offset from `start`, then
/// [`Event::Shutdown`]. A line that fails to parse is reported as a lost
/// transport and ends the replay.
///
/// Returns the number of scripted events sent.
pub fn replay(reader: impl BufRead, events: &Sender<Event>, start: Instant) -> usize {
    let mut sent = 0;
    for (number, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                let _ = events.send(Event::TransportLost(TransportError::ConnectionLost(
                    e.to_string(),
                )));
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let parsed: ScriptLine = match serde_json::from_str(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                let _ = events.send(Event::TransportLost(TransportError::Malformed(format!(
                    "line {}: {}",
                    number + 1,
                    e
                ))));
                break;
            }
        };

        let due = start + Duration::from_millis(parsed.at_ms);
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        if events.send(parsed.event.into()).is_err() {
            log::debug!("Event loop gone, replay stopped");
            return sent;
        }
        sent += 1;
    }

    let _ = events.send(Event::Shutdown);
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use trackside::{CameraMode, SessionPhase};

    #[test]
    fn test_replays_every_kind_then_shuts_down() {
        let script = r#"
{"at_ms": 0, "kind": "state", "viewed_entity": 4, "camera": "driver", "track": "BL1", "phase": "in_progress"}
{"at_ms": 0, "kind": "session_start"}

{"at_ms": 5, "kind": "telemetry", "cars": [{"entity_id": 4, "x": 65536, "y": 0, "z": 0, "heading": 16384}]}
{"at_ms": 10, "kind": "session_end"}
"#;
        let (tx, rx) = crossbeam_channel::unbounded();
        let start = Instant::now();
        let sent = replay(Cursor::new(script), &tx, start);

        assert_eq!(sent, 4);
        assert!(start.elapsed() >= Duration::from_millis(10));

        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(events.len(), 5);
        match &events[0] {
            Event::StateChanged(update) => {
                assert_eq!(update.camera, CameraMode::Driver);
                assert_eq!(update.phase, SessionPhase::InProgress);
                assert_eq!(update.track.as_deref(), Some("BL1"));
                assert!(!update.ui_overlay);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(events[1], Event::SessionStarted));
        match &events[2] {
            Event::Telemetry(cars) => {
                assert_eq!(cars.len(), 1);
                assert_eq!(cars[0].heading, 16384);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(events[3], Event::SessionEnded));
        assert!(matches!(events[4], Event::Shutdown));
    }

    #[test]
    fn test_malformed_line_reports_transport_loss() {
        let script = "{\"kind\": \"session_start\"}\n{\"kind\": \"warp_drive\"}\n{\"kind\": \"session_end\"}\n";
        let (tx, rx) = crossbeam_channel::unbounded();
        let sent = replay(Cursor::new(script), &tx, Instant::now());

        assert_eq!(sent, 1);
        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Event::SessionStarted));
        match &events[1] {
            Event::TransportLost(TransportError::Malformed(message)) => {
                assert!(message.starts_with("line 2:"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(events[2], Event::Shutdown));
    }
}
