//! Lockstep merge of per-sprite action lists
//!
//! Every sprite contributes its next action to the current step; the step
//! lasts as long as the slowest of them. Waits shorter than the step are
//! stretched and reported. The timeline is bracketed by a takeoff at zero and
//! a landing after the last step.

use super::format;
use super::{ALL_TARGET, Event, EventKind, LAND_COMMAND, Schedule};
use crate::compiler::{Action, SYSTEM_TARGET};
use crate::config::CompilerConfig;

/// One sprite's ordered actions
#[derive(Debug, Clone, Copy)]
pub struct Lane<'a> {
    /// Sprite name
    pub actor: &'a str,
    /// Actions in execution order
    pub actions: &'a [Action],
}

/// Merge the lanes into a single schedule
pub fn synthesize(lanes: &[Lane<'_>], config: &CompilerConfig) -> Schedule {
    if lanes.iter().all(|lane| lane.actions.is_empty()) {
        return Schedule::empty();
    }
    // Sprites that only carry warnings stay on the ground.
    let flying: Vec<String> = lanes
        .iter()
        .filter(|lane| lane.actions.iter().any(|action| !action.is_notice()))
        .map(|lane| lane.actor.to_string())
        .collect();

    let mut events = vec![Event::new(
        0.0,
        SYSTEM_TARGET,
        EventKind::Takeoff {
            text: format::takeoff_text(config.takeoff_duration),
        },
    )];
    let mut master_time = config.takeoff_duration;

    let mut heads: Vec<_> = lanes.iter().map(|lane| lane.actions.iter()).collect();
    loop {
        let step_actions: Vec<&Action> = heads.iter_mut().filter_map(Iterator::next).collect();
        if step_actions.is_empty() {
            break;
        }

        let step = step_actions
            .iter()
            .map(|action| action.duration)
            .fold(0.0, f64::max);

        for action in step_actions {
            emit_action(&mut events, action, master_time, step);
        }
        master_time += step;
    }

    let land_time = master_time + config.land_settle;
    events.push(Event::new(
        land_time,
        ALL_TARGET,
        EventKind::Land {
            command: LAND_COMMAND.to_string(),
            text: format::land_text(&flying),
            targets: flying,
        },
    ));

    format::order_events(&mut events);
    tracing::debug!(events = events.len(), total_time = land_time, "schedule synthesized");

    Schedule {
        events,
        total_time: land_time,
    }
}

fn emit_action(events: &mut Vec<Event>, action: &Action, time: f64, step: f64) {
    if action.is_wait {
        if action.duration < step {
            events.push(Event::new(
                time,
                action.actor.as_str(),
                EventKind::Warning {
                    text: format::wait_extension_warning(&action.actor, action.duration, step),
                },
            ));
        }
        events.push(Event::new(
            time,
            action.actor.as_str(),
            EventKind::Wait {
                duration: action.duration,
                text: format::wait_text(action.duration),
            },
        ));
    }

    for command in &action.commands {
        events.push(Event::new(
            time,
            command.target.as_str(),
            EventKind::Command {
                command: command.command.clone(),
            },
        ));
    }

    for warning in &action.warnings {
        events.push(Event::new(
            time,
            action.actor.as_str(),
            EventKind::Warning {
                text: warning.clone(),
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane<'a>(actor: &'a str, actions: &'a [Action]) -> Lane<'a> {
        Lane { actor, actions }
    }

    #[test]
    fn test_no_actions_is_empty() {
        let config = CompilerConfig::default();
        let schedule = synthesize(&[lane("D1", &[]), lane("D2", &[])], &config);
        assert!(schedule.is_empty());
        assert_eq!(schedule.total_time, 0.0);
    }

    #[test]
    fn test_lockstep_uses_slowest_action() {
        let config = CompilerConfig::default();
        let d1 = [
            Action::command("D1", "cw 90", 2.0),
            Action::command("D1", "up 20", 1.5),
        ];
        let d2 = [Action::command("D2", "ccw 270", 5.0)];
        let schedule = synthesize(&[lane("D1", &d1), lane("D2", &d2)], &config);

        let commands: Vec<(f64, &str, &str)> = schedule
            .events
            .iter()
            .filter_map(|e| e.command().map(|c| (e.time, e.target.as_str(), c)))
            .collect();
        assert_eq!(
            commands,
            vec![
                (8.0, "D1", "cw 90"),
                (8.0, "D2", "ccw 270"),
                (13.0, "D1", "up 20"),
                (14.6, ALL_TARGET, "land"),
            ]
        );
        assert_eq!(schedule.total_time, 8.0 + 5.0 + 1.5 + 0.1);
    }

    #[test]
    fn test_short_wait_is_stretched_with_warning() {
        let config = CompilerConfig::default();
        let d1 = [Action::command("D1", "cw 360", 8.0)];
        let d2 = [Action::wait("D2", 1.0)];
        let schedule = synthesize(&[lane("D1", &d1), lane("D2", &d2)], &config);

        let at_step: Vec<&Event> = schedule.events_at(8.0).collect();
        assert!(at_step[0].is_warning());
        assert_eq!(at_step[0].target, "D2");
        assert_eq!(schedule.warnings().count(), 1);

        let wait = at_step
            .iter()
            .find(|e| e.type_name() == "WAIT")
            .unwrap();
        assert_eq!(wait.text(), Some("wait 1.00s"));
    }

    #[test]
    fn test_warning_only_sprite_stays_grounded() {
        let config = CompilerConfig::default();
        let d1 = [Action::command("D1", "up 40", 1.75)];
        let d2 = [Action::notice("D2", vec!["[D2] too small".to_string()])];
        let schedule = synthesize(&[lane("D1", &d1), lane("D2", &d2)], &config);

        assert_eq!(schedule.warnings().count(), 1);
        assert_eq!(schedule.participants().into_iter().collect::<Vec<_>>(), vec!["D1"]);

        let grounded = synthesize(&[lane("D2", &d2)], &config);
        assert_eq!(grounded.warnings().count(), 1);
        assert!(grounded.participants().is_empty());
        assert_eq!(grounded.events.last().and_then(|e| e.text()), Some("Landing"));
    }

    #[test]
    fn test_land_targets_only_flying_sprites() {
        let config = CompilerConfig::default();
        let d1 = [Action::wait("D1", 2.0)];
        let schedule = synthesize(&[lane("D1", &d1), lane("Idle", &[])], &config);

        let last = schedule.events.last().unwrap();
        assert_eq!(last.time, schedule.total_time);
        match &last.kind {
            EventKind::Land { targets, command, .. } => {
                assert_eq!(targets, &vec!["D1".to_string()]);
                assert_eq!(command, "land");
            }
            other => panic!("expected LAND, got {:?}", other),
        }
    }

    #[test]
    fn test_attached_warnings_become_events() {
        let config = CompilerConfig::default();
        let mut action = Action::command("D1", "forward 30", 1.5);
        action.warnings.push("skipped".to_string());
        let d1 = [action, Action::notice("D1", vec!["tail".to_string()])];
        let schedule = synthesize(&[lane("D1", &d1)], &config);

        let warnings: Vec<(f64, &str)> = schedule
            .events
            .iter()
            .filter(|e| e.is_warning())
            .map(|e| (e.time, e.text().unwrap_or_default()))
            .collect();
        assert_eq!(warnings, vec![(8.0, "skipped"), (9.5, "tail")]);
        // A zero-length trailing notice does not delay landing.
        assert_eq!(schedule.total_time, 9.6);
    }

    #[test]
    fn test_stop_all_is_a_system_command() {
        let config = CompilerConfig::default();
        let d1 = [Action::stop_all("D1")];
        let schedule = synthesize(&[lane("D1", &d1)], &config);
        assert!(schedule.contains_stop_all());
        let stop = schedule.events.iter().find(|e| e.is_stop_all()).unwrap();
        assert_eq!(stop.target, SYSTEM_TARGET);
        assert_eq!(stop.time, 8.0);
    }
}
