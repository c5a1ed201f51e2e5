use std::cmp::Ordering;
use std::fmt::Write as _;

use super::{Event, Schedule};

/// Text of the TAKEOFF event
pub fn takeoff_text(duration: f64) -> String {
    format!("Takeoff sequence ({:.1}s)", duration)
}

/// Text of a WAIT event; always shows the duration the script asked for
pub fn wait_text(duration: f64) -> String {
    format!("wait {:.2}s", duration)
}

/// Warning raised when a wait is stretched to the lockstep slot
pub fn wait_extension_warning(actor: &str, requested: f64, step: f64) -> String {
    format!(
        "[{}] wait of {:.2}s is stretched to {:.2}s to stay in step with the other drones",
        actor, requested, step
    )
}

/// Text of the LAND event
pub fn land_text(targets: &[String]) -> String {
    if targets.is_empty() {
        return "Landing".to_string();
    }
    format!("Landing {}", targets.join(", "))
}

/// Sort by time; at equal times warnings come first, otherwise order is kept
pub fn order_events(events: &mut [Event]) {
    events.sort_by(|a, b| {
        a.time
            .total_cmp(&b.time)
            .then_with(|| match (a.is_warning(), b.is_warning()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            })
    });
}

/// One human-readable timeline row
pub fn timeline_line(event: &Event) -> String {
    let detail = match (event.command(), event.text()) {
        (Some(command), Some(text)) => format!("{} ({})", command, text),
        (Some(command), None) => command.to_string(),
        (None, Some(text)) => text.to_string(),
        (None, None) => String::new(),
    };
    format!(
        "{:>8.2}s  {:<8} {:<12} {}",
        event.time,
        event.type_name(),
        event.target,
        detail
    )
}

/// The whole schedule as a printable timeline
pub fn render_timeline(schedule: &Schedule) -> String {
    let mut out = String::new();
    for event in &schedule.events {
        let _ = writeln!(out, "{}", timeline_line(event));
    }
    let _ = writeln!(out, "total: {:.2}s", schedule.total_time);
    out
}
