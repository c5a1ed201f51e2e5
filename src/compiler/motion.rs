//! Translation of sprite motion into drone SDK commands
//!
//! Distances are whole centimetres; anything below the drone's minimum move
//! is dropped with a warning instead of being sent.

use crate::config::CompilerConfig;

/// Axis a single move command travels along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Scratch x: `right` / `left`
    Horizontal,
    /// Scratch y: `forward` / `back`
    Depth,
    /// Sprite size: `up` / `down`
    Vertical,
}

impl Axis {
    fn keyword(self, positive: bool) -> &'static str {
        match (self, positive) {
            (Axis::Horizontal, true) => "right",
            (Axis::Horizontal, false) => "left",
            (Axis::Depth, true) => "forward",
            (Axis::Depth, false) => "back",
            (Axis::Vertical, true) => "up",
            (Axis::Vertical, false) => "down",
        }
    }

    fn speed(self, config: &CompilerConfig) -> f64 {
        match self {
            Axis::Horizontal | Axis::Depth => config.horizontal_speed_cms,
            Axis::Vertical => config.vertical_speed_cms,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Axis::Horizontal => "horizontal move",
            Axis::Depth => "forward/back move",
            Axis::Vertical => "altitude change",
        }
    }
}

/// Result of translating one axis delta
#[derive(Debug, Clone, PartialEq)]
pub enum AxisMove {
    /// Command to send, and how long it takes
    Command {
        /// SDK command text
        command: String,
        /// Seconds
        duration: f64,
    },
    /// Non-zero delta below the minimum move; carries the operator warning
    TooSmall(String),
    /// No movement on this axis
    Still,
}

/// Scale a Scratch-unit planar delta to whole centimetres (truncating)
pub fn planar_cm(delta: f64, config: &CompilerConfig) -> i64 {
    whole_cm(delta * config.scratch_to_cm_rate)
}

/// Truncate to whole centimetres; out-of-range values saturate, NaN is zero
pub fn whole_cm(value: f64) -> i64 {
    value as i64
}

/// Time a move of `distance` cm takes: `max(distance / speed + overhead, floor)`
pub fn move_duration(distance: f64, speed: f64, config: &CompilerConfig) -> f64 {
    if distance == 0.0 {
        return 0.0;
    }
    let calculated = distance / speed + config.move_time_overhead;
    calculated.max(config.minimum_move_time)
}

/// Translate a delta (cm) along `axis` for the sprite `actor`
pub fn axis_move(actor: &str, axis: Axis, delta_cm: i64, config: &CompilerConfig) -> AxisMove {
    let distance = delta_cm.unsigned_abs();
    if distance == 0 {
        return AxisMove::Still;
    }
    if distance < config.min_move_cm.unsigned_abs() {
        return AxisMove::TooSmall(format!(
            "[{}] {} of {}cm is below the {}cm minimum and was skipped",
            actor,
            axis.label(),
            distance,
            config.min_move_cm
        ));
    }
    AxisMove::Command {
        command: format!("{} {}", axis.keyword(delta_cm > 0), distance),
        duration: move_duration(distance as f64, axis.speed(config), config),
    }
}

/// Translate a turn; negative angles turn the other way, whole-degree zero is dropped
pub fn rotation(degrees: f64, clockwise: bool, config: &CompilerConfig) -> Option<(String, f64)> {
    let whole = degrees as i64;
    if whole == 0 {
        return None;
    }
    let keyword = if clockwise == (whole > 0) { "cw" } else { "ccw" };
    let duration = config.rotation_base_time + degrees.abs() / 90.0 * config.rotation_time_per_90;
    Some((format!("{} {}", keyword, whole.unsigned_abs()), duration))
}

/// Recognise a flip broadcast (`"flip l"`, `"FLIP R"`, ...) and return its command
///
/// The whole message is lower-cased before matching, direction included.
pub fn flip_command(message: &str) -> Option<String> {
    let message = message.to_lowercase();
    if !message.starts_with("flip") {
        return None;
    }
    let parts: Vec<&str> = message.split_whitespace().collect();
    match parts.as_slice() {
        [_, direction @ ("l" | "r" | "f" | "b")] => Some(format!("flip {}", direction)),
        _ => None,
    }
}
