//! Compiler, runner and fleet configuration
//!
//! All tunables live in one JSON document (`tello_config.json` by default).
//! Every section falls back to its defaults, so a partial file is valid.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default configuration file name
pub const CONFIG_FILE: &str = "tello_config.json";

/// Top-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoreoConfig {
    /// Block-to-command translation constants
    pub compiler: CompilerConfig,

    /// Show replay timing
    pub runner: RunnerConfig,

    /// Drones and their network bindings
    pub fleet: FleetConfig,
}

/// Constants used while translating blocks into actions and actions into a schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Seconds reserved at the start of the schedule for takeoff
    pub takeoff_duration: f64,

    /// Smallest distance (cm) a drone accepts for a single move
    pub min_move_cm: i64,

    /// Scratch units to centimetres
    pub scratch_to_cm_rate: f64,

    /// Altitude (cm) every drone is assumed to hover at after takeoff
    pub initial_hover_height_cm: f64,

    /// Horizontal speed (cm/s)
    pub horizontal_speed_cms: f64,

    /// Vertical speed (cm/s)
    pub vertical_speed_cms: f64,

    /// Fixed acceleration/deceleration cost added to every move (s)
    pub move_time_overhead: f64,

    /// Floor for any non-zero move (s)
    pub minimum_move_time: f64,

    /// Fixed cost of a rotation (s)
    pub rotation_base_time: f64,

    /// Additional rotation cost per 90 degrees (s)
    pub rotation_time_per_90: f64,

    /// Duration of a flip (s)
    pub flip_duration: f64,

    /// Iterations a `forever` loop is unrolled to
    pub forever_iterations: u32,

    /// Gap between the last step and the landing event (s)
    pub land_settle: f64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            takeoff_duration: 8.0,
            min_move_cm: 20,
            scratch_to_cm_rate: 1.0,
            initial_hover_height_cm: 80.0,
            horizontal_speed_cms: 50.0,
            vertical_speed_cms: 40.0,
            move_time_overhead: 0.75,
            minimum_move_time: 1.5,
            rotation_base_time: 2.0,
            rotation_time_per_90: 1.5,
            flip_duration: 3.0,
            forever_iterations: 10,
            land_settle: 0.1,
        }
    }
}

/// Timing used while replaying a schedule against real drones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Seconds to wait for a reply to an in-show command
    pub command_timeout: f64,

    /// Seconds to wait for a reply to the final landing command
    pub land_timeout: f64,

    /// Pause after entering SDK mode (`command`)
    pub command_settle: f64,

    /// Pause after `takeoff`
    pub takeoff_settle: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command_timeout: 7.0,
            land_timeout: 5.0,
            command_settle: 2.0,
            takeoff_settle: 5.0,
        }
    }
}

impl RunnerConfig {
    /// Reply timeout for in-show commands
    pub fn command_timeout(&self) -> Duration {
        seconds(self.command_timeout)
    }

    /// Reply timeout for landing
    pub fn land_timeout(&self) -> Duration {
        seconds(self.land_timeout)
    }

    /// Pause after the given initial command
    pub fn settle_after(&self, command: &str) -> Duration {
        if command == "takeoff" {
            seconds(self.takeoff_settle)
        } else {
            seconds(self.command_settle)
        }
    }
}

/// A single drone, bound to the local interface that reaches it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneConfig {
    /// Sprite name this drone flies for
    pub name: String,

    /// Local address of the Wi-Fi interface connected to the drone
    pub pc_ip: IpAddr,
}

/// Network layout shared by every drone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Configured drones, in port-offset order
    pub drones: Vec<DroneConfig>,

    /// Address every Tello answers on
    pub tello_ip: IpAddr,

    /// Tello command port
    pub tello_port: u16,

    /// First local command port; drone `i` binds `pc_port_base + i`
    pub pc_port_base: u16,

    /// Port Tello telemetry is pushed to
    pub state_port: u16,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            drones: Vec::new(),
            tello_ip: IpAddr::V4(Ipv4Addr::new(192, 168, 10, 1)),
            tello_port: 8889,
            pc_port_base: 9000,
            state_port: 8890,
        }
    }
}

impl FleetConfig {
    /// Remote command address of every drone
    pub fn tello_addr(&self) -> SocketAddr {
        SocketAddr::new(self.tello_ip, self.tello_port)
    }

    /// Local command address for the drone at `index`
    pub fn local_addr(&self, index: usize) -> Option<SocketAddr> {
        let drone = self.drones.get(index)?;
        let offset = u16::try_from(index).ok()?;
        Some(SocketAddr::new(drone.pc_ip, self.pc_port_base.checked_add(offset)?))
    }

    /// Look up a drone by sprite name
    pub fn drone(&self, name: &str) -> Option<&DroneConfig> {
        self.drones.iter().find(|drone| drone.name == name)
    }
}

/// Convert fractional seconds into a [`Duration`], clamping invalid values to zero
pub fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Write configuration atomically
pub fn write_config(path: &Path, config: &ChoreoConfig) -> Result<()> {
    let json = serde_json::to_vec_pretty(config).context("Failed to serialize config")?;

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
    file.write_all(&json).context("Failed to write config")?;
    file.sync_all().context("Failed to sync config")?;
    drop(file);

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let dir = OpenOptions::new()
            .read(true)
            .open(parent)
            .with_context(|| format!("Failed to open directory: {:?}", parent))?;
        dir.sync_all().context("Failed to sync directory")?;
    }

    Ok(())
}

/// Load configuration
pub fn load_config(path: &Path) -> Result<ChoreoConfig> {
    let data = fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    let config: ChoreoConfig =
        serde_json::from_slice(&data).context("Failed to deserialize config")?;
    Ok(config)
}

/// Load configuration, falling back to defaults when the file does not exist
pub fn load_or_default(path: &Path) -> Result<ChoreoConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(ChoreoConfig::default())
    }
}
