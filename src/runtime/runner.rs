//! Show execution
//!
//! [`ShowRunner`] replays a [`Schedule`] against wall-clock time. It puts the
//! active drones into SDK mode and takes them off (both joined), then walks
//! the schedule's distinct offsets. Commands due at an offset are issued at
//! once and their replies awaited in the background, so a slow reply never
//! delays the next step. A `stop_all`
//! command or an external cancellation ends dispatch early. Landing always
//! runs, is joined, and is followed by closing every transport.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{RunnerError, RunnerResult};
use super::transport::{Fleet, Transport};
use crate::config::{RunnerConfig, seconds};
use crate::log::{ShowLog, ShowMessage};
use crate::schedule::{EventKind, LAND_COMMAND, Schedule};

/// Commands sent to every active drone before the schedule starts
pub const PREFLIGHT_COMMANDS: [&str; 2] = ["command", "takeoff"];

/// What happened during a show
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShowReport {
    /// Dispatch ended early (stop-all or external cancellation)
    pub cancelled: bool,
    /// Schedule commands handed to transports
    pub dispatched: usize,
    /// Drones that did not acknowledge a preflight command
    pub preflight_failures: Vec<String>,
    /// Drones that did not acknowledge landing
    pub landing_failures: Vec<String>,
}

/// Replays one schedule over a fleet
pub struct ShowRunner {
    fleet: Fleet,
    schedule: Schedule,
    config: RunnerConfig,
    log: ShowLog,
    cancel: CancellationToken,
}

impl ShowRunner {
    /// Create a runner
    pub fn new(fleet: Fleet, schedule: Schedule, config: RunnerConfig, log: ShowLog) -> Self {
        Self {
            fleet,
            schedule,
            config,
            log,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops dispatch when cancelled; landing still runs
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The schedule being replayed
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Drones that take part in the show
    ///
    /// Every drone in the fleet flies when the schedule can abort, so that the
    /// abort lands all of them; otherwise only the drones the schedule
    /// addresses.
    pub fn active_drones(&self) -> Vec<String> {
        if self.schedule.contains_stop_all() {
            return self.fleet.names().map(str::to_string).collect();
        }

        let mut active = Vec::new();
        for name in self.schedule.participants() {
            if self.fleet.get(name).is_some() {
                active.push(name.to_string());
            } else {
                self.log
                    .warning(format!("[{}] has no configured drone and is skipped", name));
            }
        }
        active
    }

    /// Put every drone into SDK mode; all must answer
    pub async fn connect(&self) -> RunnerResult<()> {
        self.log.info(format!("Connecting to {} drones", self.fleet.len()));
        let failed = self.preflight(&self.fleet, "command").await;

        if failed.is_empty() {
            self.log.success("All drones connected");
            self.log.signal(ShowMessage::ConnectionSucceeded);
            Ok(())
        } else {
            self.log.signal(ShowMessage::ConnectionFailed);
            Err(RunnerError::ConnectionFailed(failed))
        }
    }

    /// Fly the show
    pub async fn run(&self) -> RunnerResult<ShowReport> {
        let active = self.fleet.subset(self.active_drones().iter().map(String::as_str));
        if active.is_empty() {
            return Err(RunnerError::NoActiveDrones);
        }
        self.log.info(format!(
            "Starting show with {} ({:.1}s)",
            active.names().collect::<Vec<_>>().join(", "),
            self.schedule.total_time
        ));

        let mut report = ShowReport::default();
        for command in PREFLIGHT_COMMANDS {
            if self.cancel.is_cancelled() {
                break;
            }
            report.preflight_failures.extend(self.preflight(&active, command).await);
            self.pause(self.config.settle_after(command)).await;
        }

        if !self.cancel.is_cancelled() {
            let start = Instant::now();
            report.dispatched = self.run_schedule(&active, start).await;
            if !self.cancel.is_cancelled() {
                self.sleep_until(start + seconds(self.schedule.total_time))
                    .await;
            }
        }
        report.cancelled = self.cancel.is_cancelled();

        report.landing_failures = self.land_all(&active).await;
        self.log.signal(ShowMessage::ClearHighlight);
        self.log.signal(ShowMessage::ShowComplete);
        Ok(report)
    }

    /// Dispatch the schedule relative to `start`; returns the number of commands sent
    pub async fn run_schedule(&self, fleet: &Fleet, start: Instant) -> usize {
        let mut dispatched = 0;

        'offsets: for offset in self.schedule.offsets() {
            if !self.sleep_until(start + seconds(offset)).await {
                break;
            }
            self.log.signal(ShowMessage::Highlight { time: offset });

            for event in self.schedule.events_at(offset) {
                match &event.kind {
                    EventKind::Command { .. } if event.is_stop_all() => {
                        self.log
                            .warning(format!("Stop requested at {:.2}s; landing all drones", offset));
                        self.cancel.cancel();
                        break 'offsets;
                    }
                    EventKind::Command { command } => match fleet.get(&event.target) {
                        Some(transport) => {
                            self.spawn_send(transport, command.clone()).await;
                            dispatched += 1;
                        }
                        None => self.log.warning(format!(
                            "[{}] has no active drone; '{}' dropped",
                            event.target, command
                        )),
                    },
                    EventKind::Land { targets, .. } => {
                        for transport in targets.iter().filter_map(|name| fleet.get(name)) {
                            self.spawn_send(transport, LAND_COMMAND.to_string()).await;
                            dispatched += 1;
                        }
                    }
                    EventKind::Wait { text, .. } => {
                        self.log.info(format!("[{}] {}", event.target, text));
                    }
                    EventKind::Warning { text } => self.log.warning(text.clone()),
                    EventKind::Takeoff { text } => self.log.info(text.clone()),
                }
            }
        }

        dispatched
    }

    /// Land every drone in `fleet`, wait for the replies, and close the transports
    pub async fn land_all(&self, fleet: &Fleet) -> Vec<String> {
        self.log.info("Landing all drones");
        let mut failed = Vec::new();

        for (name, result) in fleet.broadcast(LAND_COMMAND, self.config.land_timeout()).await {
            match result {
                Ok(()) => self.log.success(format!("[{}] landed", name)),
                Err(err) => {
                    self.log.error(format!("[{}] landing failed: {}", name, err));
                    failed.push(name);
                }
            }
        }

        fleet.close_all();
        failed
    }

    async fn preflight(&self, fleet: &Fleet, command: &str) -> Vec<String> {
        let mut failed = Vec::new();
        for (name, result) in fleet.broadcast(command, self.config.command_timeout()).await {
            match result {
                Ok(()) => self.log.success(format!("[{}] {}", name, command)),
                Err(err) => {
                    self.log.error(format!("[{}] {}", name, err));
                    failed.push(name);
                }
            }
        }
        failed
    }

    /// Issue `command` now and leave the reply to a background task
    ///
    /// The send is polled once before spawning, so a stop that follows in the
    /// same step cannot recall it. The reply wait ends on timeout or when the
    /// transport is closed after landing.
    async fn spawn_send(&self, transport: Arc<dyn Transport>, command: String) {
        let log = self.log.clone();
        let timeout = self.config.command_timeout();

        let mut send = Box::pin(async move {
            let name = transport.name().to_string();
            match transport.send(&command, timeout).await {
                Ok(()) => log.success(format!("[{}] {}", name, command)),
                Err(err) => log.error(format!("[{}] {}", name, err)),
            }
        });
        if futures::poll!(send.as_mut()).is_pending() {
            tokio::spawn(send);
        }
    }

    /// Sleep until `deadline`; `false` if cancelled first
    async fn sleep_until(&self, deadline: Instant) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep_until(deadline) => true,
        }
    }

    async fn pause(&self, duration: std::time::Duration) {
        self.sleep_until(Instant::now() + duration).await;
    }
}
