//! Command transport seam
//!
//! The runner talks to drones only through [`Transport`]. The UDP
//! implementation lives in [`super::tello`]; [`SimulatedTransport`] records
//! commands instead of sending them and backs dry runs and tests.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, join_all};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::error::{TransportError, TransportResult};

/// A command channel to one drone
pub trait Transport: Send + Sync {
    /// Drone name
    fn name(&self) -> &str;

    /// Send `command` and wait up to `timeout` for the drone's answer
    fn send<'a>(&'a self, command: &'a str, timeout: Duration) -> BoxFuture<'a, TransportResult<()>>;

    /// Release the channel; pending and later sends fail with `Cancelled`
    fn close(&self);
}

/// Judge a drone's reply: `ok` succeeds, and any reply to a landing command does
pub fn evaluate_response(command: &str, response: &str) -> TransportResult<()> {
    if response.contains("ok") || command.starts_with("land") {
        Ok(())
    } else {
        Err(TransportError::Rejected {
            command: command.to_string(),
            response: response.to_string(),
        })
    }
}

/// Drones by name
#[derive(Clone, Default)]
pub struct Fleet {
    drones: BTreeMap<String, Arc<dyn Transport>>,
}

impl fmt::Debug for Fleet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.drones.keys()).finish()
    }
}

impl Fleet {
    /// Empty fleet
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport under its own name, replacing any previous one
    pub fn insert(&mut self, transport: Arc<dyn Transport>) {
        self.drones.insert(transport.name().to_string(), transport);
    }

    /// Transport for a drone
    pub fn get(&self, name: &str) -> Option<Arc<dyn Transport>> {
        self.drones.get(name).cloned()
    }

    /// Drone names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.drones.keys().map(String::as_str)
    }

    /// Number of drones
    pub fn len(&self) -> usize {
        self.drones.len()
    }

    /// Whether the fleet has no drones
    pub fn is_empty(&self) -> bool {
        self.drones.is_empty()
    }

    /// The drones named in `names` that this fleet knows
    pub fn subset<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> Fleet {
        let drones = names
            .into_iter()
            .filter_map(|name| Some((name.to_string(), self.drones.get(name)?.clone())))
            .collect();
        Fleet { drones }
    }

    /// Send `command` to every drone concurrently and wait for all replies
    pub async fn broadcast(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Vec<(String, TransportResult<()>)> {
        let sends = self.drones.iter().map(|(name, transport)| async move {
            (name.clone(), transport.send(command, timeout).await)
        });
        join_all(sends).await
    }

    /// Close every transport
    pub fn close_all(&self) {
        for transport in self.drones.values() {
            transport.close();
        }
    }
}

/// A command observed by a [`SimulatedTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    /// Command text
    pub command: String,
    /// When the send was issued
    pub at: Instant,
}

/// In-memory transport that records commands and answers `ok`
#[derive(Debug)]
pub struct SimulatedTransport {
    name: String,
    latency: Duration,
    rejected: Vec<String>,
    sent: Mutex<Vec<SentCommand>>,
    closed: AtomicBool,
}

impl SimulatedTransport {
    /// Transport for `name` with instant replies
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latency: Duration::ZERO,
            rejected: Vec::new(),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Delay every reply by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answer `error` to commands starting with `prefix`
    pub fn rejecting(mut self, prefix: impl Into<String>) -> Self {
        self.rejected.push(prefix.into());
        self
    }

    /// Every command issued so far
    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().clone()
    }

    /// Command texts issued so far
    pub fn commands(&self) -> Vec<String> {
        self.sent.lock().iter().map(|sent| sent.command.clone()).collect()
    }

    /// Whether [`Transport::close`] was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for SimulatedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(&'a self, command: &'a str, timeout: Duration) -> BoxFuture<'a, TransportResult<()>> {
        self.sent.lock().push(SentCommand {
            command: command.to_string(),
            at: Instant::now(),
        });

        Box::pin(async move {
            if self.is_closed() {
                return Err(TransportError::Cancelled(command.to_string()));
            }
            if self.latency > timeout {
                tokio::time::sleep(timeout).await;
                return Err(TransportError::Timeout {
                    command: command.to_string(),
                });
            }
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let response = if self.rejected.iter().any(|prefix| command.starts_with(prefix)) {
                "error"
            } else {
                "ok"
            };
            evaluate_response(command, response)
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_evaluation() {
        assert!(evaluate_response("up 40", "ok").is_ok());
        assert!(evaluate_response("land", "error").is_ok());
        assert!(matches!(
            evaluate_response("flip l", "error No valid imu"),
            Err(TransportError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_broadcast_joins_every_drone() {
        let a = Arc::new(SimulatedTransport::new("A"));
        let b = Arc::new(SimulatedTransport::new("B").rejecting("takeoff"));
        let mut fleet = Fleet::new();
        fleet.insert(a.clone());
        fleet.insert(b.clone());

        let results = fleet.broadcast("takeoff", Duration::from_secs(1)).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert_eq!(a.commands(), vec!["takeoff"]);
        assert_eq!(b.commands(), vec!["takeoff"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_reply_times_out() {
        let slow = SimulatedTransport::new("A").with_latency(Duration::from_secs(10));
        let result = slow.send("cw 90", Duration::from_secs(7)).await;
        assert!(matches!(result, Err(TransportError::Timeout { .. })));
    }

    #[test]
    fn test_subset_ignores_unknown_names() {
        let mut fleet = Fleet::new();
        fleet.insert(Arc::new(SimulatedTransport::new("A")));
        fleet.insert(Arc::new(SimulatedTransport::new("B")));

        let subset = fleet.subset(["B", "Ghost"]);
        assert_eq!(subset.names().collect::<Vec<_>>(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_closed_transport_cancels() {
        let transport = SimulatedTransport::new("A");
        transport.close();
        let result = transport.send("up 20", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(TransportError::Cancelled(_))));
    }
}
