//! UDP transport for DJI Tello drones
//!
//! Each drone is reached through its own local interface: commands go out of
//! `pc_ip:pc_port_base + index` to the drone's fixed SDK address, and replies
//! come back on the same socket. A background task forwards every reply to
//! the sender waiting for it. Telemetry pushed to the state port is parsed
//! into [`Telemetry`] when a listener is started.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{TransportError, TransportResult};
use super::transport::{Fleet, Transport, evaluate_response};
use crate::config::FleetConfig;
use crate::log::ShowLog;

/// Telemetry older than this marks the drone as inactive
pub const TELEMETRY_STALE_AFTER: Duration = Duration::from_secs(3);

const RECV_BUFFER: usize = 1024;

/// Fields read from a Tello state packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telemetry {
    /// Battery percentage (`bat`)
    pub battery: i32,
    /// Height in cm (`h`)
    pub height: i32,
    /// Highest temperature in °C (`temph`)
    pub temperature: i32,
}

impl Telemetry {
    /// Parse `key:value;` pairs; every field must be present and numeric
    pub fn parse(raw: &str) -> Option<Self> {
        let mut battery = None;
        let mut height = None;
        let mut temperature = None;

        for pair in raw.trim().split(';') {
            let Some((key, value)) = pair.split_once(':') else {
                continue;
            };
            let slot = match key.trim() {
                "bat" => &mut battery,
                "h" => &mut height,
                "temph" => &mut temperature,
                _ => continue,
            };
            *slot = Some(value.trim().parse::<i32>().ok()?);
        }

        Some(Self {
            battery: battery?,
            height: height?,
            temperature: temperature?,
        })
    }
}

/// Latest telemetry and when it arrived
#[derive(Debug, Clone, Default)]
pub struct TelloState {
    latest: Option<(Telemetry, Instant)>,
}

impl TelloState {
    /// Record a raw state packet; malformed packets leave the state untouched
    pub fn apply(&mut self, raw: &str, now: Instant) -> bool {
        match Telemetry::parse(raw) {
            Some(telemetry) => {
                self.latest = Some((telemetry, now));
                true
            }
            None => false,
        }
    }

    /// Most recent telemetry, however old
    pub fn telemetry(&self) -> Option<Telemetry> {
        self.latest.map(|(telemetry, _)| telemetry)
    }

    /// Whether telemetry arrived within [`TELEMETRY_STALE_AFTER`] of `now`
    pub fn is_active(&self, now: Instant) -> bool {
        self.latest
            .is_some_and(|(_, at)| now.saturating_duration_since(at) <= TELEMETRY_STALE_AFTER)
    }
}

/// A Tello reached over UDP
pub struct TelloTransport {
    name: String,
    local: SocketAddr,
    remote: SocketAddr,
    socket: Arc<UdpSocket>,
    responses: tokio::sync::Mutex<UnboundedReceiver<String>>,
    state: Arc<Mutex<TelloState>>,
    shutdown: CancellationToken,
}

impl TelloTransport {
    /// Bind the local command socket and start the reply listener
    pub async fn bind(
        name: impl Into<String>,
        local: SocketAddr,
        remote: SocketAddr,
    ) -> TransportResult<Self> {
        let name = name.into();
        let socket = Arc::new(UdpSocket::bind(local).await?);
        let (sender, receiver) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        tokio::spawn(receive_responses(
            name.clone(),
            socket.clone(),
            sender,
            shutdown.clone(),
        ));
        tracing::debug!(drone = %name, %local, %remote, "command socket bound");

        Ok(Self {
            name,
            local,
            remote,
            socket,
            responses: tokio::sync::Mutex::new(receiver),
            state: Arc::new(Mutex::new(TelloState::default())),
            shutdown,
        })
    }

    /// Start receiving telemetry on `port` of this drone's local interface
    pub async fn listen_telemetry(&self, port: u16) -> TransportResult<()> {
        let socket = UdpSocket::bind(SocketAddr::new(self.local.ip(), port)).await?;
        tokio::spawn(receive_telemetry(
            socket,
            self.state.clone(),
            self.shutdown.clone(),
        ));
        Ok(())
    }

    /// Latest telemetry, if any arrived
    pub fn telemetry(&self) -> Option<Telemetry> {
        self.state.lock().telemetry()
    }

    /// Whether telemetry is fresh
    pub fn is_active(&self) -> bool {
        self.state.lock().is_active(Instant::now())
    }

    async fn exchange(&self, command: &str, timeout: Duration) -> TransportResult<()> {
        let mut responses = self.responses.lock().await;
        // Replies to earlier, timed-out commands must not answer this one.
        while responses.try_recv().is_ok() {}

        self.socket.send_to(command.as_bytes(), self.remote).await?;
        tracing::debug!(drone = %self.name, command, "sent");

        let response = tokio::select! {
            _ = self.shutdown.cancelled() => {
                return Err(TransportError::Cancelled(command.to_string()));
            }
            received = tokio::time::timeout(timeout, responses.recv()) => match received {
                Ok(Some(response)) => response,
                Ok(None) => return Err(TransportError::Cancelled(command.to_string())),
                Err(_) => {
                    return Err(TransportError::Timeout {
                        command: command.to_string(),
                    });
                }
            },
        };

        tracing::debug!(drone = %self.name, command, response = %response, "reply");
        evaluate_response(command, &response)
    }
}

impl Transport for TelloTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(&'a self, command: &'a str, timeout: Duration) -> BoxFuture<'a, TransportResult<()>> {
        Box::pin(async move {
            if self.shutdown.is_cancelled() {
                return Err(TransportError::Cancelled(command.to_string()));
            }
            self.exchange(command, timeout).await
        })
    }

    fn close(&self) {
        self.shutdown.cancel();
    }
}

async fn receive_responses(
    name: String,
    socket: Arc<UdpSocket>,
    responses: UnboundedSender<String>,
    shutdown: CancellationToken,
) {
    let mut buf = [0u8; RECV_BUFFER];
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, _)) => {
                    let text = String::from_utf8_lossy(&buf[..len]).trim().to_string();
                    if responses.send(text).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(drone = %name, error = %err, "reply listener stopped");
                    break;
                }
            },
        }
    }
}

async fn receive_telemetry(
    socket: UdpSocket,
    state: Arc<Mutex<TelloState>>,
    shutdown: CancellationToken,
) {
    let mut buf = [0u8; RECV_BUFFER];
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, _)) => {
                    let raw = String::from_utf8_lossy(&buf[..len]);
                    state.lock().apply(&raw, Instant::now());
                }
                Err(err) => {
                    tracing::warn!(error = %err, "telemetry listener stopped");
                    break;
                }
            },
        }
    }
}

/// Bind a transport for every configured drone
///
/// A drone whose telemetry port cannot be bound still flies; the failure is
/// logged.
pub async fn connect_fleet(config: &FleetConfig, log: &ShowLog) -> TransportResult<Fleet> {
    let mut fleet = Fleet::new();

    for (index, drone) in config.drones.iter().enumerate() {
        let local = config.local_addr(index).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no local port for drone {}", drone.name),
            )
        })?;

        let transport = TelloTransport::bind(drone.name.clone(), local, config.tello_addr()).await?;
        if let Err(err) = transport.listen_telemetry(config.state_port).await {
            log.warning(format!("[{}] telemetry unavailable: {}", drone.name, err));
        }
        log.info(format!("[{}] bound to {}", drone.name, local));
        fleet.insert(Arc::new(transport));
    }

    Ok(fleet)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKET: &str = "pitch:0;roll:0;yaw:0;vgx:0;vgy:0;vgz:0;templ:60;temph:63;tof:10;h:40;bat:87;baro:12.5;time:0;agx:0.00;agy:0.00;agz:0.00;\r\n";

    #[test]
    fn test_parse_state_packet() {
        let telemetry = Telemetry::parse(PACKET).unwrap();
        assert_eq!(telemetry.battery, 87);
        assert_eq!(telemetry.height, 40);
        assert_eq!(telemetry.temperature, 63);
    }

    #[test]
    fn test_partial_packet_is_rejected() {
        assert!(Telemetry::parse("bat:87;h:40;").is_none());
        assert!(Telemetry::parse("bat:x;h:40;temph:60;").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_goes_stale() {
        let mut state = TelloState::default();
        assert!(!state.is_active(Instant::now()));

        assert!(state.apply(PACKET, Instant::now()));
        assert!(state.is_active(Instant::now()));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!state.is_active(Instant::now()));
        assert_eq!(state.telemetry().map(|t| t.battery), Some(87));

        assert!(!state.apply("garbage", Instant::now()));
        assert!(!state.is_active(Instant::now()));
    }

    #[tokio::test]
    async fn test_udp_round_trip() {
        let drone = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let remote = drone.local_addr().unwrap();
        let transport = TelloTransport::bind("D1", "127.0.0.1:0".parse().unwrap(), remote)
            .await
            .unwrap();

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (len, from) = drone.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], b"command");
            drone.send_to(b"ok", from).await.unwrap();
        });

        transport.send("command", Duration::from_secs(2)).await.unwrap();
        responder.await.unwrap();

        transport.close();
        let after = transport.send("takeoff", Duration::from_secs(2)).await;
        assert!(matches!(after, Err(TransportError::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_unanswered_command_times_out() {
        let drone = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = TelloTransport::bind(
            "D1",
            "127.0.0.1:0".parse().unwrap(),
            drone.local_addr().unwrap(),
        )
        .await
        .unwrap();

        let result = transport.send("up 20", Duration::from_millis(50)).await;
        assert!(matches!(result, Err(TransportError::Timeout { .. })));
    }
}
