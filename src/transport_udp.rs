use crate::config::DetectorSettings;
use crate::perception::{ Acquisition, PerceptionSample, PerceptionSource };
use crate::robot::{ Actuator, HeadPose, PoseCommand, SpeechOutput };
use serde::{ Deserialize, Serialize };
use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{ debug, info, warn };

/// Largest perception datagram we accept
const MAX_DATAGRAM_SIZE: usize = 65535;

/// Detector peers remembered for the settings greeting. Past this the set
/// starts over and live peers are greeted again.
const MAX_DETECTOR_PEERS: usize = 16;

// ═══════════════════════════════════════════════════════════════════════
//  Perception input: JSON samples from the detector process
// ═══════════════════════════════════════════════════════════════════════

/// Sent once to every new detector peer so it runs with our settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PerceptionReply {
    DetectorSettings(DetectorSettings),
}

/// Receives [`PerceptionSample`] datagrams on a UDP port.
///
/// Each tick takes the newest sample queued on the socket and discards the
/// older ones, so a slow tick (a gesture, a head move) never leaves the
/// loop acting on stale frames.
pub struct UdpPerceptionSource {
    socket: UdpSocket,
    buf: Vec<u8>,
    timeout: Duration,
    settings: DetectorSettings,
    peers: HashSet<SocketAddr>,
}

impl UdpPerceptionSource {
    pub async fn bind(
        addr: &str,
        recv_buf_size: usize,
        timeout: Duration,
        settings: DetectorSettings
    ) -> anyhow::Result<Self> {
        let socket = bind_reuseport(addr, recv_buf_size).await?;
        let source = Self {
            socket,
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
            timeout,
            settings,
            peers: HashSet::new(),
        };
        info!(addr = %source.local_addr()?, "✅ perception port bound");
        Ok(source)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Read everything queued and keep the newest valid sample.
    fn drain(&mut self) -> Option<PerceptionSample> {
        let mut latest = None;
        loop {
            match self.socket.try_recv_from(&mut self.buf) {
                Ok((len, src)) => {
                    self.greet(src);
                    match PerceptionSample::from_json(&self.buf[..len]) {
                        Some(sample) => {
                            latest = Some(sample);
                        }
                        None => debug!(src = %src, len = len, "unparseable perception datagram"),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return latest;
                }
                Err(e) => {
                    warn!(error = %e, "UDP perception recv error");
                    return latest;
                }
            }
        }
    }

    fn greet(&mut self, peer: SocketAddr) {
        if self.peers.contains(&peer) {
            return;
        }
        if self.peers.len() >= MAX_DETECTOR_PEERS {
            debug!(known = self.peers.len(), "forgetting detector peers");
            self.peers.clear();
        }
        self.peers.insert(peer);

        let reply = PerceptionReply::DetectorSettings(self.settings);
        match serde_json::to_vec(&reply) {
            Ok(bytes) => {
                if let Err(e) = self.socket.try_send_to(&bytes, peer) {
                    warn!(peer = %peer, error = %e, "failed to send detector settings");
                } else {
                    info!(peer = %peer, settings = ?self.settings, "📷 new detector peer");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode detector settings"),
        }
    }
}

impl PerceptionSource for UdpPerceptionSource {
    async fn next_sample(&mut self) -> Acquisition {
        let deadline = Instant::now() + self.timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.socket.readable()).await {
                Err(_) => {
                    return Acquisition::Missing;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "UDP perception socket error");
                    return Acquisition::Missing;
                }
                Ok(Ok(())) => {}
            }
            if let Some(sample) = self.drain() {
                return Acquisition::Sample(sample);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Robot output: JSON commands to the robot bridge
// ═══════════════════════════════════════════════════════════════════════

/// Wire form of one robot command.
///
///   {"type":"goto","head":{"roll":0.0,"pitch":0.0,"yaw":19.2},"antennas":null,"duration_secs":0.5}
///   {"type":"play_sound","name":"curious_greeting.wav"}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RobotCommand {
    Goto {
        head: Option<HeadPose>,
        antennas: Option<[f32; 2]>,
        duration_secs: f64,
    },
    PlaySound {
        name: String,
    },
}

impl From<&PoseCommand> for RobotCommand {
    fn from(cmd: &PoseCommand) -> Self {
        RobotCommand::Goto {
            head: cmd.head,
            antennas: cmd.antennas,
            duration_secs: cmd.duration.as_secs_f64(),
        }
    }
}

/// Fire-and-forget command link to the robot bridge. Clones share the socket,
/// so one clone drives the head and another the speaker.
///
/// Sends go through a plain blocking socket: a datagram this small never
/// waits on the kernel, and the first command after `connect` goes out
/// without waiting for the reactor to report write readiness.
#[derive(Debug, Clone)]
pub struct UdpRobotLink {
    socket: Arc<std::net::UdpSocket>,
    peer: SocketAddr,
}

impl UdpRobotLink {
    pub async fn connect(addr: &str) -> anyhow::Result<Self> {
        let peer = tokio::net
            ::lookup_host(addr).await?
            .next()
            .ok_or_else(|| anyhow::anyhow!("robot address {addr} did not resolve"))?;
        let local = match peer {
            SocketAddr::V4(_) => "0.0.0.0:0",
            SocketAddr::V6(_) => "[::]:0",
        };
        let socket = std::net::UdpSocket::bind(local)?;
        info!(robot = %peer, "🤖 robot link ready");
        Ok(Self { socket: Arc::new(socket), peer })
    }

    fn send(&self, cmd: &RobotCommand) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(cmd)?;
        self.socket.send_to(&bytes, self.peer)?;
        Ok(())
    }
}

impl Actuator for UdpRobotLink {
    fn goto_pose(&mut self, cmd: &PoseCommand) -> anyhow::Result<()> {
        self.send(&RobotCommand::from(cmd))
    }
}

impl SpeechOutput for UdpRobotLink {
    fn play_sound(&mut self, name: &str) -> anyhow::Result<()> {
        self.send(&(RobotCommand::PlaySound { name: name.to_string() }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Socket helpers
// ═══════════════════════════════════════════════════════════════════════

async fn bind_reuseport(addr: &str, recv_buf_size: usize) -> anyhow::Result<UdpSocket> {
    let parsed: SocketAddr = addr.parse()?;

    let socket = socket2::Socket::new(
        match parsed {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP)
    )?;

    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.set_recv_buffer_size(recv_buf_size)?;
    socket.bind(&parsed.into())?;

    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}
