//! Per-peer session state.
//!
//! [`PeerInfo`] is plain data. It holds handshake records, traffic
//! counters and timers, and evaluates the health predicates against a
//! caller-supplied `now`. The owning [`Peer`](super::Peer) guards it with
//! a mutex.

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{P2pError, P2pResult};
use crate::protocol::{HandshakeState, VersionMessage};

/// Direction of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionDirection {
    /// We initiated the connection.
    Outbound,
    /// Peer connected to us.
    Inbound,
}

impl fmt::Display for ConnectionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionDirection::Outbound => write!(f, "outbound"),
            ConnectionDirection::Inbound => write!(f, "inbound"),
        }
    }
}

/// An outstanding keepalive ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPing {
    pub nonce: u64,
    pub sent_at: Instant,
}

/// Mutable state of one connection.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    /// Socket address of the peer.
    pub addr: SocketAddr,
    /// Direction of the connection.
    pub direction: ConnectionDirection,
    /// When the connection was established.
    pub connected_at: Instant,
    /// Unix time of the connection, advertised in `addr` replies.
    pub connected_unix: u64,
    /// Last time we received a message from this peer.
    pub last_recv: Instant,
    /// Last time we sent a message to this peer.
    pub last_send: Instant,
    pub bytes_recv: u64,
    pub bytes_sent: u64,
    pub messages_recv: u64,
    pub messages_sent: u64,
    local_version: Option<VersionMessage>,
    remote_version: Option<VersionMessage>,
    veracks_received: u32,
    handshake_complete: bool,
    aborted: bool,
    pending_ping: Option<PendingPing>,
    last_ping_sent: Option<Instant>,
    last_pong_recv: Option<Instant>,
    ping_rtt: Option<Duration>,
}

impl PeerInfo {
    /// Create info for a new peer connection.
    pub fn new(addr: SocketAddr, direction: ConnectionDirection) -> Self {
        let now = Instant::now();
        let connected_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            addr,
            direction,
            connected_at: now,
            connected_unix,
            last_recv: now,
            last_send: now,
            bytes_recv: 0,
            bytes_sent: 0,
            messages_recv: 0,
            messages_sent: 0,
            local_version: None,
            remote_version: None,
            veracks_received: 0,
            handshake_complete: false,
            aborted: false,
            pending_ping: None,
            last_ping_sent: None,
            last_pong_recv: None,
            ping_rtt: None,
        }
    }

    /// Record that we received a message.
    pub fn record_recv(&mut self, bytes: u64) {
        self.last_recv = Instant::now();
        self.bytes_recv += bytes;
        self.messages_recv += 1;
    }

    /// Record that we sent a message.
    pub fn record_send(&mut self, bytes: u64) {
        self.last_send = Instant::now();
        self.bytes_sent += bytes;
        self.messages_sent += 1;
    }

    /// Check if this is an outbound connection.
    pub fn is_outbound(&self) -> bool {
        self.direction == ConnectionDirection::Outbound
    }

    // Handshake records

    /// Record the version we sent. Settable once.
    pub fn record_local_version(&mut self, version: VersionMessage) -> P2pResult<()> {
        if self.local_version.is_some() {
            return Err(P2pError::HandshakeFailed(
                "local version already recorded".to_string(),
            ));
        }
        self.local_version = Some(version);
        Ok(())
    }

    /// Record the version the peer sent. Settable once.
    pub fn record_remote_version(&mut self, version: VersionMessage) -> P2pResult<()> {
        if self.remote_version.is_some() {
            return Err(P2pError::HandshakeFailed(
                "remote version already recorded".to_string(),
            ));
        }
        self.remote_version = Some(version);
        Ok(())
    }

    /// Count a received verack.
    pub fn record_verack(&mut self) {
        self.veracks_received += 1;
    }

    pub fn local_version(&self) -> Option<&VersionMessage> {
        self.local_version.as_ref()
    }

    pub fn remote_version(&self) -> Option<&VersionMessage> {
        self.remote_version.as_ref()
    }

    pub fn veracks_received(&self) -> u32 {
        self.veracks_received
    }

    /// Mark the handshake complete.
    ///
    /// Fails unless both version records are present. Returns true only on
    /// the call that completed it.
    pub fn mark_handshake_complete(&mut self) -> P2pResult<bool> {
        if self.local_version.is_none() || self.remote_version.is_none() {
            return Err(P2pError::HandshakeFailed(
                "handshake completed without both versions".to_string(),
            ));
        }
        if self.handshake_complete {
            return Ok(false);
        }
        self.handshake_complete = true;
        Ok(true)
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.handshake_complete
    }

    /// Mark the handshake as rejected.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Current position in the handshake state machine.
    pub fn handshake_state(&self) -> HandshakeState {
        if self.aborted {
            HandshakeState::Aborted
        } else if self.handshake_complete {
            HandshakeState::Complete
        } else if self.veracks_received > 0 {
            HandshakeState::VerackExchanged
        } else if self.remote_version.is_some() {
            HandshakeState::RemoteVersionReceived
        } else if self.local_version.is_some() {
            HandshakeState::LocalVersionSent
        } else {
            HandshakeState::Start
        }
    }

    // Keepalive

    /// Record a ping sent at `now`, replacing any outstanding one.
    pub fn start_ping(&mut self, nonce: u64, now: Instant) {
        self.pending_ping = Some(PendingPing { nonce, sent_at: now });
        self.last_ping_sent = Some(now);
    }

    /// Match a pong against the outstanding ping.
    ///
    /// Returns true and clears the pending record if the nonce matches.
    pub fn receive_pong(&mut self, nonce: u64, now: Instant) -> bool {
        match self.pending_ping {
            Some(ping) if ping.nonce == nonce => {
                self.pending_ping = None;
                self.last_pong_recv = Some(now);
                self.ping_rtt = Some(now.saturating_duration_since(ping.sent_at));
                true
            }
            _ => false,
        }
    }

    pub fn pending_ping(&self) -> Option<PendingPing> {
        self.pending_ping
    }

    pub fn last_pong_recv(&self) -> Option<Instant> {
        self.last_pong_recv
    }

    pub fn ping_rtt(&self) -> Option<Duration> {
        self.ping_rtt
    }

    // Health predicates

    /// Handshake incomplete and the connection older than `timeout`.
    pub fn handshake_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        !self.handshake_complete && now.saturating_duration_since(self.connected_at) > timeout
    }

    /// Nothing received within `timeout`.
    pub fn inactive_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_recv) > timeout
    }

    /// An outstanding ping older than `timeout`.
    pub fn ping_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        self.pending_ping
            .map(|p| now.saturating_duration_since(p.sent_at) > timeout)
            .unwrap_or(false)
    }

    /// No ping sent within `interval`, or none ever sent.
    pub fn ping_due(&self, now: Instant, interval: Duration) -> bool {
        match self.last_ping_sent {
            None => true,
            Some(sent) => now.saturating_duration_since(sent) >= interval,
        }
    }

    /// Copy of the externally interesting fields.
    pub fn snapshot(&self) -> PeerSnapshot {
        PeerSnapshot {
            addr: self.addr,
            direction: self.direction,
            handshake_complete: self.handshake_complete,
            connected_unix: self.connected_unix,
            user_agent: self.remote_version.as_ref().map(|v| v.user_agent.clone()),
            protocol_version: self.remote_version.as_ref().map(|v| v.protocol_version),
            ping_rtt_ms: self.ping_rtt.map(|d| d.as_millis() as u64),
            bytes_recv: self.bytes_recv,
            bytes_sent: self.bytes_sent,
            messages_recv: self.messages_recv,
            messages_sent: self.messages_sent,
        }
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {:?})",
            self.addr,
            self.direction,
            self.handshake_state()
        )
    }
}

/// Point-in-time view of a peer, safe to hand out of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSnapshot {
    pub addr: SocketAddr,
    pub direction: ConnectionDirection,
    pub handshake_complete: bool,
    pub connected_unix: u64,
    pub user_agent: Option<String>,
    pub protocol_version: Option<u32>,
    pub ping_rtt_ms: Option<u64>,
    pub bytes_recv: u64,
    pub bytes_sent: u64,
    pub messages_recv: u64,
    pub messages_sent: u64,
}
