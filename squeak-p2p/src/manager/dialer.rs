//! Outbound connections.
//!
//! Every dial first reserves a slot in the registry, so connected peers plus
//! dials in flight stay within `max_peers`. The slot is released once the
//! peer is admitted or the attempt fails.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::context::P2pContext;
use crate::error::{P2pError, P2pResult};
use crate::manager::worker;
use crate::peer::{ConnectionDirection, Peer};

/// Dial `addr`, admit the connection and spawn its worker.
///
/// Fails if the address is already connected or being dialed, no slot is
/// free, or the connection cannot be opened within the connect timeout.
/// Nothing is retried.
pub async fn connect(ctx: Arc<P2pContext>, addr: SocketAddr) -> P2pResult<()> {
    reserve(&ctx, addr)?;
    dial_reserved(ctx, addr).await
}

/// Dial in the background. Failures are logged and dropped.
///
/// The slot is reserved before returning, so a caller dialing many
/// addresses stops getting `true` once the registry is full.
pub fn spawn_connect(ctx: Arc<P2pContext>, addr: SocketAddr) -> bool {
    if let Err(e) = reserve(&ctx, addr) {
        tracing::debug!(addr = %addr, error = %e, "Outbound connection skipped");
        return false;
    }
    tokio::spawn(async move {
        if let Err(e) = dial_reserved(ctx, addr).await {
            tracing::debug!(addr = %addr, error = %e, "Outbound connection failed");
        }
    });
    true
}

fn reserve(ctx: &P2pContext, addr: SocketAddr) -> P2pResult<()> {
    if ctx.shutdown.is_cancelled() {
        return Err(P2pError::Shutdown);
    }
    ctx.registry.reserve_dial(addr)
}

async fn dial_reserved(ctx: Arc<P2pContext>, addr: SocketAddr) -> P2pResult<()> {
    let result = dial(&ctx, addr).await;
    ctx.registry.release_dial(&addr);
    result
}

async fn dial(ctx: &Arc<P2pContext>, addr: SocketAddr) -> P2pResult<()> {
    tracing::debug!(addr = %addr, "Connecting to peer");
    let stream = match timeout(ctx.config.connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(P2pError::Io(e)),
        Err(_) => return Err(P2pError::ConnectionTimeout { addr }),
    };

    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
    }

    let peer = Arc::new(Peer::from_tcp(stream, ConnectionDirection::Outbound)?);
    if let Err(e) = ctx.registry.try_add(peer.clone()) {
        peer.close();
        peer.release().await;
        return Err(e);
    }

    tracing::debug!(addr = %addr, "TCP connection established, starting handshake");
    tokio::spawn(worker::run_admitted(ctx.clone(), peer));
    Ok(())
}
