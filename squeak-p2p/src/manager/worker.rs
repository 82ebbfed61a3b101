//! Per-peer worker: a receive loop and a health loop sharing one peer.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::context::P2pContext;
use crate::dispatch::handle_message;
use crate::error::{P2pError, P2pResult};
use crate::handshake;
use crate::peer::Peer;
use crate::protocol::Message;

/// Admit an accepted peer and serve it until it disconnects.
pub async fn run_peer(ctx: Arc<P2pContext>, peer: Arc<Peer>) {
    if let Err(e) = ctx.registry.try_add(peer.clone()) {
        tracing::debug!(peer = %peer.addr(), error = %e, "Rejected inbound peer");
        peer.close();
        peer.release().await;
        return;
    }
    run_admitted(ctx, peer).await
}

/// Serve a peer that is already in the registry.
pub async fn run_admitted(ctx: Arc<P2pContext>, peer: Arc<Peer>) {
    let result = serve(&ctx, &peer).await;
    teardown(&ctx, &peer, result).await;
}

async fn serve(ctx: &Arc<P2pContext>, peer: &Arc<Peer>) -> P2pResult<()> {
    if peer.is_outgoing() {
        handshake::send_version(ctx, peer).await?;
    }

    tokio::select! {
        result = receive_loop(ctx, peer) => result,
        result = health_loop(ctx, peer) => result,
        _ = ctx.shutdown.cancelled() => Err(P2pError::Shutdown),
    }
}

async fn receive_loop(ctx: &Arc<P2pContext>, peer: &Arc<Peer>) -> P2pResult<()> {
    loop {
        let message = peer.receive().await?;
        handle_message(ctx, peer, message).await?;
    }
}

async fn health_loop(ctx: &P2pContext, peer: &Peer) -> P2pResult<()> {
    let mut ticker = interval(ctx.config.health_check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = peer.stopped() => return Err(P2pError::closed_locally()),
            _ = ticker.tick() => {}
        }
        check_health(ctx, peer, Instant::now()).await?;
    }
}

/// Evaluate the health predicates at `now`.
///
/// Returns the timeout error for an unhealthy peer, and sends a keepalive
/// ping to a handshaked one that is due.
pub(crate) async fn check_health(ctx: &P2pContext, peer: &Peer, now: Instant) -> P2pResult<()> {
    let config = &ctx.config;
    let nonce = {
        let mut info = peer.info();
        if info.handshake_timed_out(now, config.handshake_timeout) {
            return Err(P2pError::HandshakeTimeout);
        }
        if info.inactive_timed_out(now, config.inactivity_timeout) {
            return Err(P2pError::InactivityTimeout);
        }
        if info.ping_timed_out(now, config.ping_timeout) {
            return Err(P2pError::PingTimeout);
        }
        if !info.is_handshake_complete() || !info.ping_due(now, config.ping_interval) {
            return Ok(());
        }
        let nonce = rand::random();
        info.start_ping(nonce, now);
        nonce
    };

    tracing::trace!(peer = %peer.addr(), nonce, "Sending ping");
    timeout(config.ping_timeout, peer.send(Message::Ping(nonce)))
        .await
        .map_err(|_| P2pError::PingTimeout)?
}

/// Close the peer and drop it from the registry, once.
async fn teardown(ctx: &P2pContext, peer: &Arc<Peer>, result: P2pResult<()>) {
    if !peer.mark_torn_down() {
        return;
    }
    peer.close();
    ctx.registry.remove(peer);
    peer.release().await;

    match result {
        Ok(()) | Err(P2pError::Shutdown) => {
            tracing::debug!(peer = %peer.addr(), "Peer stopped");
        }
        Err(e) => {
            tracing::debug!(peer = %peer.addr(), error = %e, "Peer disconnected");
        }
    }
}
