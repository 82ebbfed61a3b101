//! The version/verack exchange.
//!
//! State lives in each peer's [`PeerInfo`](crate::peer::PeerInfo); these
//! functions advance it in response to sends and receipts.

use tracing::debug;

use crate::context::P2pContext;
use crate::error::{P2pError, P2pResult};
use crate::peer::Peer;
use crate::protocol::{create_version_message, validate_version, Message, VersionMessage};

/// Send our version with a fresh nonce.
///
/// The nonce is recorded before the message leaves, so a connection back
/// to ourselves can be recognised when it arrives.
pub async fn send_version(ctx: &P2pContext, peer: &Peer) -> P2pResult<()> {
    let version = create_version_message(
        ctx.local_addr(),
        peer.addr(),
        rand::random(),
        &ctx.config.user_agent,
    );
    peer.info().record_local_version(version.clone())?;
    peer.send(Message::Version(version)).await
}

/// Handle the remote's version.
pub async fn on_version(ctx: &P2pContext, peer: &Peer, version: VersionMessage) -> P2pResult<()> {
    if ctx.registry.has_local_nonce(version.nonce) {
        peer.info().abort();
        peer.close();
        return Err(P2pError::ProtocolViolation(format!(
            "version nonce {} is one of ours (self or duplicate connection)",
            version.nonce
        )));
    }
    if let Err(e) = validate_version(&version) {
        peer.info().abort();
        return Err(e);
    }

    debug!(
        peer = %peer.addr(),
        version = version.protocol_version,
        user_agent = %version.user_agent,
        "received version"
    );
    peer.info().record_remote_version(version)?;

    if peer.local_nonce().is_none() {
        send_version(ctx, peer).await?;
    }
    peer.send(Message::VersionAck).await?;

    try_complete(ctx, peer).await
}

/// Handle a verack.
pub async fn on_verack(ctx: &P2pContext, peer: &Peer) -> P2pResult<()> {
    peer.info().record_verack();
    try_complete(ctx, peer).await
}

/// Complete the handshake once a verack and both versions are in hand.
async fn try_complete(ctx: &P2pContext, peer: &Peer) -> P2pResult<()> {
    let completed = {
        let mut info = peer.info();
        let ready = info.veracks_received() > 0
            && info.local_version().is_some()
            && info.remote_version().is_some();
        if ready {
            info.mark_handshake_complete()?
        } else {
            false
        }
    };
    if !completed {
        return Ok(());
    }

    debug!(peer = %peer.addr(), direction = %peer.direction(), "handshake complete");
    ctx.registry.notify_changed();

    if peer.is_outgoing() {
        peer.send(Message::GetAddr).await?;
    }
    Ok(())
}
