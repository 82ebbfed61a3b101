//! Inbound connection listener.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::context::P2pContext;
use crate::manager::worker;
use crate::peer::{ConnectionDirection, Peer};

/// Pause after a failed accept, so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections until shutdown, one worker per socket.
pub async fn run_listener(listener: TcpListener, ctx: Arc<P2pContext>) {
    loop {
        let accepted = tokio::select! {
            _ = ctx.shutdown.cancelled() => {
                tracing::info!("Inbound listener shutting down");
                break;
            }
            accepted = listener.accept() => accepted,
        };

        let (stream, addr) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        match Peer::from_tcp(stream, ConnectionDirection::Inbound) {
            Ok(peer) => {
                tracing::debug!(addr = %addr, "Accepted inbound connection");
                tokio::spawn(worker::run_peer(ctx.clone(), Arc::new(peer)));
            }
            Err(e) => {
                tracing::warn!(addr = %addr, error = %e, "Dropping inbound connection");
            }
        }
    }
}
