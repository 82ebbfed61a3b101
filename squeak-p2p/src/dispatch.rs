//! Routing of received messages.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use squeak_core::Squeak;
use squeak_storage::StorageError;
use tracing::{debug, trace, warn};

use crate::context::P2pContext;
use crate::error::{P2pError, P2pResult};
use crate::handshake;
use crate::manager::dialer;
use crate::peer::Peer;
use crate::protocol::{
    AddrMessage, GetSqueaksMessage, InvMessage, InvVector, Message, PeerAddress, INV_SQUEAK,
};

/// Handle one message from `peer`.
///
/// Any error ends the peer's session. Version and verack go to the
/// handshake; everything else requires a completed handshake.
pub async fn handle_message(
    ctx: &Arc<P2pContext>,
    peer: &Arc<Peer>,
    message: Message,
) -> P2pResult<()> {
    trace!(peer = %peer.addr(), %message, "dispatch");

    match message {
        Message::Version(version) => handshake::on_version(ctx, peer, version).await,
        Message::VersionAck => handshake::on_verack(ctx, peer).await,
        message if !peer.is_handshake_complete() => Err(P2pError::ProtocolViolation(format!(
            "{} before handshake",
            message.command()
        ))),
        Message::Ping(nonce) => peer.send(Message::Pong(nonce)).await,
        Message::Pong(nonce) => {
            if !peer.info().receive_pong(nonce, Instant::now()) {
                trace!(peer = %peer.addr(), nonce, "unsolicited pong");
            }
            Ok(())
        }
        Message::Addr(addr) => {
            on_addr(ctx, addr);
            Ok(())
        }
        Message::GetAddr => on_getaddr(ctx, peer).await,
        Message::Inv(inv) => on_inv(ctx, peer, inv).await,
        Message::GetData(inv) => on_getdata(ctx, peer, inv).await,
        Message::GetSqueaks(request) => on_getsqueaks(ctx, peer, request).await,
        Message::Squeak(squeak) => on_squeak(ctx, peer, *squeak),
        Message::NotFound(_) => Ok(()),
        Message::Unknown { command } => {
            debug!(peer = %peer.addr(), %command, "ignoring unknown command");
            Ok(())
        }
    }
}

/// Dial advertised addresses while the registry wants more peers and has
/// free slots.
fn on_addr(ctx: &Arc<P2pContext>, msg: AddrMessage) {
    let local = ctx.local_addr();
    for PeerAddress { addr, .. } in msg.addresses {
        if !ctx.registry.needs_more_peers() || !ctx.registry.can_dial() {
            break;
        }
        if addr.ip().is_unspecified() || addr.port() == 0 || addr == local {
            continue;
        }
        if ctx.registry.has_address(&addr) {
            continue;
        }
        dialer::spawn_connect(ctx.clone(), addr);
    }
}

/// Reply with the addresses of our handshaked outgoing peers.
async fn on_getaddr(ctx: &P2pContext, peer: &Peer) -> P2pResult<()> {
    let addresses = ctx
        .registry
        .handshaked_peers()
        .into_iter()
        .filter(|p| p.is_outgoing())
        .map(|p| PeerAddress {
            addr: p.addr(),
            last_seen: p.info().connected_unix,
        })
        .collect();
    peer.send(Message::Addr(AddrMessage { addresses })).await
}

/// Request the announced squeaks we do not hold.
async fn on_inv(ctx: &P2pContext, peer: &Peer, inv: InvMessage) -> P2pResult<()> {
    let mut seen = HashSet::new();
    let mut missing = Vec::new();
    for item in inv.items {
        if item.kind != INV_SQUEAK || !seen.insert(item.hash) {
            continue;
        }
        if !ctx.squeaks.contains(&item.hash)? {
            missing.push(item);
        }
    }
    if missing.is_empty() {
        return Ok(());
    }
    trace!(peer = %peer.addr(), count = missing.len(), "requesting squeaks");
    peer.send(Message::GetData(InvMessage { items: missing })).await
}

/// Send each requested squeak we hold and notfound for the rest.
async fn on_getdata(ctx: &P2pContext, peer: &Peer, inv: InvMessage) -> P2pResult<()> {
    let mut not_found = Vec::new();
    for item in inv.items {
        let found = if item.kind == INV_SQUEAK {
            ctx.squeaks.get_squeak(&item.hash)?
        } else {
            None
        };
        match found {
            Some(squeak) => peer.send(Message::Squeak(Box::new(squeak))).await?,
            None => not_found.push(item),
        }
    }
    for chunk in InvMessage::chunked(&not_found) {
        peer.send(Message::NotFound(chunk)).await?;
    }
    Ok(())
}

/// Announce the stored squeaks matching the requested locator.
async fn on_getsqueaks(
    ctx: &P2pContext,
    peer: &Peer,
    request: GetSqueaksMessage,
) -> P2pResult<()> {
    let items: Vec<_> = ctx
        .squeaks
        .get_squeaks_by_locator(&request.locator)?
        .iter()
        .map(|s| InvVector::squeak(s.hash()))
        .collect();
    for chunk in InvMessage::chunked(&items) {
        peer.send(Message::Inv(chunk)).await?;
    }
    Ok(())
}

/// Store a received squeak. Invalid squeaks are dropped, not fatal.
fn on_squeak(ctx: &P2pContext, peer: &Peer, squeak: Squeak) -> P2pResult<()> {
    let hash = squeak.hash();
    match ctx.squeaks.add_squeak(squeak) {
        Ok(true) => {
            debug!(peer = %peer.addr(), hash = %hex::encode(hash), "stored squeak");
            ctx.notify_squeak(hash);
            Ok(())
        }
        Ok(false) => Ok(()),
        Err(StorageError::InvalidSqueak(e)) => {
            warn!(peer = %peer.addr(), error = %e, "rejected squeak");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use squeak_core::{Address, Locator, SqueakHash};
    use squeak_storage::{SqueakStore, StorageResult};

    use crate::peer::ConnectionDirection;
    use crate::protocol::InvVector;
    use crate::testing::{context, context_with_store, handshake, remote, squeak};

    const QUIET: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_message_before_handshake_is_violation() {
        let ctx = context();
        let (peer, _remote) = remote(ConnectionDirection::Inbound);

        let result = handle_message(&ctx, &peer, Message::Ping(1)).await;
        assert!(matches!(result, Err(P2pError::ProtocolViolation(_))));

        let unknown = Message::Unknown {
            command: "offer".to_string(),
        };
        let result = handle_message(&ctx, &peer, unknown).await;
        assert!(matches!(result, Err(P2pError::ProtocolViolation(_))));
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let ctx = context();
        let (peer, mut remote) = remote(ConnectionDirection::Inbound);
        handshake(&peer);

        handle_message(&ctx, &peer, Message::Ping(99)).await.unwrap();
        assert_eq!(remote.recv().await, Message::Pong(99));
    }

    #[tokio::test]
    async fn test_pong_clears_pending_ping() {
        let ctx = context();
        let (peer, _remote) = remote(ConnectionDirection::Outbound);
        handshake(&peer);
        peer.info().start_ping(5, Instant::now());

        handle_message(&ctx, &peer, Message::Pong(4)).await.unwrap();
        assert!(peer.info().pending_ping().is_some());

        handle_message(&ctx, &peer, Message::Pong(5)).await.unwrap();
        assert!(peer.info().pending_ping().is_none());
    }

    #[tokio::test]
    async fn test_unknown_ignored_after_handshake() {
        let ctx = context();
        let (peer, mut remote) = remote(ConnectionDirection::Inbound);
        handshake(&peer);

        let unknown = Message::Unknown {
            command: "buysqueak".to_string(),
        };
        handle_message(&ctx, &peer, unknown).await.unwrap();
        assert!(remote.try_recv(QUIET).await.is_none());
    }

    #[tokio::test]
    async fn test_inv_requests_missing_only() {
        let ctx = context();
        let held = squeak("held");
        let held_hash = held.hash();
        ctx.squeaks.add_squeak(held).unwrap();

        let (peer, mut remote) = remote(ConnectionDirection::Inbound);
        handshake(&peer);

        let missing = [9u8; 32];
        let inv = InvMessage {
            items: vec![
                InvVector::squeak(held_hash),
                InvVector::squeak(missing),
                InvVector::squeak(missing),
                InvVector { kind: 7, hash: [3u8; 32] },
            ],
        };
        handle_message(&ctx, &peer, Message::Inv(inv)).await.unwrap();

        assert_eq!(
            remote.recv().await,
            Message::GetData(InvMessage::squeaks([missing]))
        );
    }

    #[tokio::test]
    async fn test_inv_all_known_sends_nothing() {
        let ctx = context();
        let held = squeak("held");
        let hash = held.hash();
        ctx.squeaks.add_squeak(held).unwrap();

        let (peer, mut remote) = remote(ConnectionDirection::Inbound);
        handshake(&peer);

        handle_message(&ctx, &peer, Message::Inv(InvMessage::squeaks([hash])))
            .await
            .unwrap();
        assert!(remote.try_recv(QUIET).await.is_none());
    }

    #[tokio::test]
    async fn test_getdata_found_and_notfound() {
        let ctx = context();
        let held = squeak("hello");
        let hash = held.hash();
        ctx.squeaks.add_squeak(held.clone()).unwrap();

        let (peer, mut remote) = remote(ConnectionDirection::Inbound);
        handshake(&peer);

        let absent = [1u8; 32];
        let request = InvMessage::squeaks([hash, absent]);
        handle_message(&ctx, &peer, Message::GetData(request)).await.unwrap();

        assert_eq!(remote.recv().await, Message::Squeak(Box::new(held)));
        assert_eq!(
            remote.recv().await,
            Message::NotFound(InvMessage::squeaks([absent]))
        );
    }

    #[tokio::test]
    async fn test_getsqueaks_answers_with_inv() {
        let ctx = context();
        let s = squeak("followed");
        let hash = s.hash();
        let author = s.address();
        ctx.squeaks.add_squeak(s).unwrap();
        ctx.squeaks.add_squeak(squeak("someone else")).unwrap();

        let (peer, mut remote) = remote(ConnectionDirection::Inbound);
        handshake(&peer);

        let request = GetSqueaksMessage {
            locator: Locator::from_follows(&[author]),
        };
        handle_message(&ctx, &peer, Message::GetSqueaks(request))
            .await
            .unwrap();
        assert_eq!(remote.recv().await, Message::Inv(InvMessage::squeaks([hash])));
    }

    /// Store that answers every locator query with a fixed list.
    struct FixedMatches(Vec<Squeak>);

    impl SqueakStore for FixedMatches {
        fn get_hashes(&self) -> StorageResult<Vec<SqueakHash>> {
            Ok(self.0.iter().map(Squeak::hash).collect())
        }
        fn get_squeaks(&self) -> StorageResult<Vec<Squeak>> {
            Ok(self.0.clone())
        }
        fn get_squeak(&self, hash: &SqueakHash) -> StorageResult<Option<Squeak>> {
            Ok(self.0.iter().find(|s| &s.hash() == hash).cloned())
        }
        fn add_squeak(&self, _squeak: Squeak) -> StorageResult<bool> {
            Ok(false)
        }
        fn remove_squeak(&self, _hash: &SqueakHash) -> StorageResult<Option<Squeak>> {
            Ok(None)
        }
        fn get_squeaks_by_author(&self, _address: &Address) -> StorageResult<Vec<Squeak>> {
            Ok(self.0.clone())
        }
        fn get_squeaks_by_locator(&self, _locator: &Locator) -> StorageResult<Vec<Squeak>> {
            Ok(self.0.clone())
        }
    }

    fn inv_len(message: Message) -> usize {
        match message {
            Message::Inv(inv) | Message::NotFound(inv) => inv.items.len(),
            other => panic!("expected inventory, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_large_getsqueaks_reply_is_split() {
        let base = squeak("many");
        let author = base.address();
        let matches: Vec<_> = (0..InvMessage::MAX_ITEMS as u64 + 10)
            .map(|i| {
                let mut s = base.clone();
                s.timestamp = i;
                s
            })
            .collect();
        let ctx = context_with_store(Arc::new(FixedMatches(matches)));

        let (peer, mut remote) = remote(ConnectionDirection::Inbound);
        handshake(&peer);

        let request = GetSqueaksMessage {
            locator: Locator::from_follows(&[author]),
        };
        let task = {
            let peer = peer.clone();
            tokio::spawn(async move {
                handle_message(&ctx, &peer, Message::GetSqueaks(request)).await
            })
        };

        assert_eq!(inv_len(remote.recv().await), InvMessage::MAX_ITEMS);
        assert_eq!(inv_len(remote.recv().await), 10);
        task.await.unwrap().unwrap();
        assert!(!peer.is_closed());
    }

    #[tokio::test]
    async fn test_large_notfound_reply_is_split() {
        let ctx = context();
        let (peer, mut remote) = remote(ConnectionDirection::Inbound);
        handshake(&peer);

        let absent = (0..InvMessage::MAX_ITEMS as u32 + 1).map(|i| {
            let mut hash = [0u8; 32];
            hash[..4].copy_from_slice(&i.to_le_bytes());
            hash
        });
        let request = InvMessage::squeaks(absent);
        let task = {
            let peer = peer.clone();
            tokio::spawn(async move { handle_message(&ctx, &peer, Message::GetData(request)).await })
        };

        assert_eq!(inv_len(remote.recv().await), InvMessage::MAX_ITEMS);
        assert_eq!(inv_len(remote.recv().await), 1);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_getsqueaks_no_match_sends_nothing() {
        let ctx = context();
        ctx.squeaks.add_squeak(squeak("unrelated")).unwrap();

        let (peer, mut remote) = remote(ConnectionDirection::Inbound);
        handshake(&peer);

        let request = GetSqueaksMessage {
            locator: Locator::from_follows(&[squeak("x").address()]),
        };
        handle_message(&ctx, &peer, Message::GetSqueaks(request))
            .await
            .unwrap();
        assert!(remote.try_recv(QUIET).await.is_none());
    }

    #[tokio::test]
    async fn test_squeak_stored_and_announced() {
        let ctx = context();
        let mut events = ctx.subscribe_squeaks();
        let (peer, _remote) = remote(ConnectionDirection::Outbound);
        handshake(&peer);

        let s = squeak("incoming");
        let hash = s.hash();
        handle_message(&ctx, &peer, Message::Squeak(Box::new(s.clone())))
            .await
            .unwrap();
        assert!(ctx.squeaks.contains(&hash).unwrap());
        assert_eq!(events.recv().await.unwrap(), hash);

        // Idempotent upsert.
        handle_message(&ctx, &peer, Message::Squeak(Box::new(s)))
            .await
            .unwrap();
        assert_eq!(ctx.squeaks.get_hashes().unwrap(), vec![hash]);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalid_squeak_keeps_connection() {
        let ctx = context();
        let (peer, _remote) = remote(ConnectionDirection::Outbound);
        handshake(&peer);

        let mut forged = squeak("original");
        forged.content = b"tampered".to_vec();
        let hash = forged.hash();

        handle_message(&ctx, &peer, Message::Squeak(Box::new(forged)))
            .await
            .unwrap();
        assert!(!ctx.squeaks.contains(&hash).unwrap());
        assert!(!peer.is_closed());
    }

    #[tokio::test]
    async fn test_getaddr_lists_outgoing_handshaked() {
        let ctx = context();
        let (out_done, _r1) = remote(ConnectionDirection::Outbound);
        let (out_pending, _r2) = remote(ConnectionDirection::Outbound);
        let (inbound, _r3) = remote(ConnectionDirection::Inbound);
        handshake(&out_done);
        handshake(&inbound);
        for p in [&out_done, &out_pending, &inbound] {
            ctx.registry.try_add(p.clone()).unwrap();
        }

        let (asker, mut remote) = remote(ConnectionDirection::Inbound);
        handshake(&asker);
        handle_message(&ctx, &asker, Message::GetAddr).await.unwrap();

        match remote.recv().await {
            Message::Addr(addr) => {
                let addrs: Vec<_> = addr.addresses.iter().map(|a| a.addr).collect();
                assert_eq!(addrs, vec![out_done.addr()]);
            }
            other => panic!("expected addr, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_addr_dials_only_free_slots() {
        let ctx = context();
        let max = ctx.registry.max_peers();

        let mut listeners = Vec::new();
        for _ in 0..max + 6 {
            listeners.push(tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap());
        }
        let addresses = listeners
            .iter()
            .map(|l| PeerAddress {
                addr: l.local_addr().unwrap(),
                last_seen: 0,
            })
            .collect();

        let (peer, _remote) = remote(ConnectionDirection::Inbound);
        handshake(&peer);
        handle_message(&ctx, &peer, Message::Addr(AddrMessage { addresses }))
            .await
            .unwrap();
        assert!(ctx.registry.len() + ctx.registry.dialing_count() <= max);

        let mut dialed = 0;
        for listener in &listeners {
            if tokio::time::timeout(Duration::from_millis(300), listener.accept())
                .await
                .is_ok()
            {
                dialed += 1;
            }
        }
        assert_eq!(dialed, max);
    }

    #[tokio::test]
    async fn test_addr_skips_known_and_unroutable() {
        let ctx = context();
        let (known, _r) = remote(ConnectionDirection::Outbound);
        ctx.registry.try_add(known.clone()).unwrap();

        let (peer, _remote) = remote(ConnectionDirection::Inbound);
        handshake(&peer);

        let msg = AddrMessage {
            addresses: vec![
                PeerAddress { addr: known.addr(), last_seen: 0 },
                PeerAddress { addr: "0.0.0.0:8555".parse().unwrap(), last_seen: 0 },
                PeerAddress { addr: "127.0.0.1:0".parse().unwrap(), last_seen: 0 },
            ],
        };
        handle_message(&ctx, &peer, Message::Addr(msg)).await.unwrap();
        assert_eq!(ctx.registry.len(), 1);
    }
}
