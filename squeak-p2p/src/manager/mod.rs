//! Peer lifecycle.
//!
//! The listener accepts inbound sockets and the dialer opens outbound ones.
//! Either way the resulting [`Peer`](crate::peer::Peer) goes to a worker
//! task that owns it until teardown, and the [`ConnectionRegistry`] tracks
//! it meanwhile.

pub mod dialer;
pub mod listener;
pub mod registry;
pub mod worker;

pub use dialer::{connect, spawn_connect};
pub use listener::run_listener;
pub use registry::ConnectionRegistry;
pub use worker::{run_admitted, run_peer};
