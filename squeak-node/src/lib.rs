//! Squeak protocol node library.
//!
//! This library provides the components for building and running a squeak
//! node. It is used by the `squeak-node` binary and can also be used for
//! testing and embedding.

pub mod cli;
pub mod config;
pub mod error;
pub mod node;
pub mod rpc;
pub mod shutdown;

pub use error::{NodeError, NodeResult};
pub use node::SqueakNode;
