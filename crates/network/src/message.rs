//! Message types and the gossip seam.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Message tags. The tag selects the registered handler for an inbound
/// message and the topic for relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// Signed transaction gossip.
    Transaction,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Transaction => "txn",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque peer identity assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// A raw message delivered by the gossip layer.
///
/// `data` and `sender` are opaque to the pipeline: the payload is echoed back
/// on relay and the sender is echoed back on disconnect, neither is
/// interpreted.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub sender: PeerId,
    pub tag: Tag,
    pub data: Vec<u8>,
}

/// Verdict a handler returns to the network's receive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerAction {
    /// Nothing for the network to do.
    Ignore,

    /// Drop the connection to the sending peer.
    Disconnect,
}

/// Inbound message handler.
///
/// Called on the network's receive fibres; `handle` must not block, or it
/// stalls receipt of every other message from that peer.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, msg: IncomingMessage) -> HandlerAction;
}

/// The gossip network as seen by the transaction pipeline.
pub trait GossipNetwork: Send + Sync {
    /// Register the handler for a tag. Replaces any previous handler.
    fn register_handler(&self, tag: Tag, handler: Arc<dyn MessageHandler>);

    /// Forward `data` to all peers except `except` (the originator).
    fn relay(&self, tag: Tag, data: Vec<u8>, except: PeerId);

    /// Drop the connection to `peer`.
    fn disconnect(&self, peer: PeerId);
}
