//! Gossip network contract.
//!
//! The transport itself (peer discovery, connections, broadcast fan-out)
//! lives outside this repository. What the transaction pipeline needs from it
//! is small and is captured here:
//!
//! - [`GossipNetwork`]: register a handler for a [`Tag`], relay bytes to all
//!   peers except one, disconnect a peer
//! - [`MessageHandler`]: the inbound side. The network calls `handle` on its
//!   receive path, so implementations must never block
//! - the wire [`codec`]: `[version: u8][bincode payload]`

pub mod codec;
mod message;

pub use codec::{decode_transaction, encode_transaction, CodecError, WIRE_VERSION};
pub use message::{GossipNetwork, HandlerAction, IncomingMessage, MessageHandler, PeerId, Tag};
