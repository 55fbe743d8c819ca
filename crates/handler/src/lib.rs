//! Incoming transaction pipeline.
//!
//! This crate is the node's front door for signed transactions arriving from
//! the gossip network. It filters out duplicates and already-committed
//! transactions, verifies the remainder on a CPU-bound worker pool, inserts
//! valid transactions into the pending pool, and relays them onward:
//!
//! ```text
//! gossip receive
//!     └─ ingress filter ──► backlog queue ──► backlog worker ──► commit-check
//!                                                  ▲                  │
//!                                                  │                  ▼
//!                                  post-verification queue ◄── verification pool
//!                                                  │
//!                                                  └─► pool.remember ─► relay
//! ```
//!
//! Both queues are bounded and all producer sends are non-blocking: under
//! load the pipeline sheds work (and counts it) instead of propagating
//! pressure into the network's receive path. A single backlog worker owns
//! both queue consumers and drains verified work before admitting new
//! arrivals, which bounds the staleness of in-flight verifications.
//!
//! Locally-submitted transactions enter through [`SolicitedTxHandler`], which
//! runs the same predicate pipeline inline without touching the queues.

mod handler;
mod metrics;
mod worker;

pub use handler::{
    HandlerConfig, HandlerError, SolicitedTxHandler, TxHandler, TxHandlerBuilder, TX_BACKLOG_SIZE,
};
pub use metrics::HandlerMetrics;
