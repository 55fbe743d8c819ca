//! Pending transaction pool.
//!
//! The pool holds transactions that have been verified but not yet committed.
//! It exposes two predicates to the transaction pipeline:
//!
//! - [`TransactionPool::test`]: non-mutating admission check, used to reject
//!   work before spending CPU on signature verification
//! - [`TransactionPool::remember`]: the mutating insert, called only for
//!   transactions whose signatures have been verified
//!
//! Ordering, fee prioritisation, and eviction are out of scope here; block
//! assembly owns those concerns.

mod state;

pub use state::{PoolConfig, PoolError, TransactionPool};
