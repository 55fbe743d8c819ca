//! Ledger read contract.
//!
//! The transaction pipeline consults the ledger for three things: the latest
//! round, the header of a round (to snapshot consensus parameters and special
//! addresses), and whether a transaction has already been committed. This
//! crate defines that contract as the [`Ledger`] trait and provides
//! [`InMemoryLedger`], the implementation used by tests and local wiring.
//!
//! Blocking behaviour is the implementor's: the pipeline inherits whatever
//! latency a `Ledger` call has.

mod memory;

pub use memory::InMemoryLedger;

use chainflow_types::{BlockHeader, Round, SignedTransaction};
use thiserror::Error;

/// Errors from ledger queries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no block header for round {0}")]
    MissingHeader(Round),

    #[error("ledger query failed: {0}")]
    QueryFailed(String),
}

/// Read access to the committed chain.
pub trait Ledger: Send + Sync {
    /// The latest committed round.
    fn latest(&self) -> Round;

    /// The header of the block committed in `round`.
    fn block_hdr(&self, round: Round) -> Result<BlockHeader, LedgerError>;

    /// Whether `txn` has already been committed.
    fn committed(&self, txn: &SignedTransaction) -> Result<bool, LedgerError>;
}
