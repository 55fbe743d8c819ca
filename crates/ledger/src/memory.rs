//! In-memory ledger.

use crate::{Ledger, LedgerError};
use chainflow_types::{BlockHeader, Hash, Round, SignedTransaction};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

struct Inner {
    headers: BTreeMap<Round, BlockHeader>,
    committed: HashSet<Hash>,
}

/// A ledger backed by process memory.
///
/// Holds committed headers and the set of committed transaction ids. Used by
/// tests and single-process wiring; real deployments substitute a persistent
/// implementation behind the same [`Ledger`] trait.
pub struct InMemoryLedger {
    inner: RwLock<Inner>,
}

impl InMemoryLedger {
    /// Create a ledger seeded with a genesis header.
    pub fn new(genesis: BlockHeader) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(genesis.round, genesis);
        Self {
            inner: RwLock::new(Inner {
                headers,
                committed: HashSet::new(),
            }),
        }
    }

    /// Append a header. Rounds are expected to arrive in order; the header
    /// becomes the latest if its round is the highest seen.
    pub fn append(&self, header: BlockHeader) {
        let mut inner = self.inner.write();
        debug!(round = %header.round, "appending block header");
        inner.headers.insert(header.round, header);
    }

    /// Record a transaction as committed.
    pub fn mark_committed(&self, txn: &SignedTransaction) {
        self.inner.write().committed.insert(txn.id());
    }

    /// Number of committed transactions recorded.
    pub fn committed_count(&self) -> usize {
        self.inner.read().committed.len()
    }
}

impl Ledger for InMemoryLedger {
    fn latest(&self) -> Round {
        let inner = self.inner.read();
        inner
            .headers
            .keys()
            .next_back()
            .copied()
            .unwrap_or_default()
    }

    fn block_hdr(&self, round: Round) -> Result<BlockHeader, LedgerError> {
        self.inner
            .read()
            .headers
            .get(&round)
            .cloned()
            .ok_or(LedgerError::MissingHeader(round))
    }

    fn committed(&self, txn: &SignedTransaction) -> Result<bool, LedgerError> {
        Ok(self.inner.read().committed.contains(&txn.id()))
    }
}
