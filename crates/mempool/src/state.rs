//! Pool state.

use chainflow_types::{Hash, SignedTransaction};
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Default maximum number of pending transactions.
pub const DEFAULT_POOL_CAPACITY: usize = 50_000;

/// Errors from pool admission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("transaction {0} already in pool")]
    Duplicate(Hash),

    #[error("fee {fee} below pool minimum {min}")]
    FeeBelowMinimum { fee: u64, min: u64 },

    #[error("pool is full ({capacity} transactions)")]
    Full { capacity: usize },
}

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of pending transactions held.
    pub capacity: usize,

    /// Minimum fee the pool will accept.
    pub min_fee: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            min_fee: 1_000,
        }
    }
}

/// The pending transaction pool.
///
/// Access is a single mutex around a `HashMap`; the pipeline's backlog worker
/// is the dominant caller and contention is limited to ingress `test` calls.
pub struct TransactionPool {
    config: PoolConfig,
    pending: Mutex<HashMap<Hash, SignedTransaction>>,
}

impl TransactionPool {
    /// Create an empty pool.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Non-mutating admission check: would `remember` accept this
    /// transaction right now?
    pub fn test(&self, txn: &SignedTransaction) -> Result<(), PoolError> {
        let pending = self.pending.lock();
        self.admit(&pending, txn)
    }

    /// Insert a verified transaction.
    ///
    /// Re-runs the admission checks under the same lock as the insert, so a
    /// `test`/`remember` race cannot admit a duplicate.
    pub fn remember(&self, txn: SignedTransaction) -> Result<(), PoolError> {
        let mut pending = self.pending.lock();
        self.admit(&pending, &txn)?;
        let id = txn.id();
        pending.insert(id, txn);
        debug!(txid = %id, pool_size = pending.len(), "transaction added to pool");
        Ok(())
    }

    fn admit(
        &self,
        pending: &HashMap<Hash, SignedTransaction>,
        txn: &SignedTransaction,
    ) -> Result<(), PoolError> {
        let id = txn.id();
        if pending.contains_key(&id) {
            return Err(PoolError::Duplicate(id));
        }
        if txn.txn.fee < self.config.min_fee {
            return Err(PoolError::FeeBelowMinimum {
                fee: txn.txn.fee,
                min: self.config.min_fee,
            });
        }
        if pending.len() >= self.config.capacity {
            return Err(PoolError::Full {
                capacity: self.config.capacity,
            });
        }
        Ok(())
    }

    /// Whether the pool currently holds `id`.
    pub fn contains(&self, id: &Hash) -> bool {
        self.pending.lock().contains_key(id)
    }

    /// Number of pending transactions.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drop transactions that a committed block made redundant.
    pub fn on_block(&self, committed: &[Hash]) {
        let mut pending = self.pending.lock();
        for id in committed {
            pending.remove(id);
        }
    }
}
