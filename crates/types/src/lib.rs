//! Foundation types for chainflow.
//!
//! This crate provides the types shared by every other layer of the
//! transaction pipeline:
//!
//! - **Primitives**: [`Hash`], ed25519 keys and signatures, [`Address`]
//! - **Identifiers**: [`Round`], [`ProtocolVersion`]
//! - **Ledger types**: [`BlockHeader`], [`SpecialAddresses`], [`ConsensusParams`]
//! - **Transactions**: [`Transaction`], [`SignedTransaction`], [`TxnContext`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod block;
mod crypto;
mod hash;
mod identifiers;
mod params;
mod transaction;

pub use block::{BlockHeader, SpecialAddresses, TxnContext};
pub use crypto::{Address, CryptoError, KeyPair, PublicKey, Signature};
pub use hash::{Hash, HexError};
pub use identifiers::{ProtocolVersion, Round};
pub use params::{consensus_params, ConsensusParams, PROTOCOL_V1};
pub use transaction::{SignedTransaction, Transaction, TxnError};

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Create a deterministic keypair from a seed byte.
    pub fn test_keypair(seed: u8) -> KeyPair {
        KeyPair::from_seed([seed; 32])
    }

    /// Create a payment transaction between two seeded keypairs, valid in
    /// rounds `first..=last` against the given genesis.
    pub fn test_transaction(
        sender: &KeyPair,
        receiver: &KeyPair,
        first: u64,
        last: u64,
        genesis_id: &str,
        genesis_hash: Hash,
    ) -> Transaction {
        Transaction {
            sender: sender.address(),
            fee: 1_000,
            first_valid: Round(first),
            last_valid: Round(last),
            genesis_id: genesis_id.to_string(),
            genesis_hash,
            note: Vec::new(),
            receiver: receiver.address(),
            amount: 1,
        }
    }
}
