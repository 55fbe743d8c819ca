//! Transactions and signed transactions.

use crate::{
    Address, ConsensusParams, CryptoError, Hash, KeyPair, Round, Signature, SpecialAddresses,
    TxnContext,
};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

/// Domain separator for transaction signatures.
const TXN_SIGN_DOMAIN: &[u8] = b"chainflow-txn-v1:";

/// Errors from transaction validation and verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxnError {
    #[error("fee {fee} below minimum {min}")]
    FeeBelowMinimum { fee: u64, min: u64 },

    #[error("note of {len} bytes exceeds limit of {max}")]
    NoteTooLarge { len: usize, max: usize },

    #[error("validity window [{first}, {last}] is inverted")]
    InvalidValidityWindow { first: Round, last: Round },

    #[error("validity window of {window} rounds exceeds maximum life of {max}")]
    ValidityWindowTooLong { window: u64, max: u64 },

    #[error("round {round} is before first valid round {first}")]
    NotYetValid { round: Round, first: Round },

    #[error("round {round} is past last valid round {last}")]
    Expired { round: Round, last: Round },

    #[error("genesis id {actual:?} does not match network {expected:?}")]
    GenesisIdMismatch { actual: String, expected: String },

    #[error("genesis hash does not match network")]
    GenesisHashMismatch,

    #[error("sender is a protocol special address")]
    SenderIsSpecialAddress,

    #[error(transparent)]
    Signature(#[from] CryptoError),
}

/// A payment transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sending account. Pays the fee and signs the transaction.
    pub sender: Address,

    /// Fee paid to the fee sink.
    pub fee: u64,

    /// First round in which this transaction is valid.
    pub first_valid: Round,

    /// Last round in which this transaction is valid.
    pub last_valid: Round,

    /// Genesis identifier of the network this transaction targets.
    /// Empty means "any network" (checked against the hash alone).
    pub genesis_id: String,

    /// Genesis hash of the network this transaction targets.
    pub genesis_hash: Hash,

    /// Free-form note.
    pub note: Vec<u8>,

    /// Receiving account.
    pub receiver: Address,

    /// Amount transferred.
    pub amount: u64,
}

impl Transaction {
    /// Canonical encoding of the transaction.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("transaction should be encodable")
    }

    /// Bytes covered by the transaction signature.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let encoded = self.encode();
        let mut bytes = Vec::with_capacity(TXN_SIGN_DOMAIN.len() + encoded.len());
        bytes.extend_from_slice(TXN_SIGN_DOMAIN);
        bytes.extend_from_slice(&encoded);
        bytes
    }

    /// Structural checks against the consensus parameters.
    pub fn well_formed(&self, params: &ConsensusParams) -> Result<(), TxnError> {
        if self.fee < params.min_txn_fee {
            return Err(TxnError::FeeBelowMinimum {
                fee: self.fee,
                min: params.min_txn_fee,
            });
        }
        if self.note.len() > params.max_note_bytes {
            return Err(TxnError::NoteTooLarge {
                len: self.note.len(),
                max: params.max_note_bytes,
            });
        }
        if self.last_valid < self.first_valid {
            return Err(TxnError::InvalidValidityWindow {
                first: self.first_valid,
                last: self.last_valid,
            });
        }
        let window = self.last_valid.0 - self.first_valid.0;
        if window > params.max_txn_life {
            return Err(TxnError::ValidityWindowTooLong {
                window,
                max: params.max_txn_life,
            });
        }
        Ok(())
    }

    /// Check that this transaction is alive in the given context: inside its
    /// validity window and addressed to this network.
    pub fn alive(&self, ctx: &TxnContext) -> Result<(), TxnError> {
        if ctx.round < self.first_valid {
            return Err(TxnError::NotYetValid {
                round: ctx.round,
                first: self.first_valid,
            });
        }
        if ctx.round > self.last_valid {
            return Err(TxnError::Expired {
                round: ctx.round,
                last: self.last_valid,
            });
        }
        if !self.genesis_id.is_empty() && self.genesis_id != ctx.genesis_id {
            return Err(TxnError::GenesisIdMismatch {
                actual: self.genesis_id.clone(),
                expected: ctx.genesis_id.clone(),
            });
        }
        if self.genesis_hash != ctx.genesis_hash {
            return Err(TxnError::GenesisHashMismatch);
        }
        Ok(())
    }
}

/// A transaction together with its sender's signature.
#[derive(Serialize, Deserialize)]
pub struct SignedTransaction {
    pub txn: Transaction,
    pub sig: Signature,

    /// Cached transaction id (computed on first access).
    /// Not serialized; recomputed on demand.
    #[serde(skip)]
    id: OnceLock<Hash>,
}

// Manual PartialEq - the id cache is derived state.
impl PartialEq for SignedTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.txn == other.txn && self.sig == other.sig
    }
}

impl Eq for SignedTransaction {}

// Manual Clone - OnceLock is cheap to recompute, don't clone the cache.
impl Clone for SignedTransaction {
    fn clone(&self) -> Self {
        Self {
            txn: self.txn.clone(),
            sig: self.sig.clone(),
            id: OnceLock::new(),
        }
    }
}

impl std::fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedTransaction")
            .field("id", &self.id())
            .field("txn", &self.txn)
            .finish_non_exhaustive()
    }
}

impl SignedTransaction {
    /// Wrap a transaction with an existing signature.
    pub fn new(txn: Transaction, sig: Signature) -> Self {
        Self {
            txn,
            sig,
            id: OnceLock::new(),
        }
    }

    /// Sign a transaction with the given keypair.
    pub fn sign(txn: Transaction, keys: &KeyPair) -> Self {
        let sig = keys.sign(&txn.signing_bytes());
        Self::new(txn, sig)
    }

    /// The transaction id (content hash of the canonical encoding).
    pub fn id(&self) -> Hash {
        *self.id.get_or_init(|| Hash::digest(&self.txn.encode()))
    }

    /// Verify this transaction against a context snapshot.
    ///
    /// Checks structure against `params`, rejects senders that collide with
    /// the protocol's special addresses, and verifies the ed25519 signature.
    /// The caller is responsible for having snapshotted `spec` and `params`
    /// from a single header; see `TxnContext` for the liveness half.
    pub fn verify(
        &self,
        spec: &SpecialAddresses,
        params: &ConsensusParams,
    ) -> Result<(), TxnError> {
        self.txn.well_formed(params)?;
        if self.txn.sender == spec.fee_sink || self.txn.sender == spec.rewards_pool {
            return Err(TxnError::SenderIsSpecialAddress);
        }
        self.txn
            .sender
            .public_key()
            .verify(&self.txn.signing_bytes(), &self.sig)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_keypair, test_transaction};
    use crate::{consensus_params, ProtocolVersion};

    fn params() -> ConsensusParams {
        consensus_params(&ProtocolVersion::current()).unwrap()
    }

    fn genesis_hash() -> Hash {
        Hash::digest(b"test-genesis")
    }

    fn context(round: u64) -> TxnContext {
        TxnContext {
            round: Round(round),
            params: params(),
            genesis_id: "testnet".to_string(),
            genesis_hash: genesis_hash(),
        }
    }

    fn signed(seed_sender: u8, seed_receiver: u8) -> SignedTransaction {
        let sender = test_keypair(seed_sender);
        let receiver = test_keypair(seed_receiver);
        let txn = test_transaction(&sender, &receiver, 1, 100, "testnet", genesis_hash());
        SignedTransaction::sign(txn, &sender)
    }

    #[test]
    fn sign_verify_round_trip() {
        let stx = signed(1, 2);
        assert_eq!(stx.verify(&SpecialAddresses::default(), &params()), Ok(()));
    }

    #[test]
    fn tampered_amount_fails_verification() {
        let mut stx = signed(1, 2);
        stx.txn.amount += 1;
        assert_eq!(
            stx.verify(&SpecialAddresses::default(), &params()),
            Err(TxnError::Signature(CryptoError::VerificationFailed))
        );
    }

    #[test]
    fn signature_from_wrong_key_fails() {
        let sender = test_keypair(1);
        let imposter = test_keypair(3);
        let txn = test_transaction(&sender, &test_keypair(2), 1, 100, "testnet", genesis_hash());
        let stx = SignedTransaction::sign(txn, &imposter);
        assert!(stx.verify(&SpecialAddresses::default(), &params()).is_err());
    }

    #[test]
    fn special_address_sender_rejected() {
        let stx = signed(1, 2);
        let spec = SpecialAddresses {
            fee_sink: stx.txn.sender,
            rewards_pool: Address::ZERO,
        };
        assert_eq!(
            stx.verify(&spec, &params()),
            Err(TxnError::SenderIsSpecialAddress)
        );
    }

    #[test]
    fn fee_below_minimum_rejected() {
        let mut stx = signed(1, 2);
        stx.txn.fee = 1;
        assert!(matches!(
            stx.verify(&SpecialAddresses::default(), &params()),
            Err(TxnError::FeeBelowMinimum { .. })
        ));
    }

    #[test]
    fn alive_respects_validity_window() {
        let stx = signed(1, 2);
        assert_eq!(stx.txn.alive(&context(50)), Ok(()));
        assert!(matches!(
            stx.txn.alive(&context(0)),
            Err(TxnError::NotYetValid { .. })
        ));
        assert!(matches!(
            stx.txn.alive(&context(101)),
            Err(TxnError::Expired { .. })
        ));
    }

    #[test]
    fn alive_checks_genesis() {
        let stx = signed(1, 2);
        let mut ctx = context(50);
        ctx.genesis_id = "othernet".to_string();
        assert!(matches!(
            stx.txn.alive(&ctx),
            Err(TxnError::GenesisIdMismatch { .. })
        ));

        let mut ctx = context(50);
        ctx.genesis_hash = Hash::digest(b"other-genesis");
        assert_eq!(stx.txn.alive(&ctx), Err(TxnError::GenesisHashMismatch));
    }

    #[test]
    fn id_is_stable_across_clone() {
        let stx = signed(1, 2);
        assert_eq!(stx.id(), stx.clone().id());
    }

    #[test]
    fn well_formed_rejects_inverted_window() {
        let mut stx = signed(1, 2);
        stx.txn.first_valid = Round(10);
        stx.txn.last_valid = Round(5);
        assert!(matches!(
            stx.txn.well_formed(&params()),
            Err(TxnError::InvalidValidityWindow { .. })
        ));
    }
}
