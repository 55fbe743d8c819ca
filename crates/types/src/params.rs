//! Consensus parameters.

use crate::ProtocolVersion;
use serde::{Deserialize, Serialize};

/// Version string of the first chainflow consensus protocol.
pub const PROTOCOL_V1: &str = "chainflow-v1";

/// Consensus parameters in force for a protocol version.
///
/// The `Default` value is the zeroed placeholder a backlog item carries before
/// its commit-check snapshots the real parameters; it is never used to verify.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Minimum fee a transaction must pay.
    pub min_txn_fee: u64,

    /// Maximum length of a transaction's validity window, in rounds.
    pub max_txn_life: u64,

    /// Maximum size of a transaction note, in bytes.
    pub max_note_bytes: usize,
}

/// Look up the consensus parameters for a protocol version.
///
/// Returns `None` for versions this build does not know; callers treat that
/// the same as any other failed ledger lookup and drop the work.
pub fn consensus_params(proto: &ProtocolVersion) -> Option<ConsensusParams> {
    match proto.as_str() {
        PROTOCOL_V1 => Some(ConsensusParams {
            min_txn_fee: 1_000,
            max_txn_life: 1_000,
            max_note_bytes: 1_024,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_params_resolve() {
        let params = consensus_params(&ProtocolVersion::new(PROTOCOL_V1)).unwrap();
        assert!(params.min_txn_fee > 0);
        assert!(params.max_txn_life > 0);
    }

    #[test]
    fn unknown_version_has_no_params() {
        assert!(consensus_params(&ProtocolVersion::new("future-v9")).is_none());
    }
}
