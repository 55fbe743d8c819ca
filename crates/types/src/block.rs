//! Block headers and verification contexts.

use crate::{Address, ConsensusParams, Hash, ProtocolVersion, Round};
use serde::{Deserialize, Serialize};

/// The special accounts named by a block header.
///
/// Transactions from these accounts are synthesized by the protocol itself;
/// user transactions must not originate from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialAddresses {
    pub fee_sink: Address,
    pub rewards_pool: Address,
}

/// Header of a committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Round this block was committed in.
    pub round: Round,

    /// Consensus protocol in force for this block.
    pub protocol: ProtocolVersion,

    /// Fee sink account for this round.
    pub fee_sink: Address,

    /// Rewards pool account for this round.
    pub rewards_pool: Address,

    /// Block timestamp (milliseconds since epoch).
    pub timestamp: u64,
}

impl BlockHeader {
    /// The special addresses this header names.
    pub fn special_addresses(&self) -> SpecialAddresses {
        SpecialAddresses {
            fee_sink: self.fee_sink,
            rewards_pool: self.rewards_pool,
        }
    }
}

/// An explicit transaction-evaluation context.
///
/// Built at commit-check time from the latest header and the node's genesis
/// identity; pins the round and parameters a transaction is judged against so
/// that later round advancement cannot change the outcome of an in-flight
/// check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnContext {
    /// Round the transaction would be committed in (latest + 1).
    pub round: Round,

    /// Consensus parameters of the latest block's protocol.
    pub params: ConsensusParams,

    /// Genesis identifier of this network.
    pub genesis_id: String,

    /// Genesis hash of this network.
    pub genesis_hash: Hash,
}
