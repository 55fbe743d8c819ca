//! Shared fixtures for pipeline tests.

use chainflow_handler::{HandlerConfig, HandlerMetrics, TxHandler};
use chainflow_ledger::InMemoryLedger;
use chainflow_mempool::{PoolConfig, TransactionPool};
use chainflow_network::{
    encode_transaction, GossipNetwork, HandlerAction, IncomingMessage, MessageHandler, PeerId, Tag,
};
use chainflow_types::test_utils::{test_keypair, test_transaction};
use chainflow_types::{BlockHeader, Hash, ProtocolVersion, Round, SignedTransaction};
use chainflow_verify::{VerifyPool, VerifyPoolConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const GENESIS_ID: &str = "chainflow-testnet";

pub fn genesis_hash() -> Hash {
    Hash::digest(b"chainflow-testnet-genesis")
}

pub fn genesis_header() -> BlockHeader {
    BlockHeader {
        round: Round(1),
        protocol: ProtocolVersion::current(),
        fee_sink: test_keypair(250).address(),
        rewards_pool: test_keypair(251).address(),
        timestamp: 0,
    }
}

/// An in-process stand-in for the gossip transport. Records every relay and
/// disconnect the pipeline issues and lets tests deliver raw messages to the
/// registered handler the way the network's receive path would.
#[derive(Default)]
pub struct MockNetwork {
    handlers: Mutex<HashMap<Tag, Arc<dyn MessageHandler>>>,
    relays: Mutex<Vec<(Tag, Vec<u8>, PeerId)>>,
    disconnects: Mutex<Vec<PeerId>>,
}

impl MockNetwork {
    pub fn deliver(&self, sender: PeerId, data: Vec<u8>) -> HandlerAction {
        let handler = self
            .handlers
            .lock()
            .get(&Tag::Transaction)
            .cloned()
            .expect("transaction handler registered");
        handler.handle(IncomingMessage {
            sender,
            tag: Tag::Transaction,
            data,
        })
    }

    pub fn relays(&self) -> Vec<(Tag, Vec<u8>, PeerId)> {
        self.relays.lock().clone()
    }

    pub fn disconnects(&self) -> Vec<PeerId> {
        self.disconnects.lock().clone()
    }
}

impl GossipNetwork for MockNetwork {
    fn register_handler(&self, tag: Tag, handler: Arc<dyn MessageHandler>) {
        self.handlers.lock().insert(tag, handler);
    }

    fn relay(&self, tag: Tag, data: Vec<u8>, except: PeerId) {
        self.relays.lock().push((tag, data, except));
    }

    fn disconnect(&self, peer: PeerId) {
        self.disconnects.lock().push(peer);
    }
}

/// A fully-wired pipeline over in-memory collaborators.
pub struct TestEnv {
    pub pool: Arc<TransactionPool>,
    pub ledger: Arc<InMemoryLedger>,
    pub network: Arc<MockNetwork>,
    pub metrics: Arc<HandlerMetrics>,
    pub handler: TxHandler,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(HandlerConfig::default())
    }

    pub fn with_config(config: HandlerConfig) -> Self {
        let pool = Arc::new(TransactionPool::new(PoolConfig::default()));
        let ledger = Arc::new(InMemoryLedger::new(genesis_header()));
        let network = Arc::new(MockNetwork::default());
        let metrics = Arc::new(HandlerMetrics::new());
        let handler = TxHandler::builder()
            .pool(Arc::clone(&pool))
            .ledger(Arc::clone(&ledger) as Arc<dyn chainflow_ledger::Ledger>)
            .network(Arc::clone(&network) as Arc<dyn GossipNetwork>)
            .verify_pool(Arc::new(VerifyPool::new(VerifyPoolConfig::minimal()).unwrap()))
            .genesis(GENESIS_ID, genesis_hash())
            .config(config)
            .metrics(Arc::clone(&metrics))
            .build()
            .unwrap();
        Self {
            pool,
            ledger,
            network,
            metrics,
            handler,
        }
    }

    pub fn deliver(&self, peer: u64, data: Vec<u8>) -> HandlerAction {
        self.network.deliver(PeerId(peer), data)
    }
}

/// A signed payment unique to `(seed, amount)`.
pub fn signed_payment(seed: u8, amount: u64) -> SignedTransaction {
    let sender = test_keypair(seed);
    let mut txn = test_transaction(
        &sender,
        &test_keypair(seed.wrapping_add(1)),
        1,
        100,
        GENESIS_ID,
        genesis_hash(),
    );
    txn.amount = amount;
    SignedTransaction::sign(txn, &sender)
}

/// Wire-encode a signed transaction.
pub fn encoded(stx: &SignedTransaction) -> Vec<u8> {
    encode_transaction(stx).unwrap()
}

/// Poll `cond` until it holds or the deadline passes.
pub async fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
