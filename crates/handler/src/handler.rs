//! Transaction handler: construction, ingress, commit-check, solicited path.

use crate::metrics::HandlerMetrics;
use crate::worker::BacklogWorker;
use chainflow_ledger::Ledger;
use chainflow_mempool::TransactionPool;
use chainflow_network::{
    codec, GossipNetwork, HandlerAction, IncomingMessage, MessageHandler, Tag,
};
use chainflow_types::{
    consensus_params, ConsensusParams, Hash, SignedTransaction, SpecialAddresses, TxnContext,
    TxnError,
};
use chainflow_verify::{VerifyPool, VerifyPoolError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Capacity of the backlog and post-verification queues.
///
/// Configured to be higher than the number of CPU cores so the verification
/// pool can saturate, but bounded so memory pressure under a flood stays
/// predictable. Arrivals beyond this are dropped and counted.
pub const TX_BACKLOG_SIZE: usize = 1000;

/// Errors surfaced by the transaction handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The transaction failed signature verification. The only error a
    /// solicited caller sees; benign drops (duplicates, already committed,
    /// pool rejections) are not errors.
    #[error("invalid transaction")]
    InvalidTransaction,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("handler already started")]
    AlreadyStarted,

    #[error(transparent)]
    VerifyPool(#[from] VerifyPoolError),
}

/// Handler configuration.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Capacity of each of the two pipeline queues.
    pub backlog_size: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            backlog_size: TX_BACKLOG_SIZE,
        }
    }
}

impl HandlerConfig {
    fn validate(&self) -> Result<(), HandlerError> {
        if self.backlog_size == 0 {
            return Err(HandlerError::Config(
                "backlog_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One in-flight transaction and its verification context.
///
/// Created by the ingress filter, the context snapshot is filled in once by
/// the commit-check, the error slot once by the verification task. Ownership
/// moves along the queues; the item is never shared between two consumers.
pub(crate) struct TxBacklogMsg {
    /// The raw gossip message. Echoed back to the network on relay and
    /// disconnect, never interpreted. `None` on the solicited path.
    pub(crate) rawmsg: Option<IncomingMessage>,

    /// The decoded, not-yet-verified transaction.
    pub(crate) unverified_txn: SignedTransaction,

    /// Consensus parameters snapshotted at commit-check. Zeroed before that.
    pub(crate) params: ConsensusParams,

    /// Special addresses snapshotted at commit-check.
    pub(crate) spec: SpecialAddresses,

    /// Outcome of signature verification, filled in by the verification task.
    pub(crate) verification_err: Option<TxnError>,
}

impl TxBacklogMsg {
    fn from_gossip(rawmsg: IncomingMessage, unverified_txn: SignedTransaction) -> Self {
        Self {
            rawmsg: Some(rawmsg),
            unverified_txn,
            params: ConsensusParams::default(),
            spec: SpecialAddresses::default(),
            verification_err: None,
        }
    }

    fn solicited(unverified_txn: SignedTransaction) -> Self {
        Self {
            rawmsg: None,
            unverified_txn,
            params: ConsensusParams::default(),
            spec: SpecialAddresses::default(),
            verification_err: None,
        }
    }
}

/// State shared between the handler facade, the ingress filter, the backlog
/// worker, and in-flight verification tasks.
pub(crate) struct Inner {
    pub(crate) pool: Arc<TransactionPool>,
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) net: Arc<dyn GossipNetwork>,
    pub(crate) verify_pool: Arc<VerifyPool>,
    pub(crate) genesis_id: String,
    pub(crate) genesis_hash: Hash,
    pub(crate) postverify_tx: mpsc::Sender<TxBacklogMsg>,
    pub(crate) metrics: Arc<HandlerMetrics>,
}

impl Inner {
    /// Decide whether `msg` must be dropped without verification.
    ///
    /// Returns `true` when processing is done (drop the item). On `false` the
    /// item has been augmented with the context snapshot and is ready for
    /// signature verification.
    pub(crate) fn check_already_committed(&self, msg: &mut TxBacklogMsg) -> bool {
        let txid = msg.unverified_txn.id();
        debug!(%txid, "checking inbound transaction");

        // Quick admission test first: rejecting a duplicate here is much
        // cheaper than verifying its signature.
        if let Err(err) = self.pool.test(&msg.unverified_txn) {
            debug!(%txid, error = %err, "pool rejected transaction");
            return true;
        }

        // Snapshot the verification context from the latest header. The
        // snapshot pins the context for the rest of this item's life; the
        // verification task must not re-read the ledger.
        let latest = self.ledger.latest();
        let hdr = match self.ledger.block_hdr(latest) {
            Ok(hdr) => hdr,
            Err(err) => {
                warn!(round = %latest, error = %err, "could not get latest block header");
                return true;
            }
        };
        let params = match consensus_params(&hdr.protocol) {
            Some(params) => params,
            None => {
                warn!(round = %latest, protocol = %hdr.protocol, "unknown consensus protocol");
                return true;
            }
        };
        msg.spec = hdr.special_addresses();
        msg.params = params.clone();

        let ctx = TxnContext {
            round: latest.next(),
            params,
            genesis_id: self.genesis_id.clone(),
            genesis_hash: self.genesis_hash,
        };
        if let Err(err) = msg.unverified_txn.txn.alive(&ctx) {
            debug!(%txid, error = %err, "received a dead transaction");
            return true;
        }

        match self.ledger.committed(&msg.unverified_txn) {
            Ok(false) => false,
            Ok(true) => {
                debug!(%txid, "transaction already committed");
                true
            }
            Err(err) => {
                warn!(%txid, error = %err, "could not check committed status");
                true
            }
        }
    }

    /// Submit `msg` to the verification pool.
    ///
    /// The task verifies the signature against the context snapshotted at
    /// commit-check time and publishes the item onto the post-verification
    /// queue with a non-blocking send; if that queue is full the item is
    /// dropped and counted.
    pub(crate) fn dispatch_verification(self: &Arc<Self>, mut msg: TxBacklogMsg) {
        let inner = Arc::clone(self);
        self.verify_pool.spawn_backlog(move || {
            msg.verification_err = msg.unverified_txn.verify(&msg.spec, &msg.params).err();
            if inner.postverify_tx.try_send(msg).is_err() {
                inner.metrics.dropped_from_pool.inc();
            }
        });
    }

    /// Consume a post-verified item: disconnect the sender on a verification
    /// failure, otherwise remember and relay.
    pub(crate) fn process_post_verified(&self, msg: TxBacklogMsg) {
        let txid = msg.unverified_txn.id();

        if let Some(err) = &msg.verification_err {
            warn!(%txid, error = %err, "received a malformed transaction");
            if let Some(rawmsg) = &msg.rawmsg {
                self.net.disconnect(rawmsg.sender);
            }
            return;
        }

        self.metrics.handled.inc();

        // The signature checked out against the snapshot; from here on the
        // transaction is treated as verified.
        let verified_txn = msg.unverified_txn;
        if let Err(err) = self.pool.remember(verified_txn) {
            debug!(%txid, error = %err, "could not remember transaction");
            self.metrics.remember_failed.inc();
            return;
        }

        if let Some(rawmsg) = msg.rawmsg {
            self.net.relay(Tag::Transaction, rawmsg.data, rawmsg.sender);
        }
    }

    /// The solicited pipeline: same predicates and verification as the gossip
    /// path, run inline without the queues.
    pub(crate) async fn process_decoded(
        &self,
        unverified_txn: SignedTransaction,
    ) -> Result<(), HandlerError> {
        let mut msg = TxBacklogMsg::solicited(unverified_txn);
        if self.check_already_committed(&mut msg) {
            // Dropped, but not maliciously invalid.
            return Ok(());
        }

        let txn = msg.unverified_txn.clone();
        let spec = msg.spec.clone();
        let params = msg.params.clone();
        let verdict = self.verify_pool.run(move || txn.verify(&spec, &params)).await?;
        if let Err(err) = verdict {
            warn!(txid = %msg.unverified_txn.id(), error = %err, "received a malformed transaction");
            return Err(HandlerError::InvalidTransaction);
        }

        if let Err(err) = self.pool.remember(msg.unverified_txn) {
            debug!(error = %err, "could not remember transaction");
            self.metrics.remember_failed.inc();
        }
        Ok(())
    }
}

/// The gossip-facing ingress filter.
///
/// Runs on the network's receive fibres and never blocks: a full backlog
/// queue sheds the message rather than propagating pressure upstream.
struct IngressHandler {
    backlog_tx: mpsc::Sender<TxBacklogMsg>,
    metrics: Arc<HandlerMetrics>,
}

impl MessageHandler for IngressHandler {
    fn handle(&self, rawmsg: IncomingMessage) -> HandlerAction {
        let unverified_txn = match codec::decode_transaction(&rawmsg.data) {
            Ok(txn) => txn,
            Err(err) => {
                warn!(sender = %rawmsg.sender, error = %err, "received a non-decodable transaction");
                return HandlerAction::Disconnect;
            }
        };

        let msg = TxBacklogMsg::from_gossip(rawmsg, unverified_txn);
        if self.backlog_tx.try_send(msg).is_err() {
            // Queue full: the node is saturated. Shed the message; a rising
            // counter here suggests the backlog size needs revisiting.
            self.metrics.dropped_from_backlog.inc();
        }

        // The sender is not punished for our own backpressure.
        HandlerAction::Ignore
    }
}

/// Handle for submitting locally-solicited transactions.
///
/// Solicited callers own their rate-limiting and bypass the backlog: the
/// pipeline runs inline and the caller learns the outcome. The only error
/// returned is [`HandlerError::InvalidTransaction`].
#[derive(Clone)]
pub struct SolicitedTxHandler {
    inner: Arc<Inner>,
}

impl SolicitedTxHandler {
    /// Run the full predicate pipeline and verification for `txn`.
    pub async fn handle(&self, txn: SignedTransaction) -> Result<(), HandlerError> {
        self.inner.process_decoded(txn).await
    }
}

/// The incoming transaction handler.
///
/// Construct with [`TxHandler::builder`], which registers the gossip ingress
/// handler; [`start`](TxHandler::start) spawns the backlog worker and
/// [`stop`](TxHandler::stop) cancels it and waits for it to exit.
pub struct TxHandler {
    inner: Arc<Inner>,
    backlog_rx: Option<mpsc::Receiver<TxBacklogMsg>>,
    postverify_rx: Option<mpsc::Receiver<TxBacklogMsg>>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TxHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxHandler").finish_non_exhaustive()
    }
}

impl TxHandler {
    /// Start building a handler.
    pub fn builder() -> TxHandlerBuilder {
        TxHandlerBuilder::new()
    }

    /// Spawn the backlog worker. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<(), HandlerError> {
        let (backlog_rx, postverify_rx) = match (self.backlog_rx.take(), self.postverify_rx.take())
        {
            (Some(b), Some(p)) => (b, p),
            _ => return Err(HandlerError::AlreadyStarted),
        };
        let worker = BacklogWorker::new(
            Arc::clone(&self.inner),
            backlog_rx,
            postverify_rx,
            self.cancel.clone(),
        );
        self.worker = Some(tokio::spawn(worker.run()));
        Ok(())
    }

    /// Cancel the worker and wait for it to exit. Queued items are abandoned;
    /// no draining is attempted.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }

    /// A handle for locally-solicited transactions.
    pub fn solicited_tx_handler(&self) -> SolicitedTxHandler {
        SolicitedTxHandler {
            inner: Arc::clone(&self.inner),
        }
    }

    /// The pipeline's counters.
    pub fn metrics(&self) -> &HandlerMetrics {
        &self.inner.metrics
    }
}

/// Builder for [`TxHandler`].
///
/// The pool, ledger, network, verification pool, and genesis identity are
/// required; construction fails without them.
pub struct TxHandlerBuilder {
    pool: Option<Arc<TransactionPool>>,
    ledger: Option<Arc<dyn Ledger>>,
    network: Option<Arc<dyn GossipNetwork>>,
    verify_pool: Option<Arc<VerifyPool>>,
    genesis_id: Option<String>,
    genesis_hash: Option<Hash>,
    config: HandlerConfig,
    metrics: Option<Arc<HandlerMetrics>>,
}

impl Default for TxHandlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TxHandlerBuilder {
    pub fn new() -> Self {
        Self {
            pool: None,
            ledger: None,
            network: None,
            verify_pool: None,
            genesis_id: None,
            genesis_hash: None,
            config: HandlerConfig::default(),
            metrics: None,
        }
    }

    /// Set the pending transaction pool.
    pub fn pool(mut self, pool: Arc<TransactionPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Set the ledger.
    pub fn ledger(mut self, ledger: Arc<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Set the gossip network.
    pub fn network(mut self, network: Arc<dyn GossipNetwork>) -> Self {
        self.network = Some(network);
        self
    }

    /// Set the verification pool.
    pub fn verify_pool(mut self, verify_pool: Arc<VerifyPool>) -> Self {
        self.verify_pool = Some(verify_pool);
        self
    }

    /// Set the genesis identity transactions are checked against.
    pub fn genesis(mut self, genesis_id: impl Into<String>, genesis_hash: Hash) -> Self {
        self.genesis_id = Some(genesis_id.into());
        self.genesis_hash = Some(genesis_hash);
        self
    }

    /// Override the handler configuration.
    pub fn config(mut self, config: HandlerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a specific metrics instance instead of the process-wide one.
    pub fn metrics(mut self, metrics: Arc<HandlerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the handler and register its ingress filter with the network.
    pub fn build(self) -> Result<TxHandler, HandlerError> {
        let pool = self
            .pool
            .ok_or_else(|| HandlerError::Config("pool is required".into()))?;
        let ledger = self
            .ledger
            .ok_or_else(|| HandlerError::Config("ledger is required".into()))?;
        let network = self
            .network
            .ok_or_else(|| HandlerError::Config("network is required".into()))?;
        let verify_pool = self
            .verify_pool
            .ok_or_else(|| HandlerError::Config("verify_pool is required".into()))?;
        let genesis_id = self
            .genesis_id
            .ok_or_else(|| HandlerError::Config("genesis is required".into()))?;
        let genesis_hash = self
            .genesis_hash
            .ok_or_else(|| HandlerError::Config("genesis is required".into()))?;
        self.config.validate()?;

        let metrics = self.metrics.unwrap_or_else(HandlerMetrics::shared);
        let (backlog_tx, backlog_rx) = mpsc::channel(self.config.backlog_size);
        let (postverify_tx, postverify_rx) = mpsc::channel(self.config.backlog_size);

        let inner = Arc::new(Inner {
            pool,
            ledger,
            net: Arc::clone(&network),
            verify_pool,
            genesis_id,
            genesis_hash,
            postverify_tx,
            metrics: Arc::clone(&metrics),
        });

        network.register_handler(
            Tag::Transaction,
            Arc::new(IngressHandler {
                backlog_tx,
                metrics,
            }),
        );

        Ok(TxHandler {
            inner,
            backlog_rx: Some(backlog_rx),
            postverify_rx: Some(postverify_rx),
            cancel: CancellationToken::new(),
            worker: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainflow_ledger::InMemoryLedger;
    use chainflow_mempool::PoolConfig;
    use chainflow_types::test_utils::test_keypair;
    use chainflow_types::{BlockHeader, ProtocolVersion, Round};

    struct NullNetwork;

    impl GossipNetwork for NullNetwork {
        fn register_handler(&self, _tag: Tag, _handler: Arc<dyn MessageHandler>) {}
        fn relay(&self, _tag: Tag, _data: Vec<u8>, _except: chainflow_network::PeerId) {}
        fn disconnect(&self, _peer: chainflow_network::PeerId) {}
    }

    fn genesis_header() -> BlockHeader {
        BlockHeader {
            round: Round(1),
            protocol: ProtocolVersion::current(),
            fee_sink: test_keypair(200).address(),
            rewards_pool: test_keypair(201).address(),
            timestamp: 0,
        }
    }

    #[test]
    fn build_requires_every_collaborator() {
        let err = TxHandler::builder().build().unwrap_err();
        assert!(matches!(err, HandlerError::Config(_)));

        let err = TxHandler::builder()
            .pool(Arc::new(TransactionPool::new(PoolConfig::default())))
            .ledger(Arc::new(InMemoryLedger::new(genesis_header())))
            .network(Arc::new(NullNetwork))
            .build()
            .unwrap_err();
        assert!(matches!(err, HandlerError::Config(_)));
    }

    #[test]
    fn zero_backlog_size_rejected() {
        let err = TxHandler::builder()
            .pool(Arc::new(TransactionPool::new(PoolConfig::default())))
            .ledger(Arc::new(InMemoryLedger::new(genesis_header())))
            .network(Arc::new(NullNetwork))
            .verify_pool(Arc::new(
                VerifyPool::new(chainflow_verify::VerifyPoolConfig::minimal()).unwrap(),
            ))
            .genesis("testnet", Hash::digest(b"genesis"))
            .config(HandlerConfig { backlog_size: 0 })
            .build()
            .unwrap_err();
        assert!(matches!(err, HandlerError::Config(_)));
    }

    #[tokio::test]
    async fn double_start_is_an_error() {
        let mut handler = TxHandler::builder()
            .pool(Arc::new(TransactionPool::new(PoolConfig::default())))
            .ledger(Arc::new(InMemoryLedger::new(genesis_header())))
            .network(Arc::new(NullNetwork))
            .verify_pool(Arc::new(
                VerifyPool::new(chainflow_verify::VerifyPoolConfig::minimal()).unwrap(),
            ))
            .genesis("testnet", Hash::digest(b"genesis"))
            .metrics(Arc::new(HandlerMetrics::new()))
            .build()
            .unwrap();

        handler.start().unwrap();
        assert!(matches!(handler.start(), Err(HandlerError::AlreadyStarted)));
        handler.stop().await;
    }
}
