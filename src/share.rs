use super::*;

/// Terminal classification of a submitted share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub(crate) enum Outcome {
    Stale,
    Invalid,
    Accepted,
    BlockFound,
    Duplicate,
    Rejected,
}

impl Outcome {
    /// The (height, header, nonce) triple was already on record.
    pub(crate) fn already_counted(self) -> bool {
        self == Self::Duplicate
    }

    pub(crate) fn counts_toward_hashrate(self) -> bool {
        matches!(self, Self::Accepted | Self::BlockFound)
    }

    /// Reply value for the miner.
    pub(crate) fn accepted(self) -> bool {
        self.counts_toward_hashrate()
    }
}

pub(crate) struct ShareProcessor {
    hasher: PowHasher,
    share_difficulty: u64,
    hashrate_expiration: Duration,
    node: Arc<dyn NodeRpc>,
    store: Arc<dyn ShareStore>,
    refresh: mpsc::Sender<()>,
}

impl ShareProcessor {
    pub(crate) fn new(
        hasher: PowHasher,
        share_difficulty: u64,
        hashrate_expiration: Duration,
        node: Arc<dyn NodeRpc>,
        store: Arc<dyn ShareStore>,
        refresh: mpsc::Sender<()>,
    ) -> Self {
        Self {
            hasher,
            share_difficulty,
            hashrate_expiration,
            node,
            store,
            refresh,
        }
    }

    /// Runs a submission through stale lookup, proof verification, and the
    /// share/block targets. Persistence failures never turn an accepted
    /// share into a rejection.
    pub(crate) async fn process(
        &self,
        login: &str,
        worker: &str,
        addr: SocketAddr,
        template: Option<Arc<BlockTemplate>>,
        params: &[String],
    ) -> Outcome {
        let expected = if self.hasher.requires_mix_digest() {
            3
        } else {
            2
        };

        if params.len() < expected {
            warn!("malformed submission from {login}@{addr}: {} params", params.len());
            return Outcome::Invalid;
        }

        let Some(template) = template else {
            info!("stale share from {login}@{addr}: no job published yet");
            return Outcome::Stale;
        };

        let header_hash = &params[1];

        let Some(job) = template.job(header_hash) else {
            info!("stale share from {login}@{addr}");
            return Outcome::Stale;
        };

        let Ok(nonce) = parse_hex_u64(&params[0]) else {
            warn!("malformed nonce from {login}@{addr}");
            return Outcome::Invalid;
        };

        let Ok(header) = parse_hash32(header_hash) else {
            warn!("malformed header hash from {login}@{addr}");
            return Outcome::Invalid;
        };

        let block_reached = if self.hasher.requires_mix_digest() {
            let Ok(mix_digest) = parse_hash32(&params[2]) else {
                warn!("malformed mix digest from {login}@{addr}");
                return Outcome::Invalid;
            };

            if !PowHasher::verify_mix(&header, nonce, &mix_digest, U256::from(self.share_difficulty))
            {
                warn!("invalid share from {login}@{addr}");
                return Outcome::Invalid;
            }

            PowHasher::verify_mix(&header, nonce, &mix_digest, job.difficulty)
        } else {
            let result = match self.hasher.pow_result(&header, nonce) {
                Ok(result) => result,
                Err(err) => {
                    error!("hashing failed for {login}@{addr}: {err}");
                    return Outcome::Invalid;
                }
            };

            if !reaches(result, target(U256::from(self.share_difficulty))) {
                warn!("invalid share from {login}@{addr}");
                return Outcome::Invalid;
            }

            reaches(result, target(job.difficulty))
        };

        if block_reached {
            self.submit_candidate(login, worker, addr, job, params).await
        } else {
            match self
                .store
                .write_share(
                    login,
                    worker,
                    params,
                    self.share_difficulty,
                    job.height,
                    self.hashrate_expiration,
                )
                .await
            {
                Ok(true) => {
                    info!("duplicate share from {login}@{addr}");
                    Outcome::Duplicate
                }
                Ok(false) => Outcome::Accepted,
                Err(err) => {
                    error!("failed to persist share: {err}");
                    Outcome::Accepted
                }
            }
        }
    }

    async fn submit_candidate(
        &self,
        login: &str,
        worker: &str,
        addr: SocketAddr,
        job: &JobDetails,
        params: &[String],
    ) -> Outcome {
        match self.node.submit_block(params).await {
            Ok(true) => {
                info!(
                    "block found by miner {login}@{addr} at height {}",
                    job.height
                );

                let _ = self.refresh.try_send(());

                match self
                    .store
                    .write_block(
                        login,
                        worker,
                        params,
                        self.share_difficulty,
                        job.difficulty,
                        job.height,
                        self.hashrate_expiration,
                    )
                    .await
                {
                    Ok(true) => Outcome::Duplicate,
                    Ok(false) => Outcome::BlockFound,
                    Err(err) => {
                        error!("failed to persist block candidate: {err}");
                        Outcome::BlockFound
                    }
                }
            }
            Ok(false) => {
                warn!("block rejected upstream for {login}@{addr} at height {}", job.height);
                Outcome::Rejected
            }
            Err(err) => {
                error!("block submission failed for {login}@{addr}: {err}");
                Outcome::Rejected
            }
        }
    }
}

pub(crate) fn parse_hash32(s: &str) -> Result<[u8; 32]> {
    let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);

    let bytes = hex::decode(stripped)?;

    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| anyhow!("expected 32 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockNode {
        submissions: AtomicU64,
        accept: bool,
        error: bool,
    }

    #[async_trait]
    impl NodeRpc for MockNode {
        async fn get_work(&self) -> Result<Work> {
            bail!("not used")
        }

        async fn submit_block(&self, _params: &[String]) -> Result<bool> {
            self.submissions.fetch_add(1, atomic::Ordering::SeqCst);

            if self.error {
                bail!("node unreachable");
            }

            Ok(self.accept)
        }
    }

    #[derive(Default)]
    struct MockStore {
        shares: AtomicU64,
        blocks: AtomicU64,
        block_expiry_secs: AtomicU64,
        exists: bool,
        error: bool,
    }

    #[async_trait]
    impl ShareStore for MockStore {
        async fn write_share(
            &self,
            _login: &str,
            _worker: &str,
            _params: &[String],
            _share_difficulty: u64,
            _height: u64,
            _expiry: Duration,
        ) -> Result<bool> {
            self.shares.fetch_add(1, atomic::Ordering::SeqCst);

            if self.error {
                bail!("database down");
            }

            Ok(self.exists)
        }

        async fn write_block(
            &self,
            _login: &str,
            _worker: &str,
            _params: &[String],
            _share_difficulty: u64,
            _block_difficulty: U256,
            _height: u64,
            expiry: Duration,
        ) -> Result<bool> {
            self.blocks.fetch_add(1, atomic::Ordering::SeqCst);
            self.block_expiry_secs
                .store(expiry.as_secs(), atomic::Ordering::SeqCst);

            if self.error {
                bail!("database down");
            }

            Ok(self.exists)
        }
    }

    const HEADER: &str = "0x00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

    fn template(block_difficulty: u64) -> Option<Arc<BlockTemplate>> {
        Some(Arc::new(
            BlockTemplate::next(template::tests::work(HEADER, 7, block_difficulty), None).unwrap(),
        ))
    }

    fn params() -> Vec<String> {
        vec!["0x1f".into(), HEADER.into()]
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:4444".parse().unwrap()
    }

    fn processor(
        result: U256,
        node: Arc<MockNode>,
        store: Arc<MockStore>,
    ) -> (ShareProcessor, mpsc::Receiver<()>) {
        let (refresh, refresh_rx) = mpsc::channel(1);

        (
            ShareProcessor::new(
                PowHasher::Fixed(result),
                2,
                Duration::from_secs(600),
                node,
                store,
                refresh,
            ),
            refresh_rx,
        )
    }

    async fn classify(
        result: U256,
        node: Arc<MockNode>,
        store: Arc<MockStore>,
        template: Option<Arc<BlockTemplate>>,
    ) -> Outcome {
        let (processor, _refresh_rx) = processor(result, node, store);

        processor
            .process("0xabc", "rig1", addr(), template, &params())
            .await
    }

    #[tokio::test]
    async fn missing_template_is_stale() {
        let node = Arc::new(MockNode::default());
        let store = Arc::new(MockStore::default());

        let outcome = classify(U256::zero(), node.clone(), store.clone(), None).await;

        assert_eq!(outcome, Outcome::Stale);
        assert_eq!(node.submissions.load(atomic::Ordering::SeqCst), 0);
        assert_eq!(store.shares.load(atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_header_is_stale() {
        let node = Arc::new(MockNode::default());
        let store = Arc::new(MockStore::default());

        let stale = Some(Arc::new(
            BlockTemplate::next(template::tests::work("0xother", 7, 1000), None).unwrap(),
        ));

        let outcome = classify(U256::zero(), node.clone(), store.clone(), stale).await;

        assert_eq!(outcome, Outcome::Stale);
        assert_eq!(store.shares.load(atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_nonce_is_invalid() {
        let node = Arc::new(MockNode::default());
        let store = Arc::new(MockStore::default());
        let (processor, _refresh_rx) = processor(U256::zero(), node, store.clone());

        let outcome = processor
            .process(
                "0xabc",
                "rig1",
                addr(),
                template(1000),
                &["0xzz".to_string(), HEADER.to_string()],
            )
            .await;

        assert_eq!(outcome, Outcome::Invalid);
        assert_eq!(store.shares.load(atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn result_above_share_target_is_invalid() {
        let node = Arc::new(MockNode::default());
        let store = Arc::new(MockStore::default());

        let outcome =
            classify(U256::MAX, node.clone(), store.clone(), template(u64::MAX)).await;

        assert_eq!(outcome, Outcome::Invalid);
        assert_eq!(node.submissions.load(atomic::Ordering::SeqCst), 0);
        assert_eq!(store.shares.load(atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn share_below_block_target_is_accepted() {
        let node = Arc::new(MockNode::default());
        let store = Arc::new(MockStore::default());

        let outcome = classify(
            U256::one() << 200,
            node.clone(),
            store.clone(),
            template(u64::MAX),
        )
        .await;

        assert_eq!(outcome, Outcome::Accepted);
        assert!(outcome.counts_toward_hashrate());
        assert!(!outcome.already_counted());
        assert_eq!(node.submissions.load(atomic::Ordering::SeqCst), 0);
        assert_eq!(store.shares.load(atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn known_share_is_a_duplicate() {
        let node = Arc::new(MockNode::default());
        let store = Arc::new(MockStore {
            exists: true,
            ..MockStore::default()
        });

        let outcome = classify(
            U256::one() << 200,
            node,
            store.clone(),
            template(u64::MAX),
        )
        .await;

        assert_eq!(outcome, Outcome::Duplicate);
        assert!(outcome.already_counted());
        assert!(!outcome.counts_toward_hashrate());
        assert!(!outcome.accepted());
    }

    #[tokio::test]
    async fn store_failure_still_accepts() {
        let node = Arc::new(MockNode::default());
        let store = Arc::new(MockStore {
            error: true,
            ..MockStore::default()
        });

        let outcome = classify(
            U256::one() << 200,
            node,
            store.clone(),
            template(u64::MAX),
        )
        .await;

        assert_eq!(outcome, Outcome::Accepted);
        assert_eq!(store.shares.load(atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn block_candidate_is_submitted_and_refreshes() {
        let node = Arc::new(MockNode {
            accept: true,
            ..MockNode::default()
        });
        let store = Arc::new(MockStore::default());
        let (processor, mut refresh_rx) = processor(U256::one(), node.clone(), store.clone());

        let outcome = processor
            .process("0xabc", "rig1", addr(), template(u64::MAX), &params())
            .await;

        assert_eq!(outcome, Outcome::BlockFound);
        assert!(outcome.accepted());
        assert_eq!(node.submissions.load(atomic::Ordering::SeqCst), 1);
        assert_eq!(store.blocks.load(atomic::Ordering::SeqCst), 1);
        assert_eq!(store.shares.load(atomic::Ordering::SeqCst), 0);
        assert_eq!(store.block_expiry_secs.load(atomic::Ordering::SeqCst), 600);
        assert!(refresh_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn accepted_block_with_store_failure_still_counts() {
        let node = Arc::new(MockNode {
            accept: true,
            ..MockNode::default()
        });
        let store = Arc::new(MockStore {
            error: true,
            ..MockStore::default()
        });

        let outcome = classify(U256::one(), node, store.clone(), template(u64::MAX)).await;

        assert_eq!(outcome, Outcome::BlockFound);
        assert_eq!(store.blocks.load(atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn node_rejection_is_rejected() {
        let node = Arc::new(MockNode::default());
        let store = Arc::new(MockStore::default());

        let outcome = classify(U256::one(), node.clone(), store.clone(), template(u64::MAX)).await;

        assert_eq!(outcome, Outcome::Rejected);
        assert_eq!(node.submissions.load(atomic::Ordering::SeqCst), 1);
        assert_eq!(store.blocks.load(atomic::Ordering::SeqCst), 0);
        assert!(!outcome.accepted());
    }

    #[tokio::test]
    async fn node_error_is_rejected() {
        let node = Arc::new(MockNode {
            error: true,
            ..MockNode::default()
        });
        let store = Arc::new(MockStore::default());

        let outcome = classify(U256::one(), node, store.clone(), template(u64::MAX)).await;

        assert_eq!(outcome, Outcome::Rejected);
        assert_eq!(store.blocks.load(atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn hash32_parsing() {
        assert!(parse_hash32(HEADER).is_ok());
        assert!(parse_hash32("0x1234").is_err());
        assert!(parse_hash32("nonsense").is_err());
    }
}
