use super::*;

const DEFAULT_SUBMIT_PERMITS: usize = 5;
const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Validates submissions, keeps the books on them and gets block candidates to the daemon.
pub struct ShareManager {
    coin: CoinOptions,
    jobs: Arc<JobTracker>,
    daemon: Arc<dyn Daemon>,
    storage: Arc<dyn Storage>,
    events: Arc<EventBus>,
    pool_address: Option<String>,
    pool_account: Option<String>,
    submit_gate: Semaphore,
    submit_timeout: Duration,
}

impl ShareManager {
    pub fn new(
        coin: CoinOptions,
        jobs: Arc<JobTracker>,
        daemon: Arc<dyn Daemon>,
        storage: Arc<dyn Storage>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            coin,
            jobs,
            daemon,
            storage,
            events,
            pool_address: None,
            pool_account: None,
            submit_gate: Semaphore::new(DEFAULT_SUBMIT_PERMITS),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    pub fn with_pool_address(mut self, address: Option<String>) -> Self {
        self.pool_address = address;
        self
    }

    /// At most `permits` block submissions talk to the daemon at once, each bounded by
    /// `timeout`.
    pub fn with_submit_limits(mut self, permits: usize, timeout: Duration) -> Self {
        self.submit_gate = Semaphore::new(permits.max(1));
        self.submit_timeout = timeout;
        self
    }

    /// Looks up the wallet account holding the pool address, so that generation outputs
    /// reported by account also count as paying the pool. Daemons without accounts are fine.
    pub async fn resolve_pool_account(&mut self) {
        let Some(address) = &self.pool_address else {
            return;
        };

        match self.daemon.get_account(address).await {
            Ok(account) => {
                debug!("Pool address {address} belongs to account `{account}`");
                self.pool_account = Some(account);
            }
            Err(err) => warn!("Failed to look up account of pool address {address}: {err}"),
        }
    }

    pub fn pool_account(&self) -> Option<&str> {
        self.pool_account.as_deref()
    }

    /// Handles one `mining.submit`. The share event is published exactly once whatever the
    /// outcome, after any block submission has settled.
    pub async fn process_share(&self, session: &Arc<MinerSession>, submit: &Submit) -> Share {
        let received = Instant::now();
        let job = self.jobs.resolve(&submit.job_id);

        let mut share = Share::validate(session.snapshot(), job, submit, &self.coin, unix_now());

        match share.error {
            None => {
                session.record_valid();

                if let Err(err) = self.storage.add_share(&share).await {
                    warn!("Failed to store share of miner {}: {err:#}", session.id());
                }

                debug!(
                    "Share accepted at {:.2}/{} by miner {}",
                    share.difficulty(),
                    share.miner.difficulty,
                    share.miner.username
                );

                if share.is_block_candidate {
                    self.handle_candidate(&mut share).await;
                }
            }
            Some(error) => {
                session.record_invalid();

                debug!(
                    "Rejected share by miner {}, reason: {error}",
                    share.miner.username
                );
            }
        }

        self.events.publish(Event::ShareSubmitted {
            session: session.clone(),
            received,
        });

        share
    }

    async fn handle_candidate(&self, share: &mut Share) {
        let Some(found) = self.submit_block(share).await else {
            return;
        };

        info!(
            "Found block [{}] with hash [{}]",
            share.height, found.block.hash
        );

        let height = share.height;
        let hash = found.block.hash;

        share.set_found_block(found);

        self.events.publish(Event::BlockFound { height, hash });

        if let Err(err) = self.storage.add_block(share).await {
            warn!("Failed to store block {height}: {err:#}");
        }

        if let Err(err) = self.storage.move_current_shares(height).await {
            warn!("Failed to close round at block {height}: {err:#}");
        }
    }

    /// Submits a candidate and checks the daemon actually took it: the block must be known,
    /// not orphaned, carry this share's generation transaction first, and that transaction
    /// must pay the pool. Any failure along the way, including daemon errors and timeouts,
    /// means the block was not found.
    pub async fn submit_block(&self, share: &Share) -> Option<FoundBlock> {
        let block_hex = share.block_hex()?;
        let block_hash = share.block_hash?;

        let Ok(_permit) = self.submit_gate.acquire().await else {
            return None;
        };

        match timeout(
            self.submit_timeout,
            self.confirm_block(share, &block_hex, block_hash),
        )
        .await
        {
            Ok(Ok(found)) => found,
            Ok(Err(err)) => {
                warn!("Block submission at height {} failed: {err}", share.height);
                None
            }
            Err(_) => {
                warn!(
                    "Block submission at height {} timed out after {:?}",
                    share.height, self.submit_timeout
                );
                None
            }
        }
    }

    async fn confirm_block(
        &self,
        share: &Share,
        block_hex: &str,
        block_hash: BlockHash,
    ) -> Result<Option<FoundBlock>, RpcError> {
        let reply = if self.coin.submit_block_supported {
            self.daemon.submit_block(block_hex).await?
        } else {
            self.daemon.submit_block_via_template(block_hex).await?
        };

        if let Some(reason) = reply {
            debug!("Daemon answered block submission [{block_hash}] with `{reason}`");
        }

        let Some(block) = self.daemon.get_block(&block_hash).await? else {
            debug!("Submitted block [{block_hash}] cannot be found");
            return Ok(None);
        };

        if block.is_orphaned() {
            debug!("Submitted block [{block_hash}] is orphaned");
            return Ok(None);
        }

        let generation_txid = share.generation_txid();

        if block.generation_txid() != Some(generation_txid) {
            debug!(
                "Submitted block [{block_hash}] does not start with our generation transaction {generation_txid}"
            );
            return Ok(None);
        }

        let Some(generation) = self.daemon.get_transaction(&generation_txid).await? else {
            debug!("Generation transaction {generation_txid} cannot be found");
            return Ok(None);
        };

        let Some(pool_output) = generation
            .pool_output(self.pool_address.as_deref(), self.pool_account.as_deref())
            .cloned()
        else {
            debug!("Generation transaction {generation_txid} does not pay the pool");
            return Ok(None);
        };

        Ok(Some(FoundBlock {
            block,
            generation,
            pool_output,
        }))
    }
}
