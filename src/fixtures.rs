use {
    super::*,
    crate::{job::JobConfig, session::MinerSnapshot, storage::Payment},
};

pub(crate) const CURTIME: u32 = 1_700_000_000;
pub(crate) const POOL_ADDRESS: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";

pub(crate) fn difficulty(value: f64) -> Difficulty {
    Difficulty::new(value).unwrap()
}

/// Network target of the test template, difficulty 2^20.
pub(crate) fn network_target() -> U256 {
    *DIFFICULTY_1_TARGET >> 20
}

pub(crate) fn template() -> BlockTemplate {
    BlockTemplate {
        bits: CompactTarget::from_consensus(0x1c0ffff0),
        previous_block_hash: BlockHash::from_byte_array([0xab; 32]),
        current_time: CURTIME,
        height: 100,
        version: 4,
        target: Some(network_target()),
        transactions: Vec::new(),
        default_witness_commitment: None,
        coinbaseaux: BTreeMap::new(),
        coinbase_value: Amount::from_sat(625_000_000),
        reserved: None,
    }
}

pub(crate) fn job_config() -> JobConfig {
    JobConfig {
        algorithm: Arc::new(Sha256d),
        coinbase_hasher: CoinbaseHasher::Double,
        pool_script: script_from_address(POOL_ADDRESS).unwrap(),
        pool_sig: Some("/shaft/".into()),
    }
}

pub(crate) fn job_with(
    template: BlockTemplate,
    configure: impl FnOnce(&mut JobConfig),
) -> Arc<Job> {
    let mut config = job_config();
    configure(&mut config);
    Arc::new(Job::new(JobId::new(1), Arc::new(template), &config).unwrap())
}

pub(crate) fn job_with_id(id: JobId, template: BlockTemplate) -> Arc<Job> {
    Arc::new(Job::new(id, Arc::new(template), &job_config()).unwrap())
}

/// A hash function that always yields the digest of `header_value`, so tests can place a
/// share exactly where they want relative to targets.
#[derive(Debug)]
pub(crate) struct FixedHash {
    digest: [u8; 32],
    multiplier: u64,
}

impl FixedHash {
    pub(crate) fn new(header_value: U256, multiplier: u64) -> Self {
        Self {
            digest: header_value.to_little_endian(),
            multiplier,
        }
    }
}

impl HashAlgorithm for FixedHash {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn hash(&self, _header: &[u8]) -> [u8; 32] {
        self.digest
    }

    fn multiplier(&self) -> u64 {
        self.multiplier
    }
}

pub(crate) fn fixed_job(header_value: U256) -> Arc<Job> {
    fixed_job_with(template(), header_value, 1)
}

pub(crate) fn fixed_job_with(
    template: BlockTemplate,
    header_value: U256,
    multiplier: u64,
) -> Arc<Job> {
    job_with(template, |config| {
        config.algorithm = Arc::new(FixedHash::new(header_value, multiplier))
    })
}

/// Header value of a share worth exactly `difficulty` when it is a power of two.
pub(crate) fn header_for(difficulty: u64) -> U256 {
    *DIFFICULTY_1_TARGET / U256::from(difficulty)
}

pub(crate) fn coin() -> CoinOptions {
    CoinOptions {
        extranonce2_size: 4,
        ..CoinOptions::default()
    }
}

pub(crate) fn miner(current: f64, previous: f64) -> MinerSnapshot {
    MinerSnapshot {
        id: 1,
        username: "alice".into(),
        extranonce1: Extranonce::from(0x0a0b0c0d),
        difficulty: difficulty(current),
        previous_difficulty: difficulty(previous),
    }
}

pub(crate) fn submit(job: &Job, extranonce2: &str, ntime: u32) -> Submit {
    Submit {
        username: "alice".into(),
        job_id: job.id().to_string(),
        ntime: Ntime::from(ntime).to_string(),
        extranonce2: extranonce2.into(),
        solution: String::new(),
    }
}

/// A valid, non-candidate share at difficulty 1024.
pub(crate) fn valid_share() -> Share {
    let job = fixed_job(header_for(1024));
    let share = Share::validate(
        miner(1024.0, 1024.0),
        Some(job.clone()),
        &submit(&job, "00000001", CURTIME),
        &coin(),
        u64::from(CURTIME),
    );
    assert!(share.is_valid(), "{:?}", share.error);
    share
}

pub(crate) fn session(start: f64) -> (Arc<MinerSession>, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = MinerSession::new(
        1,
        "127.0.0.1:4000".parse().unwrap(),
        Extranonce::from(0x0a0b0c0d),
        difficulty(start),
        tx,
    );
    (Arc::new(session), rx)
}

pub(crate) fn authorized_session(
    start: f64,
) -> (Arc<MinerSession>, mpsc::UnboundedReceiver<Message>) {
    let (session, rx) = session(start);
    session.subscribe(Some("cgminer/4.10.0"));
    session.authenticate("alice");
    (session, rx)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DaemonCall {
    GetBlockTemplate,
    SubmitBlock(String),
    SubmitBlockViaTemplate(String),
    GetBlock(BlockHash),
    GetTransaction(Txid),
    GetAccount(String),
    ValidateAddress(String),
}

/// Scripted daemon. Unset replies behave like a daemon that knows nothing.
#[derive(Default)]
pub(crate) struct MockDaemon {
    pub(crate) calls: Mutex<Vec<DaemonCall>>,
    pub(crate) template: Mutex<Option<BlockTemplate>>,
    pub(crate) block: Mutex<Option<BlockInfo>>,
    pub(crate) transaction: Mutex<Option<TransactionInfo>>,
    pub(crate) account: Mutex<Option<String>>,
    pub(crate) valid_addresses: Mutex<Vec<String>>,
    pub(crate) fail_submit: Mutex<bool>,
    pub(crate) submit_delay: Mutex<Option<Duration>>,
}

impl MockDaemon {
    fn record(&self, call: DaemonCall) {
        self.calls.lock().push(call);
    }

    pub(crate) fn calls(&self) -> Vec<DaemonCall> {
        self.calls.lock().clone()
    }

    async fn submit(&self) -> Result<Option<String>, RpcError> {
        let delay = *self.submit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_submit.lock() {
            Err(RpcError::Rpc {
                code: -1,
                message: "submission failed".into(),
            })
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl Daemon for MockDaemon {
    async fn get_block_template(&self) -> Result<BlockTemplate, RpcError> {
        self.record(DaemonCall::GetBlockTemplate);
        self.template.lock().clone().ok_or(RpcError::Rpc {
            code: -10,
            message: "no template".into(),
        })
    }

    async fn submit_block(&self, block_hex: &str) -> Result<Option<String>, RpcError> {
        self.record(DaemonCall::SubmitBlock(block_hex.into()));
        self.submit().await
    }

    async fn submit_block_via_template(
        &self,
        block_hex: &str,
    ) -> Result<Option<String>, RpcError> {
        self.record(DaemonCall::SubmitBlockViaTemplate(block_hex.into()));
        self.submit().await
    }

    async fn get_block(&self, hash: &BlockHash) -> Result<Option<BlockInfo>, RpcError> {
        self.record(DaemonCall::GetBlock(*hash));
        Ok(self.block.lock().clone())
    }

    async fn get_transaction(&self, txid: &Txid) -> Result<Option<TransactionInfo>, RpcError> {
        self.record(DaemonCall::GetTransaction(*txid));
        Ok(self.transaction.lock().clone())
    }

    async fn get_account(&self, address: &str) -> Result<String, RpcError> {
        self.record(DaemonCall::GetAccount(address.into()));
        self.account.lock().clone().ok_or(RpcError::Rpc {
            code: -32601,
            message: "Method not found".into(),
        })
    }

    async fn validate_address(&self, address: &str) -> Result<bool, RpcError> {
        self.record(DaemonCall::ValidateAddress(address.into()));
        Ok(self.valid_addresses.lock().iter().any(|valid| valid == address))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StorageCall {
    AddShare(String),
    AddBlock(u64),
    UpdateDifficulty(Difficulty),
    MoveCurrentShares(u64),
    AddTransaction(u64),
    UpdatePayment(u64),
}

#[derive(Default)]
pub(crate) struct MemoryStorage {
    pub(crate) calls: Mutex<Vec<StorageCall>>,
}

impl MemoryStorage {
    pub(crate) fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn add_share(&self, share: &Share) -> Result {
        self.calls
            .lock()
            .push(StorageCall::AddShare(share.miner.username.clone()));
        Ok(())
    }

    async fn add_block(&self, share: &Share) -> Result {
        self.calls.lock().push(StorageCall::AddBlock(share.height));
        Ok(())
    }

    async fn update_difficulty(&self, miner: &MinerSession) -> Result {
        self.calls
            .lock()
            .push(StorageCall::UpdateDifficulty(miner.difficulty()));
        Ok(())
    }

    async fn move_current_shares(&self, height: u64) -> Result {
        self.calls
            .lock()
            .push(StorageCall::MoveCurrentShares(height));
        Ok(())
    }

    async fn add_transaction(&self, payment: &Payment) -> Result {
        self.calls
            .lock()
            .push(StorageCall::AddTransaction(payment.id));
        Ok(())
    }

    async fn update_payment(&self, payment: &Payment) -> Result {
        self.calls.lock().push(StorageCall::UpdatePayment(payment.id));
        Ok(())
    }
}
