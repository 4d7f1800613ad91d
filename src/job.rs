use super::*;

/// Everything a job needs besides its template: how to hash, and whom to pay.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub algorithm: Arc<dyn HashAlgorithm>,
    pub coinbase_hasher: CoinbaseHasher,
    pub pool_script: ScriptBuf,
    pub pool_sig: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ShareKey {
    extranonce1: Extranonce,
    extranonce2: Vec<u8>,
    ntime: u32,
    nonce: Vec<u8>,
}

#[derive(Debug)]
pub struct Job {
    id: JobId,
    template: Arc<BlockTemplate>,
    algorithm: Arc<dyn HashAlgorithm>,
    coinbase_hasher: CoinbaseHasher,
    merkle_tree: MerkleTree,
    coinb1: Vec<u8>,
    coinb2: Vec<u8>,
    target: U256,
    shares: Mutex<HashSet<ShareKey>>,
}

impl Job {
    pub fn new(id: JobId, template: Arc<BlockTemplate>, config: &JobConfig) -> Result<Self> {
        let mut builder = CoinbaseBuilder::new(
            config.pool_script.clone(),
            template.height,
            template.coinbase_value,
        )
        .with_aux(template.coinbaseaux.clone())
        .with_witness_commitment(template.default_witness_commitment.clone());

        if let Some(pool_sig) = &config.pool_sig {
            builder = builder.with_pool_sig(pool_sig.clone());
        }

        let parts = builder
            .build()
            .with_context(|| format!("failed to build coinbase for height {}", template.height))?;

        Ok(Self {
            id,
            algorithm: config.algorithm.clone(),
            coinbase_hasher: config.coinbase_hasher,
            merkle_tree: MerkleTree::new(&template.txids()),
            coinb1: parts.coinb1,
            coinb2: parts.coinb2,
            target: template.target(),
            shares: Mutex::new(HashSet::new()),
            template,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn height(&self) -> u64 {
        self.template.height
    }

    pub fn template(&self) -> &BlockTemplate {
        &self.template
    }

    pub fn algorithm(&self) -> &dyn HashAlgorithm {
        self.algorithm.as_ref()
    }

    pub fn merkle_tree(&self) -> &MerkleTree {
        &self.merkle_tree
    }

    pub fn coinb1(&self) -> &[u8] {
        &self.coinb1
    }

    pub fn coinb2(&self) -> &[u8] {
        &self.coinb2
    }

    pub fn target(&self) -> U256 {
        self.target
    }

    pub fn difficulty(&self) -> f64 {
        difficulty_from_target(self.target)
    }

    /// The header field after the merkle root, zeroed when the template has none.
    pub fn reserved(&self) -> [u8; 32] {
        self.template
            .reserved
            .map(|hash| hash.to_byte_array())
            .unwrap_or_default()
    }

    /// Records a submission. Returns false if the same nonce material was already seen on
    /// this job.
    pub fn register_share(
        &self,
        extranonce1: &Extranonce,
        extranonce2: &[u8],
        ntime: u32,
        nonce: &[u8],
    ) -> bool {
        self.shares.lock().insert(ShareKey {
            extranonce1: extranonce1.clone(),
            extranonce2: extranonce2.to_vec(),
            ntime,
            nonce: nonce.to_vec(),
        })
    }

    pub fn coinbase_hash(&self, coinbase: &[u8]) -> [u8; 32] {
        self.coinbase_hasher.hash(coinbase)
    }

    pub fn merkle_root(&self, extranonce1: &Extranonce) -> TxMerkleNode {
        let coinbase = serialize_coinbase(self, extranonce1);
        self.merkle_tree.with_first(self.coinbase_hash(&coinbase))
    }

    pub fn notify(&self, merkle_root: TxMerkleNode, clean_jobs: bool) -> Notify {
        Notify {
            job_id: self.id,
            version: self.template.version,
            prevhash: self.template.previous_block_hash,
            merkle_root,
            reserved: self.reserved(),
            ntime: Ntime::from(self.template.current_time),
            nbits: self.template.bits,
            clean_jobs,
        }
    }
}
