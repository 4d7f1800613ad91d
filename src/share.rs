use super::*;

/// Why a share was turned down. Checks run in declaration order and the first failure wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ShareError {
    #[snafu(display("job not found"))]
    JobNotFound,
    #[snafu(display("incorrect extranonce2 size"))]
    IncorrectExtraNonce2Size,
    #[snafu(display("incorrect ntime size"))]
    IncorrectNTimeSize,
    #[snafu(display("ntime out of range"))]
    NTimeOutOfRange,
    #[snafu(display("incorrect nonce size"))]
    IncorrectNonceSize,
    #[snafu(display("duplicate share"))]
    DuplicateShare,
    #[snafu(display("low difficulty share"))]
    LowDifficultyShare,
}

impl From<ShareError> for StratumError {
    fn from(error: ShareError) -> Self {
        match error {
            ShareError::JobNotFound => StratumError::JobNotFound,
            ShareError::IncorrectExtraNonce2Size => StratumError::IncorrectExtraNonce2Size,
            ShareError::IncorrectNTimeSize => StratumError::IncorrectNTimeSize,
            ShareError::NTimeOutOfRange => StratumError::NTimeOutOfRange,
            ShareError::IncorrectNonceSize => StratumError::IncorrectNonceSize,
            ShareError::DuplicateShare => StratumError::DuplicateShare,
            ShareError::LowDifficultyShare => StratumError::LowDifficultyShare,
        }
    }
}

/// The daemon's view of a block this pool found.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundBlock {
    pub block: BlockInfo,
    pub generation: TransactionInfo,
    pub pool_output: TransactionOutput,
}

#[derive(Debug, Clone)]
pub struct Share {
    pub miner: MinerSnapshot,
    pub job_id: String,
    pub job: Option<Arc<Job>>,
    pub height: u64,
    pub extranonce2: Vec<u8>,
    pub ntime: u32,
    pub solution: Vec<u8>,
    pub coinbase: Vec<u8>,
    pub coinbase_hash: [u8; 32],
    pub merkle_root: Option<TxMerkleNode>,
    pub header: Vec<u8>,
    pub header_hash: [u8; 32],
    pub header_value: U256,
    pub share_difficulty: Ratio,
    pub block_difficulty_adjusted: f64,
    pub is_block_candidate: bool,
    pub block: Option<Vec<u8>>,
    pub block_hash: Option<BlockHash>,
    pub error: Option<ShareError>,
    pub found_block: Option<FoundBlock>,
}

impl Share {
    /// Runs a submission through every check and, when it gets that far, reconstructs the
    /// header and block. `now` is unix time in seconds. Validation always yields a share;
    /// failures are recorded in `error`.
    pub fn validate(
        miner: MinerSnapshot,
        job: Option<Arc<Job>>,
        submit: &Submit,
        coin: &CoinOptions,
        now: u64,
    ) -> Self {
        let mut share = Self {
            height: job.as_ref().map(|job| job.height()).unwrap_or_default(),
            miner,
            job_id: submit.job_id.clone(),
            job: job.clone(),
            extranonce2: Vec::new(),
            ntime: 0,
            solution: Vec::new(),
            coinbase: Vec::new(),
            coinbase_hash: [0; 32],
            merkle_root: None,
            header: Vec::new(),
            header_hash: [0; 32],
            header_value: U256::zero(),
            share_difficulty: Ratio::from_integer(U256::zero()),
            block_difficulty_adjusted: 0.0,
            is_block_candidate: false,
            block: None,
            block_hash: None,
            error: None,
            found_block: None,
        };

        if let Err(error) = share.check(job, submit, coin, now) {
            share.error = Some(error);
        }

        share
    }

    fn check(
        &mut self,
        job: Option<Arc<Job>>,
        submit: &Submit,
        coin: &CoinOptions,
        now: u64,
    ) -> Result<(), ShareError> {
        let Some(job) = job else {
            return JobNotFoundSnafu.fail();
        };

        self.extranonce2 = match hex::decode(&submit.extranonce2) {
            Ok(bytes) if bytes.len() == coin.extranonce2_size => bytes,
            _ => return IncorrectExtraNonce2SizeSnafu.fail(),
        };

        let Ok(ntime) = submit.ntime.parse::<Ntime>() else {
            return IncorrectNTimeSizeSnafu.fail();
        };
        self.ntime = ntime.into();

        snafu::ensure!(
            self.ntime >= job.template().current_time
                && u64::from(self.ntime) <= now + MAX_NTIME_OFFSET,
            NTimeOutOfRangeSnafu
        );

        self.solution = match hex::decode(&submit.solution) {
            Ok(bytes) if coin.solution_size.is_none_or(|size| bytes.len() == size) => bytes,
            _ => return IncorrectNonceSizeSnafu.fail(),
        };

        snafu::ensure!(
            job.register_share(
                &self.miner.extranonce1,
                &self.extranonce2,
                self.ntime,
                &self.solution
            ),
            DuplicateShareSnafu
        );

        self.coinbase = serialize_coinbase(&job, &self.miner.extranonce1);
        self.coinbase_hash = job.coinbase_hash(&self.coinbase);

        let mut nonce = self.extranonce2.clone();
        nonce.reverse();
        nonce.extend(self.miner.extranonce1.reversed());

        let merkle_root = job.merkle_tree().with_first(self.coinbase_hash);
        self.merkle_root = Some(merkle_root);

        // The solution goes into the header in reverse of its submitted byte order.
        let solution = self.solution.iter().rev().copied().collect::<Vec<u8>>();

        self.header = serialize_header(&job, merkle_root, &nonce, self.ntime, &solution);
        self.header_hash = job.algorithm().hash(&self.header);
        self.header_value = U256::from_little_endian(&self.header_hash);
        self.block_hash = Some(BlockHash::hash(&self.header));

        let multiplier = job.algorithm().multiplier();

        self.share_difficulty = Ratio::new(*DIFFICULTY_1_TARGET, self.header_value)
            .and_then(|ratio| ratio.checked_mul_integer(multiplier))
            .unwrap_or(Ratio::from_integer(U256::MAX));
        self.block_difficulty_adjusted = job.difficulty() * multiplier as f64;

        if job.target() >= self.header_value {
            self.is_block_candidate = true;
            self.block = Some(serialize_block(
                &job,
                &self.header,
                &self.coinbase,
                coin.proof_of_stake_hybrid,
            ));
            return Ok(());
        }

        let current = self.miner.difficulty.as_ratio();
        let previous = self.miner.previous_difficulty.as_ratio();

        snafu::ensure!(
            self.share_difficulty.at_least_fraction_of(current, 99, 100)
                || self.share_difficulty >= previous,
            LowDifficultyShareSnafu
        );

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Share difficulty scaled by the algorithm multiplier, for reporting.
    pub fn difficulty(&self) -> f64 {
        self.share_difficulty.to_f64()
    }

    /// The txid the daemon must report for the first transaction of a block built from
    /// this share.
    pub fn generation_txid(&self) -> Txid {
        Txid::from_byte_array(self.coinbase_hash)
    }

    pub fn block_hex(&self) -> Option<String> {
        self.block.as_deref().map(hex::encode)
    }

    pub fn set_found_block(&mut self, found: FoundBlock) {
        self.found_block = Some(found);
    }
}
