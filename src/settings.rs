use {
    super::*,
    clap::{ArgAction, ArgGroup},
    std::path::PathBuf,
};

#[derive(Clone, Debug, Parser)]
#[command(
    version,
    about,
    group(ArgGroup::new("payout").required(true).args(["pool_address", "pool_public_key"]))
)]
pub struct PoolConfig {
    #[arg(
        long,
        env = "SHAFT_ADDRESS",
        help = "Listen at <ADDRESS>.",
        default_value = "0.0.0.0"
    )]
    pub address: String,
    #[arg(
        long,
        env = "SHAFT_PORT",
        help = "Listen on <PORT>.",
        default_value = "3333"
    )]
    pub port: u16,
    #[arg(
        long,
        env = "SHAFT_DAEMON_URL",
        help = "Connect to coin daemon RPC at <DAEMON_URL>.",
        default_value = "http://127.0.0.1:8232"
    )]
    pub daemon_url: String,
    #[arg(
        long,
        env = "SHAFT_DAEMON_USERNAME",
        help = "Authenticate to coin daemon RPC as <DAEMON_USERNAME>."
    )]
    pub daemon_username: Option<String>,
    #[arg(
        long,
        env = "SHAFT_DAEMON_PASSWORD",
        help = "Authenticate to coin daemon RPC with <DAEMON_PASSWORD>."
    )]
    pub daemon_password: Option<String>,
    #[arg(
        long,
        env = "SHAFT_DAEMON_TIMEOUT",
        help = "Give up on coin daemon calls after <DAEMON_TIMEOUT> seconds.",
        default_value = "10"
    )]
    pub daemon_timeout: u64,
    #[arg(
        long,
        env = "SHAFT_POOL_ADDRESS",
        help = "Pay block rewards to Base58Check <POOL_ADDRESS>."
    )]
    pub pool_address: Option<String>,
    #[arg(
        long,
        env = "SHAFT_POOL_PUBLIC_KEY",
        help = "Pay block rewards to compressed hex <POOL_PUBLIC_KEY>."
    )]
    pub pool_public_key: Option<String>,
    #[arg(
        long,
        env = "SHAFT_POOL_SIG",
        help = "Tag coinbase script sig with <POOL_SIG>."
    )]
    pub pool_sig: Option<String>,
    #[arg(
        long,
        env = "SHAFT_EXTRANONCE2_SIZE",
        help = "Set extranonce2 size in bytes (2-32).",
        default_value = "28",
        value_parser = clap::value_parser!(u8).range(MIN_ENONCE2_SIZE as i64..=MAX_ENONCE2_SIZE as i64)
    )]
    pub extranonce2_size: u8,
    #[arg(
        long,
        env = "SHAFT_COINBASE_HASHER",
        help = "Hash coinbase transactions with <COINBASE_HASHER>.",
        value_enum,
        default_value_t = CoinbaseHasher::Double
    )]
    pub coinbase_hasher: CoinbaseHasher,
    #[arg(
        long,
        env = "SHAFT_SUBMIT_BLOCK",
        help = "Submit blocks with `submitblock` instead of `getblocktemplate`.",
        action = ArgAction::Set,
        default_value_t = true
    )]
    pub submit_block: bool,
    #[arg(
        long,
        env = "SHAFT_PROOF_OF_STAKE_HYBRID",
        help = "Append the proof-of-stake signature byte to submitted blocks."
    )]
    pub proof_of_stake_hybrid: bool,
    #[arg(
        long,
        env = "SHAFT_SOLUTION_SIZE",
        help = "Require submitted solutions of exactly <SOLUTION_SIZE> bytes."
    )]
    pub solution_size: Option<usize>,
    #[arg(
        long,
        env = "SHAFT_VALIDATE_ADDRESSES",
        help = "Only authorize workers whose username starts with a valid address."
    )]
    pub validate_addresses: bool,
    #[arg(
        long,
        env = "SHAFT_START_DIFFICULTY",
        help = "Give <START_DIFFICULTY> to new clients.",
        default_value = "16"
    )]
    pub start_difficulty: Difficulty,
    #[arg(
        long,
        env = "SHAFT_VARDIFF_TARGET_TIME",
        help = "Target <VARDIFF_TARGET_TIME> seconds between shares.",
        default_value = "15"
    )]
    pub vardiff_target_time: f64,
    #[arg(
        long,
        env = "SHAFT_VARDIFF_RETARGET_TIME",
        help = "Retarget at most every <VARDIFF_RETARGET_TIME> seconds.",
        default_value = "90"
    )]
    pub vardiff_retarget_time: f64,
    #[arg(
        long,
        env = "SHAFT_VARDIFF_VARIANCE_PERCENT",
        help = "Tolerate <VARDIFF_VARIANCE_PERCENT> deviation from the target time.",
        default_value = "30"
    )]
    pub vardiff_variance_percent: f64,
    #[arg(
        long,
        env = "SHAFT_VARDIFF_MIN_DIFFICULTY",
        help = "Never retarget below <VARDIFF_MIN_DIFFICULTY>.",
        default_value = "8"
    )]
    pub vardiff_min_difficulty: Difficulty,
    #[arg(
        long,
        env = "SHAFT_VARDIFF_MAX_DIFFICULTY",
        help = "Never retarget above <VARDIFF_MAX_DIFFICULTY>.",
        default_value = "512"
    )]
    pub vardiff_max_difficulty: Difficulty,
    #[arg(
        long,
        env = "SHAFT_JOB_HISTORY",
        help = "Keep <JOB_HISTORY> recent jobs valid for submissions.",
        default_value = "16"
    )]
    pub job_history: usize,
    #[arg(
        long,
        env = "SHAFT_UPDATE_INTERVAL",
        help = "Block template <UPDATE_INTERVAL> in seconds.",
        default_value = "10"
    )]
    pub update_interval: u64,
    #[arg(
        long,
        env = "SHAFT_SUBMIT_PERMITS",
        help = "Submit at most <SUBMIT_PERMITS> blocks to the daemon at once.",
        default_value = "5"
    )]
    pub submit_permits: usize,
    #[arg(
        long,
        env = "SHAFT_STORAGE",
        help = "Append share and block records to <STORAGE>."
    )]
    pub storage: Option<PathBuf>,
}

/// Coin parameters the share pipeline depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinOptions {
    pub extranonce2_size: usize,
    pub coinbase_hasher: CoinbaseHasher,
    pub submit_block_supported: bool,
    pub proof_of_stake_hybrid: bool,
    pub solution_size: Option<usize>,
}

impl Default for CoinOptions {
    fn default() -> Self {
        Self {
            extranonce2_size: 28,
            coinbase_hasher: CoinbaseHasher::Double,
            submit_block_supported: true,
            proof_of_stake_hybrid: false,
            solution_size: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VardiffOptions {
    pub target_time: f64,
    pub retarget_time: f64,
    pub variance_percent: f64,
    pub min_difficulty: Difficulty,
    pub max_difficulty: Difficulty,
}

impl VardiffOptions {
    pub fn variance(&self) -> f64 {
        self.target_time * self.variance_percent / 100.0
    }

    /// Averages below this are too fast.
    pub fn t_min(&self) -> f64 {
        self.target_time - self.variance()
    }

    /// Averages above this are too slow.
    pub fn t_max(&self) -> f64 {
        self.target_time + self.variance()
    }

    /// Number of share intervals kept per miner: four retarget windows worth.
    pub fn buffer_size(&self) -> usize {
        ((self.retarget_time / self.target_time * 4.0) as usize).max(1)
    }
}

impl PoolConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn coin(&self) -> CoinOptions {
        CoinOptions {
            extranonce2_size: self.extranonce2_size.into(),
            coinbase_hasher: self.coinbase_hasher,
            submit_block_supported: self.submit_block,
            proof_of_stake_hybrid: self.proof_of_stake_hybrid,
            solution_size: self.solution_size,
        }
    }

    pub fn vardiff(&self) -> VardiffOptions {
        VardiffOptions {
            target_time: self.vardiff_target_time,
            retarget_time: self.vardiff_retarget_time,
            variance_percent: self.vardiff_variance_percent,
            min_difficulty: self.vardiff_min_difficulty,
            max_difficulty: self.vardiff_max_difficulty,
        }
    }

    pub fn pool_script(&self) -> Result<ScriptBuf> {
        match (&self.pool_address, &self.pool_public_key) {
            (Some(address), _) => Ok(script_from_address(address)?),
            (None, Some(key)) => Ok(script_from_public_key(key)?),
            (None, None) => bail!("either --pool-address or --pool-public-key is required"),
        }
    }

    pub fn daemon_timeout(&self) -> Duration {
        Duration::from_secs(self.daemon_timeout)
    }

    pub fn validate(&self) -> Result {
        ensure!(
            self.vardiff_target_time > 0.0,
            "vardiff target time must be positive"
        );
        ensure!(
            self.vardiff_retarget_time > 0.0,
            "vardiff retarget time must be positive"
        );
        ensure!(
            (0.0..100.0).contains(&self.vardiff_variance_percent),
            "vardiff variance percent must be in [0, 100)"
        );
        ensure!(
            self.vardiff_min_difficulty <= self.vardiff_max_difficulty,
            "vardiff minimum difficulty {} exceeds maximum {}",
            self.vardiff_min_difficulty,
            self.vardiff_max_difficulty
        );
        ensure!(self.job_history > 0, "job history must hold at least one job");
        ensure!(self.submit_permits > 0, "submit permits must be at least one");
        ensure!(self.update_interval > 0, "update interval must be positive");

        self.pool_script().context("invalid pool payout destination")?;

        Ok(())
    }
}
