use {
    super::*,
    std::path::{Path, PathBuf},
    tokio::{
        fs::{File, OpenOptions},
        io::{AsyncWriteExt, BufWriter},
    },
};

/// A payout record handed over by the payment processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: u64,
    pub username: String,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: Amount,
    pub txid: Option<Txid>,
    pub completed: bool,
}

/// Where accepted shares, found blocks and miner difficulty changes are recorded.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn add_share(&self, share: &Share) -> Result;

    async fn add_block(&self, share: &Share) -> Result;

    async fn update_difficulty(&self, miner: &MinerSession) -> Result;

    /// Closes the current round, filing its shares under the block at `height`.
    async fn move_current_shares(&self, height: u64) -> Result;

    async fn add_transaction(&self, payment: &Payment) -> Result;

    async fn update_payment(&self, payment: &Payment) -> Result;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullStorage;

#[async_trait]
impl Storage for NullStorage {
    async fn add_share(&self, _share: &Share) -> Result {
        Ok(())
    }

    async fn add_block(&self, _share: &Share) -> Result {
        Ok(())
    }

    async fn update_difficulty(&self, _miner: &MinerSession) -> Result {
        Ok(())
    }

    async fn move_current_shares(&self, _height: u64) -> Result {
        Ok(())
    }

    async fn add_transaction(&self, _payment: &Payment) -> Result {
        Ok(())
    }

    async fn update_payment(&self, _payment: &Payment) -> Result {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    Share {
        timestamp: u64,
        miner: &'a str,
        height: u64,
        difficulty: f64,
        block_candidate: bool,
    },
    Block {
        timestamp: u64,
        miner: &'a str,
        height: u64,
        hash: Option<BlockHash>,
        generation_txid: Option<Txid>,
        reward: Option<f64>,
    },
    Difficulty {
        timestamp: u64,
        miner: Option<String>,
        difficulty: Difficulty,
    },
    Round {
        timestamp: u64,
        height: u64,
    },
    Transaction {
        timestamp: u64,
        payment: &'a Payment,
    },
    Payment {
        timestamp: u64,
        payment: &'a Payment,
    },
}

/// Appends one JSON object per line to a file.
pub struct FileStorage {
    path: PathBuf,
    writer: tokio::sync::Mutex<BufWriter<File>>,
}

impl FileStorage {
    pub async fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open storage file {}", path.display()))?;

        Ok(Self {
            path: path.into(),
            writer: tokio::sync::Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, record: Record<'_>) -> Result {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn add_share(&self, share: &Share) -> Result {
        self.write(Record::Share {
            timestamp: unix_now(),
            miner: &share.miner.username,
            height: share.height,
            difficulty: share.difficulty(),
            block_candidate: share.is_block_candidate,
        })
        .await
    }

    async fn add_block(&self, share: &Share) -> Result {
        let (generation_txid, reward) = match &share.found_block {
            Some(found) => (
                Some(found.generation.txid),
                Some(found.pool_output.amount),
            ),
            None => (None, None),
        };

        self.write(Record::Block {
            timestamp: unix_now(),
            miner: &share.miner.username,
            height: share.height,
            hash: share.block_hash,
            generation_txid,
            reward,
        })
        .await
    }

    async fn update_difficulty(&self, miner: &MinerSession) -> Result {
        self.write(Record::Difficulty {
            timestamp: unix_now(),
            miner: miner.username(),
            difficulty: miner.difficulty(),
        })
        .await
    }

    async fn move_current_shares(&self, height: u64) -> Result {
        self.write(Record::Round {
            timestamp: unix_now(),
            height,
        })
        .await
    }

    async fn add_transaction(&self, payment: &Payment) -> Result {
        self.write(Record::Transaction {
            timestamp: unix_now(),
            payment,
        })
        .await
    }

    async fn update_payment(&self, payment: &Payment) -> Result {
        self.write(Record::Payment {
            timestamp: unix_now(),
            payment,
        })
        .await
    }
}
