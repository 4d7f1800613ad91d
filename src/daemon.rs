use {super::*, snafu::IntoError};

/// Bitcoin Core's code for unknown blocks, transactions and addresses.
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RpcError {
    #[snafu(display("failed to reach daemon at {url}"))]
    Transport { url: String, source: reqwest::Error },
    #[snafu(display("daemon replied with HTTP {status}: {body}"))]
    Http { status: u16, body: String },
    #[snafu(display("daemon error {code}: {message}"))]
    Rpc { code: i64, message: String },
    #[snafu(display("malformed reply to `{method}`"))]
    Malformed {
        method: String,
        source: serde_json::Error,
    },
}

impl RpcError {
    fn is_not_found(&self) -> bool {
        matches!(self, RpcError::Rpc { code, .. } if *code == RPC_INVALID_ADDRESS_OR_KEY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlockInfo {
    pub hash: BlockHash,
    pub height: u64,
    pub confirmations: i64,
    #[serde(default)]
    pub tx: Vec<Txid>,
}

impl BlockInfo {
    pub fn is_orphaned(&self) -> bool {
        self.confirmations == -1
    }

    pub fn generation_txid(&self) -> Option<Txid> {
        self.tx.first().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TransactionOutput {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TransactionInfo {
    pub txid: Txid,
    #[serde(default)]
    pub details: Vec<TransactionOutput>,
}

impl TransactionInfo {
    /// The output paying the pool, matched by address or by wallet account.
    pub fn pool_output(
        &self,
        address: Option<&str>,
        account: Option<&str>,
    ) -> Option<&TransactionOutput> {
        self.details.iter().find(|output| {
            address.is_some_and(|address| output.address.as_deref() == Some(address))
                || account.is_some_and(|account| output.account.as_deref() == Some(account))
        })
    }
}

/// The coin daemon calls the pool makes.
#[async_trait]
pub trait Daemon: Send + Sync {
    async fn get_block_template(&self) -> Result<BlockTemplate, RpcError>;

    /// Returns the daemon's rejection reason, if it gave one.
    async fn submit_block(&self, block_hex: &str) -> Result<Option<String>, RpcError>;

    /// Block submission for daemons without `submitblock`.
    async fn submit_block_via_template(&self, block_hex: &str)
    -> Result<Option<String>, RpcError>;

    async fn get_block(&self, hash: &BlockHash) -> Result<Option<BlockInfo>, RpcError>;

    async fn get_transaction(&self, txid: &Txid) -> Result<Option<TransactionInfo>, RpcError>;

    async fn get_account(&self, address: &str) -> Result<String, RpcError>;

    async fn validate_address(&self, address: &str) -> Result<bool, RpcError>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC 1.0 over HTTP, the dialect bitcoind and its forks speak.
pub struct RpcDaemon {
    client: reqwest::Client,
    url: String,
    username: Option<String>,
    password: Option<String>,
    next_id: AtomicU64,
}

impl fmt::Debug for RpcDaemon {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcDaemon")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl RpcDaemon {
    pub fn new(config: &PoolConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.daemon_timeout())
            .build()
            .context("failed to build daemon HTTP client")?;

        Ok(Self {
            client,
            url: config.daemon_url.clone(),
            username: config.daemon_username.clone(),
            password: config.daemon_password.clone(),
            next_id: AtomicU64::new(0),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let mut builder = self.client.post(&self.url).json(&request);

        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_ref());
        }

        let response = builder
            .send()
            .await
            .map_err(|source| TransportSnafu { url: &self.url }.into_error(source))?;

        let status = response.status();

        let body = response
            .text()
            .await
            .map_err(|source| TransportSnafu { url: &self.url }.into_error(source))?;

        // bitcoind reports RPC errors with a 500 and a regular JSON-RPC body
        let reply = match serde_json::from_str::<RpcResponse>(&body) {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => {
                return HttpSnafu {
                    status: status.as_u16(),
                    body,
                }
                .fail();
            }
            Err(source) => return Err(MalformedSnafu { method }.into_error(source)),
        };

        if let Some(error) = reply.error {
            return RpcSnafu {
                code: error.code,
                message: error.message,
            }
            .fail();
        }

        serde_json::from_value(reply.result)
            .map_err(|source| MalformedSnafu { method }.into_error(source))
    }
}

#[async_trait]
impl Daemon for RpcDaemon {
    async fn get_block_template(&self) -> Result<BlockTemplate, RpcError> {
        self.call(
            "getblocktemplate",
            json!([{
                "capabilities": ["coinbasetxn", "workid", "coinbase/append"],
                "rules": ["segwit"],
            }]),
        )
        .await
    }

    async fn submit_block(&self, block_hex: &str) -> Result<Option<String>, RpcError> {
        self.call("submitblock", json!([block_hex])).await
    }

    async fn submit_block_via_template(
        &self,
        block_hex: &str,
    ) -> Result<Option<String>, RpcError> {
        self.call(
            "getblocktemplate",
            json!([{"mode": "submit", "data": block_hex}]),
        )
        .await
    }

    async fn get_block(&self, hash: &BlockHash) -> Result<Option<BlockInfo>, RpcError> {
        match self.call("getblock", json!([hash.to_string()])).await {
            Ok(block) => Ok(Some(block)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_transaction(&self, txid: &Txid) -> Result<Option<TransactionInfo>, RpcError> {
        match self.call("gettransaction", json!([txid.to_string()])).await {
            Ok(transaction) => Ok(Some(transaction)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_account(&self, address: &str) -> Result<String, RpcError> {
        self.call("getaccount", json!([address])).await
    }

    async fn validate_address(&self, address: &str) -> Result<bool, RpcError> {
        #[derive(Deserialize)]
        struct Validation {
            isvalid: bool,
        }

        let validation: Validation = self.call("validateaddress", json!([address])).await?;

        Ok(validation.isvalid)
    }
}
