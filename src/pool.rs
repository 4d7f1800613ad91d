use {super::*, crate::job::JobConfig};

/// Shared state of a running pool: the job set, every live miner session and the engines
/// that judge and retarget them.
pub struct Pool {
    coin: CoinOptions,
    start_difficulty: Difficulty,
    validate_addresses: bool,
    job_config: JobConfig,
    jobs: Arc<JobTracker>,
    sessions: DashMap<u64, Arc<MinerSession>>,
    next_session_id: AtomicU64,
    next_extranonce1: AtomicU32,
    daemon: Arc<dyn Daemon>,
    events: Arc<EventBus>,
    share_manager: ShareManager,
    vardiff: Arc<VardiffManager>,
}

impl Pool {
    pub async fn new(
        config: &PoolConfig,
        daemon: Arc<dyn Daemon>,
        storage: Arc<dyn Storage>,
    ) -> Result<Self> {
        let coin = config.coin();
        let jobs = Arc::new(JobTracker::new(config.job_history));
        let events = Arc::new(EventBus::new());

        let mut share_manager = ShareManager::new(
            coin.clone(),
            jobs.clone(),
            daemon.clone(),
            storage.clone(),
            events.clone(),
        )
        .with_pool_address(config.pool_address.clone())
        .with_submit_limits(config.submit_permits, config.daemon_timeout());

        share_manager.resolve_pool_account().await;

        Ok(Self {
            job_config: JobConfig {
                algorithm: Arc::new(Sha256d),
                coinbase_hasher: coin.coinbase_hasher,
                pool_script: config.pool_script()?,
                pool_sig: config.pool_sig.clone(),
            },
            coin,
            start_difficulty: config.start_difficulty,
            validate_addresses: config.validate_addresses,
            jobs,
            sessions: DashMap::new(),
            next_session_id: AtomicU64::new(1),
            next_extranonce1: AtomicU32::new(1),
            daemon,
            events,
            share_manager,
            vardiff: Arc::new(VardiffManager::new(config.vardiff(), storage)),
        })
    }

    pub fn coin(&self) -> &CoinOptions {
        &self.coin
    }

    pub fn validate_addresses(&self) -> bool {
        self.validate_addresses
    }

    pub fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    pub fn daemon(&self) -> &dyn Daemon {
        self.daemon.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn share_manager(&self) -> &ShareManager {
        &self.share_manager
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, id: u64) -> Option<Arc<MinerSession>> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    /// Registers a new miner with an extranonce1 no other live session holds.
    pub fn connect(
        &self,
        peer: SocketAddr,
    ) -> (Arc<MinerSession>, mpsc::UnboundedReceiver<Message>) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        let session = Arc::new(MinerSession::new(
            id,
            peer,
            self.allocate_extranonce1(),
            self.start_difficulty,
            outbound,
        ));

        self.sessions.insert(id, session.clone());

        info!(
            "Miner {id} connected from {peer} with extranonce1 {}",
            session.extranonce1()
        );

        (session, receiver)
    }

    pub fn disconnect(&self, id: u64) {
        if let Some((_, session)) = self.sessions.remove(&id) {
            info!(
                "Miner {id} from {} disconnected after {} valid and {} invalid shares",
                session.peer(),
                session.valid_shares(),
                session.invalid_shares()
            );
        }
    }

    fn allocate_extranonce1(&self) -> Extranonce {
        loop {
            let candidate =
                Extranonce::from(self.next_extranonce1.fetch_add(1, Ordering::Relaxed));

            if !self
                .sessions
                .iter()
                .any(|entry| *entry.value().extranonce1() == candidate)
            {
                return candidate;
            }
        }
    }

    /// Turns `template` into the current job and sends it to every active miner. Work
    /// on a new height invalidates all earlier jobs.
    pub fn update_template(&self, template: BlockTemplate) -> Result<Arc<Job>> {
        let clean_jobs = self
            .jobs
            .current()
            .is_none_or(|current| current.height() != template.height);

        let job = Arc::new(Job::new(
            self.jobs.next_id(),
            Arc::new(template),
            &self.job_config,
        )?);

        self.jobs.insert(job.clone(), clean_jobs);

        let sent = self
            .sessions
            .iter()
            .filter(|entry| entry.value().send_job(&job, clean_jobs))
            .count();

        debug!(
            "Broadcast job {} at height {} to {sent} miners (clean: {clean_jobs})",
            job.id(),
            job.height()
        );

        Ok(job)
    }

    pub async fn refresh_template(&self) -> Result<Arc<Job>> {
        let template = self
            .daemon
            .get_block_template()
            .await
            .context("failed to get block template")?;

        self.update_template(template)
    }

    fn spawn_template_refresh(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
        tasks: &mut JoinSet<()>,
    ) {
        tasks.spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = self.refresh_template().await {
                            warn!("Template refresh failed: {err:#}");
                        }
                    }
                }
            }
        });
    }
}

pub async fn run(config: PoolConfig, cancel_token: CancellationToken) -> Result {
    config.validate()?;

    let daemon: Arc<dyn Daemon> = Arc::new(RpcDaemon::new(&config)?);

    let storage: Arc<dyn Storage> = match &config.storage {
        Some(path) => Arc::new(FileStorage::new(path).await?),
        None => Arc::new(NullStorage),
    };

    let pool = Arc::new(Pool::new(&config, daemon, storage).await?);

    let job = pool
        .refresh_template()
        .await
        .context("failed to fetch initial block template")?;

    info!("Working on height {} with job {}", job.height(), job.id());

    let mut tasks = JoinSet::new();

    pool.vardiff
        .clone()
        .spawn(pool.events.subscribe(), cancel_token.clone(), &mut tasks);

    pool.clone().spawn_template_refresh(
        Duration::from_secs(config.update_interval),
        cancel_token.clone(),
        &mut tasks,
    );

    let address = config.bind_address();
    let listener = TcpListener::bind(address.as_str())
        .await
        .with_context(|| format!("failed to bind to {address}"))?;

    info!("Stratum server listening for miners on {address}");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Shutting down pool");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("Failed to accept connection: {err}");
                        continue;
                    }
                };

                let (session, outbound) = pool.connect(peer);
                let pool = pool.clone();
                let cancel = cancel_token.child_token();

                tasks.spawn(async move {
                    let (reader, writer) = stream.into_split();

                    let connection =
                        Connection::new(pool, session, outbound, reader, writer, cancel);

                    if let Err(err) = connection.serve().await {
                        error!("Connection error for {peer}: {err:#}");
                    }
                });
            }
        }
    }

    info!("Waiting for {} tasks to complete...", tasks.len());
    while tasks.join_next().await.is_some() {}
    info!("All pool tasks stopped");

    Ok(())
}
