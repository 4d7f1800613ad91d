use {super::*, tokio_util::codec::LinesCodecError};

/// Drives one miner: reads line-delimited JSON-RPC requests from `reader` and writes every
/// response and notification queued for the session to `writer`, in order.
pub struct Connection<R, W> {
    pool: Arc<Pool>,
    session: Arc<MinerSession>,
    outbound: mpsc::UnboundedReceiver<Message>,
    reader: FramedRead<R, LinesCodec>,
    writer: FramedWrite<W, LinesCodec>,
    cancel: CancellationToken,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        pool: Arc<Pool>,
        session: Arc<MinerSession>,
        outbound: mpsc::UnboundedReceiver<Message>,
        reader: R,
        writer: W,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pool,
            session,
            outbound,
            reader: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE)),
            writer: FramedWrite::new(writer, LinesCodec::new()),
            cancel,
        }
    }

    /// Serves the miner until it hangs up, sends something unparseable or the pool shuts
    /// down. The session is deregistered in every case.
    pub async fn serve(mut self) -> Result {
        let result = self.serve_inner().await;

        self.pool.disconnect(self.session.id());

        result
    }

    async fn serve_inner(&mut self) -> Result {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Closing connection with miner {} on shutdown", self.session.id());
                    break;
                }
                message = self.outbound.recv() => {
                    let Some(message) = message else {
                        break;
                    };

                    self.send(message).await?;
                }
                line = self.reader.next() => {
                    let Some(message) = self.parse_line(line)? else {
                        break;
                    };

                    let Message::Request { id, method, params } = message else {
                        warn!(
                            ?message,
                            "Ignoring notification or response from miner {}",
                            self.session.id()
                        );
                        continue;
                    };

                    self.dispatch(id, &method, params).await?;
                }
            }
        }

        self.flush_outbound().await
    }

    async fn dispatch(&mut self, id: Id, method: &str, params: Value) -> Result {
        match method {
            "mining.subscribe" => {
                let subscribe = serde_json::from_value::<Subscribe>(params)
                    .with_context(|| format!("failed to deserialize {method}"))?;

                self.subscribe(id, subscribe);
            }
            "mining.authorize" => {
                let authorize = serde_json::from_value::<Authorize>(params)
                    .with_context(|| format!("failed to deserialize {method}"))?;

                self.authorize(id, authorize).await;
            }
            "mining.submit" => {
                let submit = serde_json::from_value::<Submit>(params)
                    .with_context(|| format!("failed to deserialize {method}"))?;

                self.submit(id, submit).await;
            }
            method => {
                warn!(
                    "Unknown method {method} with {params} from miner {}",
                    self.session.id()
                );
                self.session.respond_error(id, StratumError::Other);
            }
        }

        Ok(())
    }

    fn subscribe(&mut self, id: Id, subscribe: Subscribe) {
        info!(
            "Miner {} subscribed with user agent {:?}",
            self.session.id(),
            subscribe.user_agent
        );

        if !self.session.subscribe(subscribe.user_agent.as_deref()) {
            self.session.respond_error(id, StratumError::Other);
            return;
        }

        self.session.respond(
            id,
            SubscribeResult {
                subscriptions: vec![
                    ("mining.set_difficulty".into(), SUBSCRIPTION_ID.into()),
                    ("mining.notify".into(), SUBSCRIPTION_ID.into()),
                ],
                extranonce1: self.session.extranonce1().clone(),
                extranonce2_size: self.pool.coin().extranonce2_size,
            },
        );
    }

    async fn authorize(&mut self, id: Id, authorize: Authorize) {
        if !self.session.state().is_subscribed() {
            self.session.respond_error(id, StratumError::NotSubscribed);
            return;
        }

        let username = authorize.username.trim();

        if username.is_empty() || !Self::is_valid_username(&self.pool, username).await {
            info!(
                "Refusing authorization of miner {} as `{username}`",
                self.session.id()
            );
            self.session.respond(id, false);
            return;
        }

        self.session.authenticate(username);

        info!("Miner {} authorized as {username}", self.session.id());

        self.session.respond(id, true);
        self.session.send_difficulty();

        if let Some(job) = self.pool.jobs().current() {
            self.session.send_job(&job, true);
        }
    }

    async fn is_valid_username(pool: &Pool, username: &str) -> bool {
        if !pool.validate_addresses() {
            return true;
        }

        let address = username.split('.').next().unwrap_or(username);

        match pool.daemon().validate_address(address).await {
            Ok(valid) => valid,
            Err(err) => {
                warn!("Failed to validate address {address}: {err}");
                false
            }
        }
    }

    async fn submit(&mut self, id: Id, submit: Submit) {
        if !self.session.state().is_subscribed() {
            self.session.respond_error(id, StratumError::NotSubscribed);
            return;
        }

        if !self.session.is_authorized() {
            self.session.respond_error(id, StratumError::Unauthorized);
            return;
        }

        let share = self
            .pool
            .share_manager()
            .process_share(&self.session, &submit)
            .await;

        match share.error {
            None => self.session.respond(id, true),
            Some(error) => self.session.respond_error(id, error.into()),
        }
    }

    fn parse_line(
        &self,
        line: Option<Result<String, LinesCodecError>>,
    ) -> Result<Option<Message>> {
        match line {
            Some(Ok(line)) => {
                let message = serde_json::from_str::<Message>(&line).with_context(|| {
                    format!(
                        "invalid stratum message from miner {}: {line:?}",
                        self.session.id()
                    )
                })?;
                Ok(Some(message))
            }
            Some(Err(err)) => Err(anyhow!(
                "read error from miner {}: {err}",
                self.session.id()
            )),
            None => {
                info!("Miner {} hung up", self.session.id());
                Ok(None)
            }
        }
    }

    /// Writes whatever is already queued, so replies to the last requests are not lost.
    async fn flush_outbound(&mut self) -> Result {
        while let Ok(message) = self.outbound.try_recv() {
            self.send(message).await?;
        }

        Ok(())
    }

    async fn send(&mut self, message: Message) -> Result {
        let frame = serde_json::to_string(&message)?;
        self.writer.send(frame).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::fixtures::{
            CURTIME, MemoryStorage, MockDaemon, POOL_ADDRESS, fixed_job_with, header_for,
            template,
        },
        tokio::io::{
            AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
        },
    };

    struct Miner {
        pool: Arc<Pool>,
        session: Arc<MinerSession>,
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
        cancel: CancellationToken,
        handle: tokio::task::JoinHandle<Result>,
    }

    impl Miner {
        async fn connect(args: &[&str], daemon: MockDaemon) -> Self {
            let config = PoolConfig::try_parse_from(
                ["shaft", "--pool-address", POOL_ADDRESS, "--extranonce2-size", "4"]
                    .iter()
                    .chain(args),
            )
            .unwrap();

            let pool = Arc::new(
                Pool::new(&config, Arc::new(daemon), Arc::new(MemoryStorage::default()))
                    .await
                    .unwrap(),
            );

            Self::attach(pool)
        }

        fn attach(pool: Arc<Pool>) -> Self {
            let (client, server) = tokio::io::duplex(64 * 1024);
            let (server_reader, server_writer) = tokio::io::split(server);
            let (client_reader, client_writer) = tokio::io::split(client);

            let (session, outbound) = pool.connect("127.0.0.1:4000".parse().unwrap());
            let cancel = CancellationToken::new();

            let handle = tokio::spawn(
                Connection::new(
                    pool.clone(),
                    session.clone(),
                    outbound,
                    server_reader,
                    server_writer,
                    cancel.clone(),
                )
                .serve(),
            );

            Self {
                pool,
                session,
                lines: BufReader::new(client_reader).lines(),
                writer: client_writer,
                cancel,
                handle,
            }
        }

        async fn send(&mut self, line: Value) {
            self.writer
                .write_all(format!("{line}\n").as_bytes())
                .await
                .unwrap();
        }

        async fn recv(&mut self) -> Message {
            let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn request(&mut self, id: u64, method: &str, params: Value) -> Message {
            self.send(json!({"id": id, "method": method, "params": params}))
                .await;
            self.recv().await
        }

        async fn subscribe_and_authorize(&mut self) {
            self.request(1, "mining.subscribe", json!(["cgminer/4.10.0"]))
                .await;
            assert_eq!(
                self.request(2, "mining.authorize", json!(["alice", "x"]))
                    .await,
                Message::result(Id::Number(2), true)
            );
        }

        fn job(&self, header_value: U256) -> Arc<Job> {
            let job = fixed_job_with(template(), header_value, 1);
            self.pool.jobs().insert(job.clone(), true);
            job
        }
    }

    fn method(message: &Message) -> &str {
        match message {
            Message::Notification { method, .. } => method,
            _ => panic!("expected notification, got {message:?}"),
        }
    }

    fn submit_params(job: &Job, extranonce2: &str) -> Value {
        json!([
            "alice",
            job.id().to_string(),
            Ntime::from(CURTIME).to_string(),
            extranonce2
        ])
    }

    #[tokio::test]
    async fn subscribe_returns_extranonces() {
        let mut miner = Miner::connect(&[], MockDaemon::default()).await;

        let response = miner
            .request(1, "mining.subscribe", json!(["bfgminer/5.4.2"]))
            .await;

        pretty_assertions::assert_eq!(
            response,
            Message::result(
                Id::Number(1),
                json!([
                    [
                        ["mining.set_difficulty", SUBSCRIPTION_ID],
                        ["mining.notify", SUBSCRIPTION_ID]
                    ],
                    miner.session.extranonce1().to_hex(),
                    4
                ])
            )
        );
        assert_eq!(miner.session.software().software, session::Software::Bfgminer);
    }

    #[tokio::test]
    async fn second_subscribe_is_refused() {
        let mut miner = Miner::connect(&[], MockDaemon::default()).await;

        miner.request(1, "mining.subscribe", json!([])).await;
        let response = miner.request(2, "mining.subscribe", json!([])).await;

        assert_eq!(
            response,
            Message::error(Id::Number(2), StratumError::Other.into_response())
        );
    }

    #[tokio::test]
    async fn authorize_before_subscribe_is_refused() {
        let mut miner = Miner::connect(&[], MockDaemon::default()).await;

        let response = miner
            .request(1, "mining.authorize", json!(["alice", "x"]))
            .await;

        assert_eq!(
            response,
            Message::error(Id::Number(1), StratumError::NotSubscribed.into_response())
        );
    }

    #[tokio::test]
    async fn authorize_sends_difficulty_and_current_job() {
        let mut miner = Miner::connect(&[], MockDaemon::default()).await;
        let job = miner.job(header_for(1));

        miner.subscribe_and_authorize().await;

        assert_eq!(method(&miner.recv().await), "mining.set_difficulty");
        assert_eq!(method(&miner.recv().await), "mining.set_target");
        assert_eq!(
            miner.recv().await,
            Message::notification(
                "mining.notify",
                job.notify(job.merkle_root(miner.session.extranonce1()), true)
            )
        );
        assert_eq!(miner.session.username().as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn blank_username_is_refused() {
        let mut miner = Miner::connect(&[], MockDaemon::default()).await;
        miner.request(1, "mining.subscribe", json!([])).await;

        let response = miner.request(2, "mining.authorize", json!([" ", "x"])).await;

        assert_eq!(response, Message::result(Id::Number(2), false));
        assert!(!miner.session.is_authorized());
    }

    #[tokio::test]
    async fn addresses_are_validated_when_enabled() {
        let daemon = MockDaemon::default();
        daemon.valid_addresses.lock().push(POOL_ADDRESS.into());
        let mut miner = Miner::connect(&["--validate-addresses"], daemon).await;
        miner.request(1, "mining.subscribe", json!([])).await;

        let refused = miner
            .request(2, "mining.authorize", json!(["nobody.rig1", "x"]))
            .await;
        let accepted = miner
            .request(3, "mining.authorize", json!([format!("{POOL_ADDRESS}.rig1"), "x"]))
            .await;

        assert_eq!(refused, Message::result(Id::Number(2), false));
        assert_eq!(accepted, Message::result(Id::Number(3), true));
    }

    #[tokio::test]
    async fn submit_requires_subscription_then_authorization() {
        let mut miner = Miner::connect(&[], MockDaemon::default()).await;
        let job = miner.job(header_for(1));

        let response = miner
            .request(1, "mining.submit", submit_params(&job, "00000001"))
            .await;
        assert_eq!(
            response,
            Message::error(Id::Number(1), StratumError::NotSubscribed.into_response())
        );

        miner.request(2, "mining.subscribe", json!([])).await;

        let response = miner
            .request(3, "mining.submit", submit_params(&job, "00000001"))
            .await;
        assert_eq!(
            response,
            Message::error(Id::Number(3), StratumError::Unauthorized.into_response())
        );
    }

    #[tokio::test]
    async fn submit_answers_with_share_outcome() {
        let mut miner = Miner::connect(&["--start-difficulty", "1"], MockDaemon::default()).await;
        let job = miner.job(header_for(2));
        miner.subscribe_and_authorize().await;
        for _ in 0..3 {
            miner.recv().await;
        }

        let accepted = miner
            .request(3, "mining.submit", submit_params(&job, "00000001"))
            .await;
        let duplicate = miner
            .request(4, "mining.submit", submit_params(&job, "00000001"))
            .await;
        let stale = miner
            .request(5, "mining.submit", json!(["alice", "ffffff", "00000000", "00000001"]))
            .await;

        assert_eq!(accepted, Message::result(Id::Number(3), true));
        assert_eq!(
            duplicate,
            Message::error(Id::Number(4), StratumError::DuplicateShare.into_response())
        );
        assert_eq!(
            stale,
            Message::error(Id::Number(5), StratumError::JobNotFound.into_response())
        );
        assert_eq!(miner.session.valid_shares(), 1);
        assert_eq!(miner.session.invalid_shares(), 2);
    }

    #[tokio::test]
    async fn unknown_methods_get_an_error() {
        let mut miner = Miner::connect(&[], MockDaemon::default()).await;

        let response = miner
            .request(1, "mining.extranonce.subscribe", json!([]))
            .await;

        assert_eq!(
            response,
            Message::error(Id::Number(1), StratumError::Other.into_response())
        );
    }

    #[tokio::test]
    async fn garbage_disconnects_and_deregisters() {
        let mut miner = Miner::connect(&[], MockDaemon::default()).await;
        assert_eq!(miner.pool.session_count(), 1);

        miner.writer.write_all(b"this is not json\n").await.unwrap();

        assert!(miner.handle.await.unwrap().is_err());
        assert_eq!(miner.pool.session_count(), 0);
    }

    #[tokio::test]
    async fn hangup_deregisters() {
        let mut miner = Miner::connect(&[], MockDaemon::default()).await;
        let pool = miner.pool.clone();

        miner.writer.shutdown().await.unwrap();

        miner.handle.await.unwrap().unwrap();
        assert_eq!(pool.session_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_closes_the_connection() {
        let miner = Miner::connect(&[], MockDaemon::default()).await;

        miner.cancel.cancel();

        miner.handle.await.unwrap().unwrap();
        assert_eq!(miner.pool.session_count(), 0);
    }

    #[tokio::test]
    async fn pool_broadcasts_reach_the_miner() {
        let mut miner = Miner::connect(&[], MockDaemon::default()).await;
        miner.subscribe_and_authorize().await;
        for _ in 0..2 {
            miner.recv().await;
        }

        let job = miner.pool.update_template(template()).unwrap();

        assert_eq!(
            miner.recv().await,
            Message::notification(
                "mining.notify",
                job.notify(job.merkle_root(miner.session.extranonce1()), true)
            )
        );
    }
}
