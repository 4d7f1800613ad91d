use {super::*, parking_lot::MutexGuard, vardiff::VardiffHistory};

pub use {
    software::{MinerSoftware, Software},
    state::State,
};

mod software;
mod state;

#[derive(Debug)]
struct Inner {
    state: State,
    username: Option<String>,
    software: MinerSoftware,
    difficulty: Difficulty,
    previous_difficulty: Difficulty,
    target: U256,
}

/// Difficulty and identity of a miner as of one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct MinerSnapshot {
    pub id: u64,
    pub username: String,
    pub extranonce1: Extranonce,
    pub difficulty: Difficulty,
    pub previous_difficulty: Difficulty,
}

/// One miner connection. The connection task owns the session; the pool registry and
/// share events hold shared references that go away with it.
#[derive(Debug)]
pub struct MinerSession {
    id: u64,
    peer: SocketAddr,
    extranonce1: Extranonce,
    outbound: mpsc::UnboundedSender<Message>,
    inner: Mutex<Inner>,
    vardiff: Mutex<Option<VardiffHistory>>,
    valid_shares: AtomicU64,
    invalid_shares: AtomicU64,
}

impl MinerSession {
    pub fn new(
        id: u64,
        peer: SocketAddr,
        extranonce1: Extranonce,
        start_difficulty: Difficulty,
        outbound: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self {
            id,
            peer,
            extranonce1,
            outbound,
            inner: Mutex::new(Inner {
                state: State::Connected,
                username: None,
                software: MinerSoftware::default(),
                difficulty: start_difficulty,
                previous_difficulty: start_difficulty,
                target: start_difficulty.to_target(),
            }),
            vardiff: Mutex::new(None),
            valid_shares: AtomicU64::new(0),
            invalid_shares: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn extranonce1(&self) -> &Extranonce {
        &self.extranonce1
    }

    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    pub fn username(&self) -> Option<String> {
        self.inner.lock().username.clone()
    }

    pub fn software(&self) -> MinerSoftware {
        self.inner.lock().software.clone()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.inner.lock().difficulty
    }

    pub fn previous_difficulty(&self) -> Difficulty {
        self.inner.lock().previous_difficulty
    }

    pub fn target(&self) -> U256 {
        self.inner.lock().target
    }

    pub fn valid_shares(&self) -> u64 {
        self.valid_shares.load(Ordering::Relaxed)
    }

    pub fn invalid_shares(&self) -> u64 {
        self.invalid_shares.load(Ordering::Relaxed)
    }

    pub fn is_authorized(&self) -> bool {
        self.state().is_authorized()
    }

    pub(crate) fn record_valid(&self) {
        self.valid_shares.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalid(&self) {
        self.invalid_shares.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn vardiff(&self) -> MutexGuard<'_, Option<VardiffHistory>> {
        self.vardiff.lock()
    }

    pub fn snapshot(&self) -> MinerSnapshot {
        let inner = self.inner.lock();

        MinerSnapshot {
            id: self.id,
            username: inner.username.clone().unwrap_or_default(),
            extranonce1: self.extranonce1.clone(),
            difficulty: inner.difficulty,
            previous_difficulty: inner.previous_difficulty,
        }
    }

    pub fn subscribe(&self, user_agent: Option<&str>) -> bool {
        let mut inner = self.inner.lock();

        if !inner.state.subscribe() {
            return false;
        }

        if let Some(user_agent) = user_agent {
            inner.software = MinerSoftware::parse(user_agent);
        }

        true
    }

    pub fn authenticate(&self, username: &str) -> bool {
        let mut inner = self.inner.lock();

        if !inner.state.authenticate() {
            return false;
        }

        inner.username = Some(username.into());

        true
    }

    /// Moves the miner to `difficulty`, keeping the old value as the previous difficulty
    /// and notifying the peer of the new difficulty and target. Returns false if the
    /// difficulty did not change.
    pub fn set_difficulty(&self, difficulty: Difficulty) -> bool {
        let mut inner = self.inner.lock();

        if inner.difficulty == difficulty {
            return false;
        }

        inner.previous_difficulty = inner.difficulty;
        inner.difficulty = difficulty;

        debug!(
            "Miner {} difficulty {} -> {}",
            self.id, inner.previous_difficulty, difficulty
        );

        self.send(Message::notification(
            "mining.set_difficulty",
            SetDifficulty(difficulty),
        ));

        let target = difficulty.to_target();

        if inner.target != target {
            inner.target = target;
            self.send(Message::notification("mining.set_target", SetTarget(target)));
        }

        true
    }

    /// Sends the current difficulty and target unconditionally, as a freshly authorized
    /// miner has not heard either yet.
    pub fn send_difficulty(&self) {
        let inner = self.inner.lock();

        self.send(Message::notification(
            "mining.set_difficulty",
            SetDifficulty(inner.difficulty),
        ));
        self.send(Message::notification(
            "mining.set_target",
            SetTarget(inner.target),
        ));
    }

    /// Sends `job` with the merkle root of this miner's own coinbase. Miners that are not
    /// authorized yet are skipped.
    pub fn send_job(&self, job: &Job, clean_jobs: bool) -> bool {
        if !self.inner.lock().state.activate() {
            return false;
        }

        let notify = job.notify(job.merkle_root(&self.extranonce1), clean_jobs);

        self.send(Message::notification("mining.notify", notify));

        true
    }

    pub fn send_message(&self, text: &str) {
        self.send(Message::notification(
            "client.show_message",
            ShowMessage(text.into()),
        ));
    }

    pub fn respond(&self, id: Id, result: impl Serialize) {
        self.send(Message::result(id, result));
    }

    pub fn respond_error(&self, id: Id, error: StratumError) {
        self.send(Message::error(id, error.into_response()));
    }

    fn send(&self, message: Message) {
        if self.outbound.send(message).is_err() {
            debug!("Dropping message for disconnected miner {}", self.id);
        }
    }
}
