use {super::*, parking_lot::RwLock};

/// Recent jobs by id. The history is bounded, and a clean-jobs insert forgets everything
/// that came before it.
#[derive(Debug)]
pub struct JobTracker {
    capacity: usize,
    current: RwLock<Option<Arc<Job>>>,
    jobs: DashMap<JobId, Arc<Job>>,
    next_id: AtomicU64,
    order: Mutex<VecDeque<JobId>>,
}

impl JobTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            current: RwLock::new(None),
            jobs: DashMap::new(),
            next_id: AtomicU64::new(1),
            order: Mutex::new(VecDeque::new()),
        }
    }

    pub fn next_id(&self) -> JobId {
        JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    /// Looks up a job id as submitted by a miner. Ids that do not parse are unknown.
    pub fn resolve(&self, id: &str) -> Option<Arc<Job>> {
        id.parse::<JobId>().ok().and_then(|id| self.get(&id))
    }

    pub fn current(&self) -> Option<Arc<Job>> {
        self.current.read().clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn insert(&self, job: Arc<Job>, clean_jobs: bool) {
        let mut order = self.order.lock();

        if clean_jobs {
            for id in order.drain(..) {
                self.jobs.remove(&id);
            }
        }

        order.push_back(job.id());
        self.jobs.insert(job.id(), job.clone());

        while order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                self.jobs.remove(&evicted);
            }
        }

        *self.current.write() = Some(job);
    }
}
