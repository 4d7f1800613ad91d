use super::*;

/// Per-miner share arrival history.
#[derive(Debug, Clone)]
pub struct VardiffHistory {
    pub(crate) buffer: RingBuffer,
    pub(crate) last_retarget: Instant,
    pub(crate) last_share: Instant,
}

/// Retargets each miner toward one share every `target_time` seconds, looking only at that
/// miner's own share arrivals.
pub struct VardiffManager {
    options: VardiffOptions,
    storage: Arc<dyn Storage>,
}

impl VardiffManager {
    pub fn new(options: VardiffOptions, storage: Arc<dyn Storage>) -> Self {
        Self { options, storage }
    }

    /// Records a share arriving at `now` and, when a retarget is due and the average
    /// interval is outside the variance band, moves the miner to a new difficulty. Returns
    /// the difficulty if it changed.
    pub fn retarget_at(&self, session: &MinerSession, now: Instant) -> Option<Difficulty> {
        let mut guard = session.vardiff();

        let Some(history) = guard.as_mut() else {
            let half_window = Duration::from_secs_f64(self.options.retarget_time / 2.0);

            *guard = Some(VardiffHistory {
                buffer: RingBuffer::new(self.options.buffer_size()),
                last_retarget: now.checked_sub(half_window).unwrap_or(now),
                last_share: now,
            });

            return None;
        };

        history
            .buffer
            .append(now.saturating_duration_since(history.last_share).as_secs_f64());
        history.last_share = now;

        let since_retarget = now.saturating_duration_since(history.last_retarget);

        if since_retarget.as_secs_f64() < self.options.retarget_time && !history.buffer.is_empty()
        {
            return None;
        }

        history.last_retarget = now;

        let average = history.buffer.average();
        let current = session.difficulty();
        let min = self.options.min_difficulty;
        let max = self.options.max_difficulty;
        let proposed = current.as_f64() * self.options.target_time / average;

        let new = if average > self.options.t_max() && current > min {
            proposed.max(min.as_f64())
        } else if average < self.options.t_min() {
            proposed.min(max.as_f64())
        } else {
            return None;
        };

        let Some(new) = Difficulty::new(new) else {
            warn!(
                "Ignoring unrepresentable difficulty {new} for miner {}",
                session.id()
            );
            return None;
        };

        history.buffer.clear();

        debug!(
            "Retargeting miner {} from {} to {} (average share time {:.2}s)",
            session.id(),
            current,
            new,
            average
        );

        session.set_difficulty(new).then_some(new)
    }

    /// Applies a share received at `received`, storing the difficulty if it changed.
    pub async fn on_share(&self, session: &MinerSession, received: Instant) {
        if self.retarget_at(session, received).is_none() {
            return;
        }

        if let Err(err) = self.storage.update_difficulty(session).await {
            warn!(
                "Failed to store difficulty of miner {}: {err:#}",
                session.id()
            );
        }
    }

    /// Consumes share events until the bus closes or `cancel` fires.
    pub fn spawn(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<Event>,
        cancel: CancellationToken,
        tasks: &mut JoinSet<()>,
    ) {
        tasks.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(Event::ShareSubmitted { session, received }) => {
                            self.on_share(&session, received).await
                        }
                        Some(Event::BlockFound { .. }) => {}
                        None => break,
                    },
                }
            }

            debug!("Vardiff task stopped");
        });
    }
}
