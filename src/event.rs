use super::*;

#[derive(Debug, Clone)]
pub enum Event {
    /// A miner submitted a share, valid or not, received at `received`.
    ShareSubmitted {
        session: Arc<MinerSession>,
        received: Instant,
    },
    BlockFound { height: u64, hash: BlockHash },
}

/// Pool-wide fan-out. Every subscriber sees every event, in publication order.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Event>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: Event) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::fixtures::session};

    fn block_found(height: u64) -> Event {
        Event::BlockFound {
            height,
            hash: BlockHash::all_zeros(),
        }
    }

    #[test]
    fn every_subscriber_sees_events_in_order() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(block_found(1));
        bus.publish(block_found(2));

        for receiver in [&mut first, &mut second] {
            for expected in [1, 2] {
                match receiver.try_recv().unwrap() {
                    Event::BlockFound { height, .. } => assert_eq!(height, expected),
                    event => panic!("unexpected event {event:?}"),
                }
            }
            assert!(receiver.try_recv().is_err());
        }
    }

    #[test]
    fn closed_subscribers_are_dropped() {
        let bus = EventBus::new();
        let receiver = bus.subscribe();
        let _kept = bus.subscribe();

        drop(receiver);
        bus.publish(block_found(1));

        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn share_events_carry_the_session() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        let (session, _outbound) = session(1.0);

        let now = Instant::now();

        bus.publish(Event::ShareSubmitted {
            session: session.clone(),
            received: now,
        });

        match receiver.try_recv().unwrap() {
            Event::ShareSubmitted {
                session: sender,
                received,
            } => {
                assert!(Arc::ptr_eq(&sender, &session));
                assert_eq!(received, now);
            }
            event => panic!("unexpected event {event:?}"),
        }
    }
}
