use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use fairtable_core::PlayerId;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::TransportError;

/// How many slots past the last taken one a deposit may land. Lockstep
/// members are never more than a round apart.
pub const DELIVERY_WINDOW: u64 = 16;

/// Which collective a payload belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    Broadcast,
    Exchange,
}

/// Per-channel call counter. Members call collectives in lockstep, so the
/// n-th broadcast on one member pairs with the n-th broadcast on every other.
#[derive(Debug, Default)]
pub struct Sequencer {
    broadcast: AtomicU64,
    exchange: AtomicU64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number for the next call on `channel`, starting at 1
    pub fn next(&self, channel: Channel) -> u64 {
        let counter = match channel {
            Channel::Broadcast => &self.broadcast,
            Channel::Exchange => &self.exchange,
        };
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Default)]
struct Slots {
    pending: BTreeMap<(Channel, u64), HashMap<PlayerId, Vec<u8>>>,
    /// Highest sequence number already taken, per channel
    consumed: HashMap<Channel, u64>,
    closed: bool,
}

impl Slots {
    fn consumed(&self, channel: Channel) -> u64 {
        self.consumed.get(&channel).copied().unwrap_or(0)
    }

    /// Mark `seq` taken and drop anything left at or below it
    fn take(&mut self, channel: Channel, seq: u64) {
        let done = self.consumed.entry(channel).or_insert(0);
        *done = (*done).max(seq);
        let done = *done;
        self.pending.retain(|&(ch, s), _| ch != channel || s > done);
    }
}

/// Inbound payloads for one member, keyed by collective and sequence number
#[derive(Default)]
pub struct Mailbox {
    slots: Mutex<Slots>,
    notify: Notify,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slots> {
        // Slots are never left half-updated, so a poisoned lock is still usable
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `payload` from `from`. The first delivery per sender and slot
    /// wins. Slots already taken are ignored; slots beyond
    /// [`DELIVERY_WINDOW`] are refused.
    pub fn deposit(
        &self,
        channel: Channel,
        seq: u64,
        from: PlayerId,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        {
            let mut slots = self.lock();
            if slots.closed {
                return Err(TransportError::Closed);
            }
            let consumed = slots.consumed(channel);
            if seq <= consumed {
                debug!("Dropping late {:?} #{} payload from {}", channel, seq, from);
                return Ok(());
            }
            if seq > consumed + DELIVERY_WINDOW {
                return Err(TransportError::OutOfWindow { seq, consumed });
            }
            slots
                .pending
                .entry((channel, seq))
                .or_default()
                .entry(from)
                .or_insert(payload);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Wait until every sender in `from` has delivered for this slot, then
    /// take the slot.
    pub async fn collect(
        &self,
        channel: Channel,
        seq: u64,
        from: &[PlayerId],
    ) -> Result<HashMap<PlayerId, Vec<u8>>, TransportError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut slots = self.lock();
                if slots.closed {
                    return Err(TransportError::Closed);
                }
                let complete = slots
                    .pending
                    .get(&(channel, seq))
                    .map(|slot| from.iter().all(|id| slot.contains_key(id)))
                    .unwrap_or(from.is_empty());
                if complete {
                    let mut slot = slots.pending.remove(&(channel, seq)).unwrap_or_default();
                    slots.take(channel, seq);
                    slot.retain(|id, _| from.contains(id));
                    return Ok(slot);
                }
            }

            notified.await;
        }
    }

    /// Wait for a single sender's payload
    pub async fn collect_one(
        &self,
        channel: Channel,
        seq: u64,
        from: &PlayerId,
    ) -> Result<Vec<u8>, TransportError> {
        let mut slot = self.collect(channel, seq, std::slice::from_ref(from)).await?;
        slot.remove(from)
            .ok_or_else(|| TransportError::Protocol(format!("no payload from {from}")))
    }

    /// Mark a slot taken without waiting on it, as the root of a broadcast
    /// does for its own call
    pub fn skip(&self, channel: Channel, seq: u64) {
        self.lock().take(channel, seq);
    }

    /// Fail every pending and future call
    pub fn close(&self) {
        {
            let mut slots = self.lock();
            slots.closed = true;
            slots.pending.clear();
        }
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_collect_waits_for_all_senders() {
        let mailbox = Arc::new(Mailbox::new());
        let senders: Vec<PlayerId> = vec!["a".into(), "b".into()];

        let waiter = {
            let mailbox = mailbox.clone();
            let senders = senders.clone();
            tokio::spawn(async move { mailbox.collect(Channel::Exchange, 1, &senders).await })
        };

        mailbox.deposit(Channel::Exchange, 1, "a".into(), b"1".to_vec()).unwrap();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        mailbox.deposit(Channel::Exchange, 1, "b".into(), b"2".to_vec()).unwrap();
        let slot = waiter.await.unwrap().unwrap();
        assert_eq!(slot[&PlayerId::from("a")], b"1".to_vec());
        assert_eq!(slot[&PlayerId::from("b")], b"2".to_vec());
    }

    #[tokio::test]
    async fn test_first_delivery_wins_and_late_payloads_dropped() {
        let mailbox = Mailbox::new();
        mailbox.deposit(Channel::Broadcast, 1, "a".into(), b"first".to_vec()).unwrap();
        mailbox.deposit(Channel::Broadcast, 1, "a".into(), b"second".to_vec()).unwrap();

        let payload = mailbox.collect_one(Channel::Broadcast, 1, &"a".into()).await.unwrap();
        assert_eq!(payload, b"first".to_vec());

        mailbox.deposit(Channel::Broadcast, 1, "a".into(), b"late".to_vec()).unwrap();
        assert!(mailbox.lock().pending.is_empty());
    }

    #[test]
    fn test_deposits_beyond_window_refused() {
        let mailbox = Mailbox::new();
        mailbox
            .deposit(Channel::Exchange, DELIVERY_WINDOW, "a".into(), b"edge".to_vec())
            .unwrap();
        assert!(matches!(
            mailbox.deposit(Channel::Exchange, DELIVERY_WINDOW + 1, "a".into(), vec![]),
            Err(TransportError::OutOfWindow { consumed: 0, .. })
        ));
        assert!(matches!(
            mailbox.deposit(Channel::Exchange, u64::MAX, "a".into(), vec![]),
            Err(TransportError::OutOfWindow { .. })
        ));

        // The window slides as slots are taken
        mailbox.skip(Channel::Exchange, 4);
        mailbox
            .deposit(Channel::Exchange, DELIVERY_WINDOW + 4, "a".into(), vec![])
            .unwrap();
        // Other channels keep their own window
        assert!(mailbox
            .deposit(Channel::Broadcast, DELIVERY_WINDOW + 4, "a".into(), vec![])
            .is_err());
    }

    #[tokio::test]
    async fn test_collect_prunes_abandoned_slots() {
        let mailbox = Mailbox::new();
        // Slot 2 only ever gets a partial delivery
        mailbox.deposit(Channel::Exchange, 2, "a".into(), b"x".to_vec()).unwrap();
        mailbox.deposit(Channel::Exchange, 3, "a".into(), b"y".to_vec()).unwrap();
        mailbox.deposit(Channel::Broadcast, 1, "a".into(), b"z".to_vec()).unwrap();

        let slot = mailbox.collect(Channel::Exchange, 3, &["a".into()]).await.unwrap();
        assert_eq!(slot[&PlayerId::from("a")], b"y".to_vec());

        let slots = mailbox.lock();
        assert!(!slots.pending.contains_key(&(Channel::Exchange, 2)));
        assert!(slots.pending.contains_key(&(Channel::Broadcast, 1)));
        assert_eq!(slots.pending.len(), 1);
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let mailbox = Arc::new(Mailbox::new());
        let waiter = {
            let mailbox = mailbox.clone();
            tokio::spawn(async move { mailbox.collect_one(Channel::Broadcast, 1, &"a".into()).await })
        };
        tokio::task::yield_now().await;
        mailbox.close();

        assert!(matches!(waiter.await.unwrap(), Err(TransportError::Closed)));
        assert!(matches!(
            mailbox.deposit(Channel::Broadcast, 2, "a".into(), vec![]),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn test_sequencer_counts_channels_separately() {
        let seq = Sequencer::new();
        assert_eq!(seq.next(Channel::Broadcast), 1);
        assert_eq!(seq.next(Channel::Broadcast), 2);
        assert_eq!(seq.next(Channel::Exchange), 1);
    }
}
