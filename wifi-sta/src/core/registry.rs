//! Fan-out of connection events to any number of bounded queues.
//!
//! Each call to `register` allocates a bounded queue. The registry keeps the
//! sending half and the caller gets an [`EventReceiver`]. Firing is strictly
//! non-blocking: a full queue drops the event for that receiver only, so an
//! inattentive consumer can never stall the driver's event-loop thread.
//!
//! A queue lives until its receiver is dropped. Closed queues are pruned the
//! next time an event is fired or a receiver is registered.

use futures::stream::Stream;
use futures::{FutureExt, select};
use futures_timer::Delay;
use log::{debug, error};
use std::pin::{Pin, pin};
use std::sync::{Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::Result;
use crate::api::models::{Event, WifiError};

/// Receiving end of a queue registered with
/// [`WifiClient::register_event_receiver`](crate::WifiClient::register_event_receiver).
///
/// Can be consumed from a plain thread with [`blocking_recv`](Self::blocking_recv),
/// from async code with [`recv`](Self::recv), or as a [`Stream`].
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<Event>,
    capacity: usize,
}

impl EventReceiver {
    /// Declared capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the client owning the registry has been dropped
    /// and every queued event has been received.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Blocks the current thread until the next event arrives.
    ///
    /// There is no timeout. Must not be called from within an async
    /// runtime; use [`recv`](Self::recv) there.
    pub fn blocking_recv(&mut self) -> Option<Event> {
        self.rx.blocking_recv()
    }

    /// Takes a queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Waits for the next event for at most `timeout`.
    ///
    /// Returns `None` if the timeout elapses first or the queue is closed.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Event> {
        let mut delay = pin!(Delay::new(timeout).fuse());
        let mut next = pin!(self.rx.recv().fuse());

        select! {
            _ = delay => {
                debug!("No event within {timeout:?}");
                None
            }
            event = next => event,
        }
    }
}

impl Stream for EventReceiver {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// The registered queues, guarded by their own lock so registration may
/// run concurrently with firing.
#[derive(Debug)]
pub(crate) struct EventRegistry {
    senders: Mutex<Vec<mpsc::Sender<Event>>>,
    max_receivers: usize,
    max_queue_capacity: usize,
}

impl EventRegistry {
    pub(crate) fn new(max_receivers: usize, max_queue_capacity: usize) -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
            max_receivers,
            max_queue_capacity,
        }
    }

    // Senders hold no invariants a panic could break.
    fn lock(&self) -> MutexGuard<'_, Vec<mpsc::Sender<Event>>> {
        self.senders.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Allocates a queue of `capacity` events and registers it.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `capacity` is zero
    /// - `ResourceExhaustion` if `capacity` exceeds the queue size limit or
    ///   the registry is already holding the maximum number of receivers
    pub(crate) fn register(&self, capacity: usize) -> Result<EventReceiver> {
        if capacity == 0 {
            return Err(WifiError::InvalidArgument(
                "queue capacity must be at least 1".into(),
            ));
        }
        if capacity > self.max_queue_capacity {
            return Err(WifiError::ResourceExhaustion(format!(
                "queue capacity {capacity} exceeds limit of {}",
                self.max_queue_capacity
            )));
        }

        let mut senders = self.lock();
        senders.retain(|tx| !tx.is_closed());
        if senders.len() >= self.max_receivers {
            return Err(WifiError::ResourceExhaustion(format!(
                "already holding {} event receivers",
                senders.len()
            )));
        }

        let (tx, rx) = mpsc::channel(capacity);
        senders.push(tx);
        debug!(
            "Registered event receiver (capacity {capacity}, {} total)",
            senders.len()
        );

        Ok(EventReceiver { rx, capacity })
    }

    /// Offers `event` to every registered queue without blocking.
    pub(crate) fn fire(&self, event: Event) {
        let mut senders = self.lock();
        senders.retain(|tx| match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                error!("Could not fire {event} event, receive queue is full");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Event receiver dropped, removing it");
                false
            }
        });
    }

    /// Number of queues currently registered, closed or not.
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use std::thread::{self, ThreadId};

    /// Keeps every record so tests can check what was logged on their thread.
    struct CapturingLogger {
        records: Mutex<Vec<(ThreadId, Level, String)>>,
    }

    impl Log for CapturingLogger {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            let entry = (
                thread::current().id(),
                record.level(),
                record.args().to_string(),
            );
            self.records
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(entry);
        }

        fn flush(&self) {}
    }

    static LOGGER: CapturingLogger = CapturingLogger {
        records: Mutex::new(Vec::new()),
    };

    fn captured_on_this_thread() -> Vec<(Level, String)> {
        // Fails harmlessly once the logger is installed.
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);

        let me = thread::current().id();
        LOGGER
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(id, ..)| *id == me)
            .map(|(_, level, msg)| (*level, msg.clone()))
            .collect()
    }

    fn registry() -> EventRegistry {
        EventRegistry::new(4, 8)
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let reg = registry();
        let err = reg.register(0).unwrap_err();
        assert!(matches!(err, WifiError::InvalidArgument(_)));
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn oversized_queue_is_rejected() {
        let reg = registry();
        let err = reg.register(9).unwrap_err();
        assert!(matches!(err, WifiError::ResourceExhaustion(_)));
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn receiver_limit_is_enforced() {
        let reg = registry();
        let _held: Vec<_> = (0..4).map(|_| reg.register(1).unwrap()).collect();
        let err = reg.register(1).unwrap_err();
        assert!(matches!(err, WifiError::ResourceExhaustion(_)));
    }

    #[test]
    fn dropped_receivers_free_their_slot() {
        let reg = registry();
        let held: Vec<_> = (0..4).map(|_| reg.register(1).unwrap()).collect();
        drop(held);
        assert!(reg.register(1).is_ok());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn fire_reaches_every_receiver() {
        let reg = registry();
        let mut a = reg.register(1).unwrap();
        let mut b = reg.register(2).unwrap();
        assert_eq!(a.capacity(), 1);
        assert_eq!(b.capacity(), 2);

        reg.fire(Event::Connected);

        assert_eq!(a.try_recv(), Some(Event::Connected));
        assert_eq!(b.try_recv(), Some(Event::Connected));
        assert_eq!(a.try_recv(), None);
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let reg = registry();
        let mut rx = reg.register(1).unwrap();

        reg.fire(Event::Connected);
        reg.fire(Event::Disconnected);

        assert_eq!(rx.try_recv(), Some(Event::Connected));
        assert_eq!(rx.try_recv(), None);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn full_queue_logs_an_error() {
        captured_on_this_thread();
        let reg = registry();
        let mut rx = reg.register(1).unwrap();

        reg.fire(Event::Connected);
        assert!(
            !captured_on_this_thread()
                .iter()
                .any(|(level, _)| *level == Level::Error)
        );

        reg.fire(Event::Disconnected);
        let errors: Vec<String> = captured_on_this_thread()
            .into_iter()
            .filter(|(level, _)| *level == Level::Error)
            .map(|(_, msg)| msg)
            .collect();
        assert_eq!(
            errors,
            vec!["Could not fire disconnected event, receive queue is full".to_string()]
        );
        assert_eq!(rx.try_recv(), Some(Event::Connected));
    }

    #[test]
    fn unlimited_registry_holds_many_live_receivers() {
        let reg = EventRegistry::new(usize::MAX, 8);
        let mut held: Vec<_> = (0..100).map(|_| reg.register(1).unwrap()).collect();
        assert_eq!(reg.len(), 100);

        reg.fire(Event::Connected);
        assert!(held.iter_mut().all(|rx| rx.try_recv() == Some(Event::Connected)));
    }

    #[test]
    fn full_queue_does_not_starve_others() {
        let reg = registry();
        let mut slow = reg.register(1).unwrap();
        let mut fast = reg.register(4).unwrap();

        reg.fire(Event::Connected);
        reg.fire(Event::Disconnected);

        assert_eq!(slow.try_recv(), Some(Event::Connected));
        assert_eq!(slow.try_recv(), None);
        assert_eq!(fast.try_recv(), Some(Event::Connected));
        assert_eq!(fast.try_recv(), Some(Event::Disconnected));
    }

    #[test]
    fn fire_prunes_closed_receivers() {
        let reg = registry();
        let rx = reg.register(1).unwrap();
        let _kept = reg.register(1).unwrap();
        drop(rx);

        reg.fire(Event::Connected);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn fire_with_no_receivers_is_a_no_op() {
        let reg = registry();
        reg.fire(Event::Disconnected);
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn blocking_recv_across_threads() {
        let reg = std::sync::Arc::new(registry());
        let mut rx = reg.register(1).unwrap();

        let firer = {
            let reg = reg.clone();
            std::thread::spawn(move || reg.fire(Event::Connected))
        };

        assert_eq!(rx.blocking_recv(), Some(Event::Connected));
        firer.join().unwrap();
    }

    #[tokio::test]
    async fn recv_timeout_elapses() {
        let reg = registry();
        let mut rx = reg.register(1).unwrap();
        let event = rx.recv_timeout(Duration::from_millis(20)).await;
        assert_eq!(event, None);
    }

    #[tokio::test]
    async fn recv_timeout_returns_queued_event() {
        let reg = registry();
        let mut rx = reg.register(1).unwrap();
        reg.fire(Event::Connected);
        let event = rx.recv_timeout(Duration::from_secs(5)).await;
        assert_eq!(event, Some(Event::Connected));
    }

    #[tokio::test]
    async fn receiver_is_a_stream() {
        let reg = registry();
        let rx = reg.register(4).unwrap();
        reg.fire(Event::Connected);
        reg.fire(Event::Disconnected);
        drop(reg);

        let events: Vec<Event> = rx.collect().await;
        assert_eq!(events, vec![Event::Connected, Event::Disconnected]);
    }
}
