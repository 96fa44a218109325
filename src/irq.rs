//! # DIO0 Interrupt Handling
//!
//! The SX127x signals both completion conditions - packet sent and packet
//! received - on the single DIO0 line. Which condition the edge means is
//! decided by whichever mapping the driver last armed, tracked here as
//! [`Dio0Trigger`].
//!
//! ## Architecture
//!
//! The GPIO edge callback runs in interrupt-delivery context where bus I/O
//! is off limits, so it does exactly one thing: send a wake token to a
//! dedicated worker task. The worker resolves the armed trigger, latches the
//! matching completion flag, and invokes the registered callback (if any)
//! with the completion reason - always outside interrupt context, at most
//! one invocation in flight.
//!
//! ## Usage Pattern
//!
//! 1. Driver arms a trigger (`TxDone` or `RxDone`) and programs the DIO0
//!    mapping register before starting the operation
//! 2. Radio raises DIO0; the edge callback wakes the worker
//! 3. Worker latches `tx_done`/`rx_done` and dispatches the callback
//! 4. Owner thread observes completion by callback or by polling the flags

use log::{debug, warn};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Completion condition currently armed on the DIO0 line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Dio0Trigger {
    /// DIO0 unmapped; edges are ignored
    None = 0,
    /// DIO0 rises when a packet has been received
    RxDone = 1,
    /// DIO0 rises when a packet has been sent
    TxDone = 2,
}

/// Completion reason delivered to the registered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent {
    /// A packet finished transmitting
    TxDone,
    /// A packet arrived and is waiting in the FIFO
    RxDone,
}

/// Completion handler invoked by the event worker
pub type EventCallback = Box<dyn FnMut(RadioEvent) + Send>;

/// State shared between the owning driver and the event worker.
///
/// The worker touches only the completion flags and the callback; every
/// other piece of driver state stays exclusively with the owner thread.
#[derive(Default)]
pub(crate) struct EventState {
    trigger: AtomicU8,
    tx_done: AtomicBool,
    rx_done: AtomicBool,
    callback: Mutex<Option<EventCallback>>,
}

impl EventState {
    pub(crate) fn set_trigger(&self, trigger: Dio0Trigger) {
        self.trigger.store(trigger as u8, Ordering::SeqCst);
    }

    pub(crate) fn trigger(&self) -> Dio0Trigger {
        match self.trigger.load(Ordering::SeqCst) {
            1 => Dio0Trigger::RxDone,
            2 => Dio0Trigger::TxDone,
            _ => Dio0Trigger::None,
        }
    }

    pub(crate) fn clear_tx_done(&self) {
        self.tx_done.store(false, Ordering::SeqCst);
    }

    pub(crate) fn clear_rx_done(&self) {
        self.rx_done.store(false, Ordering::SeqCst);
    }

    pub(crate) fn tx_done(&self) -> bool {
        self.tx_done.load(Ordering::SeqCst)
    }

    pub(crate) fn rx_done(&self) -> bool {
        self.rx_done.load(Ordering::SeqCst)
    }

    pub(crate) fn set_callback(&self, callback: Option<EventCallback>) {
        *self.callback.lock().unwrap() = callback;
    }

    /// Resolve a DIO0 edge against the armed trigger.
    fn handle_dio0(&self) {
        let event = match self.trigger() {
            Dio0Trigger::RxDone => {
                self.rx_done.store(true, Ordering::SeqCst);
                RadioEvent::RxDone
            }
            Dio0Trigger::TxDone => {
                self.tx_done.store(true, Ordering::SeqCst);
                RadioEvent::TxDone
            }
            Dio0Trigger::None => return,
        };
        if let Some(callback) = self.callback.lock().unwrap().as_mut() {
            callback(event);
        }
    }
}

/// Handle passed to the GPIO edge callback: a counting, interrupt-safe wake.
#[derive(Clone)]
pub struct Dio0Waker {
    wake_tx: mpsc::UnboundedSender<()>,
}

impl Dio0Waker {
    /// Wake the event worker. Safe to call from the edge-delivery context;
    /// performs no I/O and never blocks.
    pub fn wake(&self) {
        let _ = self.wake_tx.send(());
    }
}

/// Per-instance worker task bridging the DIO0 line to user-visible events.
pub struct EventNotifier {
    wake_tx: mpsc::UnboundedSender<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    worker: Option<tokio::task::JoinHandle<()>>,
}

impl EventNotifier {
    /// Spawn the worker task over the shared event state. Requires a running
    /// tokio runtime.
    pub(crate) fn spawn(state: Arc<EventState>) -> Self {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = tokio::spawn(worker_loop(state, wake_rx, shutdown_rx));
        Self {
            wake_tx,
            shutdown_tx: Some(shutdown_tx),
            worker: Some(worker),
        }
    }

    /// Wake handle for the GPIO edge callback
    pub fn waker(&self) -> Dio0Waker {
        Dio0Waker {
            wake_tx: self.wake_tx.clone(),
        }
    }

    /// Gracefully stop the worker task.
    pub async fn shutdown(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            if tokio::time::timeout(Duration::from_secs(1), worker)
                .await
                .is_err()
            {
                warn!("DIO0 event worker did not stop in time");
            }
        }
    }
}

impl Drop for EventNotifier {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

async fn worker_loop(
    state: Arc<EventState>,
    mut wake_rx: mpsc::UnboundedReceiver<()>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("DIO0 event worker started");
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            wake = wake_rx.recv() => match wake {
                Some(()) => state.handle_dio0(),
                None => break,
            },
        }
    }
    debug!("DIO0 event worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn edge_with_rx_trigger_latches_flag_and_dispatches() {
        let state = Arc::new(EventState::default());
        let notifier = EventNotifier::spawn(state.clone());
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        state.set_callback(Some(Box::new(move |event| {
            event_tx.send(event).unwrap();
        })));
        state.set_trigger(Dio0Trigger::RxDone);

        notifier.waker().wake();

        let event = tokio::time::timeout(Duration::from_secs(1), event_rx.recv())
            .await
            .expect("worker never dispatched")
            .unwrap();
        assert_eq!(event, RadioEvent::RxDone);
        assert!(state.rx_done());
        assert!(!state.tx_done());

        notifier.shutdown().await;
    }

    #[tokio::test]
    async fn edge_with_tx_trigger_latches_tx_flag() {
        let state = Arc::new(EventState::default());
        let notifier = EventNotifier::spawn(state.clone());
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        state.set_callback(Some(Box::new(move |event| {
            event_tx.send(event).unwrap();
        })));
        state.set_trigger(Dio0Trigger::TxDone);

        notifier.waker().wake();

        let event = tokio::time::timeout(Duration::from_secs(1), event_rx.recv())
            .await
            .expect("worker never dispatched")
            .unwrap();
        assert_eq!(event, RadioEvent::TxDone);
        assert!(state.tx_done());

        notifier.shutdown().await;
    }

    #[tokio::test]
    async fn edge_without_armed_trigger_is_ignored() {
        let state = Arc::new(EventState::default());
        let notifier = EventNotifier::spawn(state.clone());
        state.set_trigger(Dio0Trigger::None);

        notifier.waker().wake();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!state.tx_done());
        assert!(!state.rx_done());
        notifier.shutdown().await;
    }

    #[tokio::test]
    async fn completion_is_observable_without_a_callback() {
        let state = Arc::new(EventState::default());
        let notifier = EventNotifier::spawn(state.clone());
        state.set_trigger(Dio0Trigger::RxDone);

        notifier.waker().wake();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(state.rx_done());
        notifier.shutdown().await;
    }
}
