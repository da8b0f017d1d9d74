//! Delivery of decoded symbols to subscribers.
//!
//! The reporter lives with the reader, so subscribers are always invoked on
//! the thread that drives the reader. Empty result sets are never delivered.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use symbology::SymbolResult;
use tracing::{debug, error};
use video_ingest::exec::panic_message;

/// Handle returned by the subscribe calls, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

pub type SymbolCallback = Box<dyn FnMut(&[SymbolResult]) + Send + 'static>;

enum Subscriber {
    Callback(SymbolCallback),
    Channel(Sender<Vec<SymbolResult>>),
}

#[derive(Default)]
pub struct ResultReporter {
    next_id: u64,
    subscribers: Vec<(SubscriberId, Subscriber)>,
}

impl ResultReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked with every non-empty result set.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriberId
    where
        F: FnMut(&[SymbolResult]) + Send + 'static,
    {
        self.push(Subscriber::Callback(Box::new(callback)))
    }

    /// Register a channel receiving every non-empty result set.
    ///
    /// The subscription is dropped automatically once the receiver is gone.
    pub fn subscribe_channel(&mut self) -> (SubscriberId, Receiver<Vec<SymbolResult>>) {
        let (tx, rx) = unbounded();
        (self.push(Subscriber::Channel(tx)), rx)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Hand `results` to every subscriber; returns how many received them.
    pub fn report(&mut self, results: Vec<SymbolResult>) -> usize {
        if results.is_empty() {
            return 0;
        }
        let mut delivered = 0;
        self.subscribers.retain_mut(|(id, subscriber)| match subscriber {
            Subscriber::Callback(callback) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(&results)));
                match outcome {
                    Ok(()) => delivered += 1,
                    Err(payload) => error!(
                        subscriber = id.0,
                        "result callback panicked: {}",
                        panic_message(payload.as_ref())
                    ),
                }
                true
            }
            Subscriber::Channel(tx) => match tx.send(results.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    debug!(subscriber = id.0, "result receiver dropped; unsubscribing");
                    false
                }
            },
        });
        delivered
    }

    fn push(&mut self, subscriber: Subscriber) -> SubscriberId {
        self.next_id += 1;
        let id = SubscriberId(self.next_id);
        self.subscribers.push((id, subscriber));
        id
    }
}

impl fmt::Debug for ResultReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultReporter")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
