//! Stateless pub-sub plumbing for ledger events.
//!
//! Components subscribe to ledger events (commission credited, dispute opened, and so on) and
//! react to them without any access to ledger internals. A handler receives the event value and
//! nothing else. Handlers run as detached tasks, so a slow hook never stalls webhook processing.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use log::*;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size);
        Self { listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every subscribed producer has been dropped, then drains any in-flight handler
    /// tasks before returning.
    pub async fn start_handler(mut self) {
        debug!("📣️ Event handler running");
        // The handler holds a sender only so that `subscribe` can hand out clones. Dropping it
        // here means the recv loop ends as soon as the last producer goes away.
        drop(self.sender);
        let in_flight = Arc::new(AtomicUsize::new(0));
        while let Some(event) = self.listener.recv().await {
            let hook = Arc::clone(&self.handler);
            let count = Arc::clone(&in_flight);
            count.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                (hook)(event).await;
                count.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while in_flight.load(Ordering::SeqCst) > 0 {
            trace!("📣️ Waiting on {} hook tasks before shutdown", in_flight.load(Ordering::SeqCst));
            tokio::time::sleep(tokio::time::Duration::from_millis(250)).await;
        }
        debug!("📣️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📣️ Failed to publish event: {e}");
        }
    }
}
