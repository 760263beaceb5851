//! Live queries.
//!
//! A [`LiveQuery`] owns a background task that re-runs a query whenever the
//! backend hints that its collection changed, and otherwise on a fixed
//! interval. Results are published on a watch channel only when they differ
//! from the previous snapshot. Dropping the handle stops the task.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use unimart_shared::types::Record;

use crate::document::decode;
use crate::query::Query;
use crate::traits::Backend;

/// What a subscriber currently sees.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot<T> {
    Loading,
    Ready(Vec<T>),
    Failed(String),
}

/// Post-processing applied to every result set before it is published,
/// e.g. filtering or an in-memory sort.
pub type Shape<T> = Box<dyn Fn(Vec<T>) -> Vec<T> + Send + Sync>;

pub struct LiveQuery<T> {
    rx: watch::Receiver<Snapshot<T>>,
    task: JoinHandle<()>,
}

impl<T> LiveQuery<T>
where
    T: Record + Clone + PartialEq,
{
    pub fn spawn(
        backend: Arc<dyn Backend>,
        query: Query,
        shape: Option<Shape<T>>,
        interval: Duration,
    ) -> Self {
        let (tx, rx) = watch::channel(Snapshot::Loading);
        let task = tokio::spawn(run(backend, query, shape, interval, tx));
        Self { rx, task }
    }

    pub fn current(&self) -> Snapshot<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published snapshot. `None` once the task is gone.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the query has produced a result, successful or not.
    pub async fn next_ready(&mut self) -> Result<Vec<T>, String> {
        self.wait_for(|_| true).await
    }

    /// Wait for a successful result satisfying `pred`. A failed snapshot
    /// ends the wait.
    pub async fn wait_for(&mut self, pred: impl Fn(&[T]) -> bool) -> Result<Vec<T>, String> {
        loop {
            let snapshot = self.rx.borrow_and_update().clone();
            match snapshot {
                Snapshot::Ready(items) if pred(&items) => return Ok(items),
                Snapshot::Failed(message) => return Err(message),
                _ => {}
            }
            if self.rx.changed().await.is_err() {
                return Err("live query stopped".into());
            }
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<T>(
    backend: Arc<dyn Backend>,
    query: Query,
    shape: Option<Shape<T>>,
    interval: Duration,
    tx: watch::Sender<Snapshot<T>>,
) where
    T: Record + Clone + PartialEq,
{
    let mut feed = backend.change_feed();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!(collection = %query.collection, backend = backend.name(), "live query started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            hint = next_hint(&mut feed) => {
                if hint.is_some_and(|c| c != query.collection) {
                    continue;
                }
            }
            _ = tx.closed() => break,
        }

        let next = match fetch(backend.as_ref(), &query, shape.as_ref()).await {
            Ok(items) => Snapshot::Ready(items),
            Err(e) => {
                warn!(collection = %query.collection, "live query failed: {e}");
                Snapshot::Failed(e.to_string())
            }
        };

        tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    debug!(collection = %query.collection, "live query stopped");
}

/// The next collection hint from the change feed. `None` means "something
/// may have changed" (the feed lagged). Never resolves without a feed.
async fn next_hint(feed: &mut Option<broadcast::Receiver<String>>) -> Option<String> {
    loop {
        let res = match feed {
            Some(rx) => rx.recv().await,
            None => return future::pending().await,
        };
        match res {
            Ok(collection) => return Some(collection),
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "change feed lagged");
                return None;
            }
            Err(RecvError::Closed) => *feed = None,
        }
    }
}

async fn fetch<T: Record>(
    backend: &dyn Backend,
    query: &Query,
    shape: Option<&Shape<T>>,
) -> crate::Result<Vec<T>> {
    let docs = backend.query(query).await?;
    let mut items = Vec::with_capacity(docs.len());
    for doc in docs {
        let id = doc.id.clone();
        match decode::<T>(doc) {
            Ok(item) => items.push(item),
            Err(e) => warn!(collection = %query.collection, id = %id, "skipping malformed document: {e}"),
        }
    }
    Ok(match shape {
        Some(shape) => shape(items),
        None => items,
    })
}
