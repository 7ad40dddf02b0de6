#![forbid(unsafe_code)]

//! Generation-stamped "latest wins" values.
//!
//! A [`Latest`] cell holds the most recent value of a recomputed quantity
//! (a presentation, a child list). Producers stamp each value with the
//! generation of the request that computed it; a value from an older
//! generation is rejected once a newer one has been published, so observers
//! never regress.
//!
//! Observers that are slower than the producer skip intermediate values:
//! [`Latest::subscribe`] yields only what is current when it is polled.
//!
//! The cell also tracks readiness: [`Latest::ready`] resolves only after the
//! producer declared its first production complete, or after the cell was
//! closed (its owner disposed).

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::watch;

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u64,
    value: Option<T>,
    ready: bool,
    closed: bool,
}

/// Latest-wins reactive cell.
#[derive(Debug)]
pub struct Latest<T> {
    tx: watch::Sender<Slot<T>>,
}

impl<T> Default for Latest<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Latest<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Slot {
            generation: 0,
            value: None,
            ready: false,
            closed: false,
        });
        Self { tx }
    }

    /// Publish `value` computed by `generation`.
    ///
    /// Returns `false` when rejected (older generation, or closed cell).
    pub fn publish(&self, generation: u64, value: T) -> bool {
        self.store(generation, value, false)
    }

    /// Publish `value` and mark the cell ready in one step.
    pub fn publish_ready(&self, generation: u64, value: T) -> bool {
        self.store(generation, value, true)
    }

    fn store(&self, generation: u64, value: T, ready: bool) -> bool {
        let mut accepted = false;
        self.tx.send_if_modified(|slot| {
            if slot.closed || generation < slot.generation {
                return false;
            }
            slot.generation = generation;
            slot.value = Some(value);
            slot.ready |= ready;
            accepted = true;
            true
        });
        if !accepted {
            tracing::trace!(generation, "stale value dropped");
        }
        accepted
    }

    /// Declare the first production complete.
    pub fn mark_ready(&self) {
        self.tx.send_if_modified(|slot| {
            if slot.ready || slot.closed {
                return false;
            }
            slot.ready = true;
            true
        });
    }

    /// Close the cell: waiters resolve, later publishes are rejected.
    pub fn close(&self) {
        self.tx.send_if_modified(|slot| {
            if slot.closed {
                return false;
            }
            slot.closed = true;
            true
        });
    }

    #[must_use]
    pub fn current(&self) -> Option<T> {
        self.tx.borrow().value.clone()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.tx.borrow().ready
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.borrow().closed
    }

    /// Wait for the first completed production, then return the current
    /// value. `None` if the cell closed before any value existed.
    pub async fn ready(&self) -> Option<T> {
        let mut rx = self.tx.subscribe();
        let slot = rx.wait_for(|slot| slot.ready || slot.closed).await.ok()?;
        slot.value.clone()
    }

    /// Stream of values, starting with the current one if any.
    ///
    /// Intermediate values published while the consumer is busy are
    /// skipped. The stream ends when the cell closes.
    #[must_use]
    pub fn subscribe(&self) -> BoxStream<'static, T> {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        stream::unfold(rx, |mut rx| async move {
            loop {
                rx.changed().await.ok()?;
                let (value, closed) = {
                    let slot = rx.borrow_and_update();
                    (slot.value.clone(), slot.closed)
                };
                if closed {
                    return None;
                }
                if let Some(value) = value {
                    return Some((value, rx));
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn older_generation_is_rejected() {
        let cell = Latest::new();
        assert!(cell.publish(2, "new"));
        assert!(!cell.publish(1, "old"));
        assert_eq!(cell.current(), Some("new"));
        assert!(cell.publish(2, "newer"));
        assert_eq!(cell.current(), Some("newer"));
        assert_eq!(cell.generation(), 2);
    }

    #[test]
    fn closed_cell_rejects() {
        let cell = Latest::new();
        cell.publish(1, 1);
        cell.close();
        assert!(!cell.publish(5, 2));
        assert_eq!(cell.current(), Some(1));
    }

    #[tokio::test]
    async fn ready_waits_for_first_production() {
        let cell = Arc::new(Latest::new());
        cell.publish(1, "partial");
        assert!(!cell.is_ready());

        let c = Arc::clone(&cell);
        let waiter = tokio::spawn(async move { c.ready().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        cell.publish(1, "full");
        cell.mark_ready();
        assert_eq!(waiter.await.unwrap(), Some("full"));
    }

    #[tokio::test]
    async fn ready_resolves_none_on_close() {
        let cell: Arc<Latest<u8>> = Arc::new(Latest::new());
        let c = Arc::clone(&cell);
        let waiter = tokio::spawn(async move { c.ready().await });
        cell.close();
        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn subscribe_sees_current_then_latest() {
        let cell = Latest::new();
        cell.publish(1, 10);
        let mut updates = cell.subscribe();
        assert_eq!(updates.next().await, Some(10));
        cell.publish(2, 20);
        cell.publish(3, 30);
        assert_eq!(updates.next().await, Some(30));
        cell.close();
        assert_eq!(updates.next().await, None);
    }
}
