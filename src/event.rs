use futures_channel::oneshot;
use std::collections::VecDeque;

use crate::shared::Shared;

#[derive(Default)]
struct EventInner {
    permits: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Release gate between two tasks.
///
/// Every [`Event::set`] lets exactly one [`Event::wait`] through: the oldest
/// waiter if there is one, otherwise the next task to wait. A monitor gated
/// this way emits its n-th packet only after the n-th `set`, no matter which
/// of the two tasks runs first within a phase.
#[derive(Clone, Default)]
pub struct Event(Shared<EventInner>);

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.with_mut(|inner| {
            while let Some(tx) = inner.waiters.pop_front() {
                // a waiter that was cancelled doesn't use up the release
                if tx.send(()).is_ok() {
                    return;
                }
            }
            inner.permits += 1;
        })
    }

    pub async fn wait(&self) {
        let rx = self.0.with_mut(|inner| {
            if inner.permits > 0 {
                inner.permits -= 1;
                return None;
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(tx);
            Some(rx)
        });
        if let Some(rx) = rx {
            // the event was dropped with us still waiting; nothing can release us later
            let _ = rx.await;
        }
    }

    /// Releases handed out by `set` that no task has waited for yet.
    pub fn pending(&self) -> usize {
        self.0.get().permits
    }

    pub fn waiting(&self) -> usize {
        self.0.get().waiters.len()
    }
}
