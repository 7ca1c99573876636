use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::sim::Sim;

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum TrigKind {
    RisingEdge,
    ReadOnly,
}

#[derive(Debug, Clone)]
struct TrigShared {
    waker: Waker,
    fired: Rc<Cell<bool>>,
}

/// Tasks waiting for the next rising edge or read-only phase.
pub(crate) struct TriggerLists {
    rising: RefCell<VecDeque<TrigShared>>,
    read_only: RefCell<VecDeque<TrigShared>>,
}

impl TriggerLists {
    pub fn new() -> Self {
        Self {
            rising: RefCell::new(VecDeque::new()),
            read_only: RefCell::new(VecDeque::new()),
        }
    }

    fn list(&self, kind: TrigKind) -> &RefCell<VecDeque<TrigShared>> {
        match kind {
            TrigKind::RisingEdge => &self.rising,
            TrigKind::ReadOnly => &self.read_only,
        }
    }

    pub fn clear(&self) {
        self.rising.borrow_mut().clear();
        self.read_only.borrow_mut().clear();
    }

    pub fn pending(&self, kind: TrigKind) -> usize {
        self.list(kind).borrow().len()
    }
}

/// Wakes every task that awaited `kind` before this call. Tasks that register while
/// they run are served by the next occurrence.
pub(crate) fn react(lists: &TriggerLists, kind: TrigKind) {
    let woken = std::mem::take(&mut *lists.list(kind).borrow_mut());
    for shared in woken {
        shared.fired.set(true);
        shared.waker.wake();
    }
}

pub struct Trigger {
    sim: Sim,
    kind: TrigKind,
    fired: Option<Rc<Cell<bool>>>,
}

impl Trigger {
    pub fn rising_edge(sim: &Sim) -> Self {
        Trigger {
            sim: sim.clone(),
            kind: TrigKind::RisingEdge,
            fired: None,
        }
    }
    pub fn read_only(sim: &Sim) -> Self {
        Trigger {
            sim: sim.clone(),
            kind: TrigKind::ReadOnly,
            fired: None,
        }
    }
    pub fn kind(&self) -> TrigKind {
        self.kind
    }
}

impl Future for Trigger {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &self.fired {
            Some(fired) if fired.get() => Poll::Ready(()),
            // polled again before the trigger fired, keep waiting
            Some(_) => Poll::Pending,
            None => {
                let fired = Rc::new(Cell::new(false));
                let shared = TrigShared {
                    waker: cx.waker().clone(),
                    fired: fired.clone(),
                };
                self.sim
                    .triggers()
                    .list(self.kind)
                    .borrow_mut()
                    .push_back(shared);
                self.fired = Some(fired);
                Poll::Pending
            }
        }
    }
}
