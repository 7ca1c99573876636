use futures::{
    future::{FutureExt, LocalBoxFuture},
    task::{waker_ref, ArcWake, Context, Poll},
};
use futures_channel::oneshot;
use intmap::IntMap;
use log::trace;
use queues::{IsQueue, Queue};
use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::Pin,
    rc::Rc,
    sync::{Arc, Mutex},
};

type ReadyQueue = Arc<Mutex<Queue<u64>>>;

// Wakers must be Send + Sync, so they only carry the task id. The futures themselves
// never leave the kernel thread.
struct TaskWaker {
    id: u64,
    ready: ReadyQueue,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self
            .ready
            .lock()
            .unwrap()
            .add(arc_self.id)
            .expect("Error queueing task.");
    }
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum TaskState {
    Pending,
    Done,
    Cancelled,
}

pub(crate) struct Task {
    future: RefCell<Option<LocalBoxFuture<'static, ()>>>,
    state: Cell<TaskState>,
    name: String,
    waker: Arc<TaskWaker>,
}

impl Task {
    fn cancel(&self) {
        // dropping the future drops the join sender, so awaiting handles resolve to None
        self.state.set(TaskState::Cancelled);
        self.future.borrow_mut().take();
        // reschedule so the executor forgets about it
        ArcWake::wake_by_ref(&self.waker);
    }
}

pub(crate) struct Executor {
    tasks: RefCell<IntMap<Rc<Task>>>,
    ready: ReadyQueue,
    next_id: Cell<u64>,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            tasks: RefCell::new(IntMap::new()),
            ready: Arc::new(Mutex::new(Queue::new())),
            next_id: Cell::new(0),
        }
    }

    pub fn spawn<T: 'static>(
        &self,
        name: &str,
        future: impl Future<Output = T> + 'static,
    ) -> JoinHandle<T> {
        let (tx, rx) = oneshot::channel::<T>();
        let wrapped = async move {
            let _ = tx.send(future.await);
        }
        .boxed_local();

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let task = Rc::new(Task {
            future: RefCell::new(Some(wrapped)),
            state: Cell::new(TaskState::Pending),
            name: name.to_string(),
            waker: Arc::new(TaskWaker {
                id,
                ready: self.ready.clone(),
            }),
        });
        self.tasks.borrow_mut().insert(id, task.clone());
        ArcWake::wake_by_ref(&task.waker);
        JoinHandle {
            task: Some(task),
            rx,
        }
    }

    /// Polls scheduled tasks until none are left ready.
    #[inline]
    pub fn run_once(&self) {
        loop {
            let next = self.ready.lock().unwrap().remove().ok();
            match next {
                Some(id) => self.process_task(id),
                None => break,
            }
        }
    }

    #[inline]
    fn process_task(&self, id: u64) {
        // A task may be queued again after it finished; nothing to do then.
        let task = match self.tasks.borrow().get(id) {
            Some(task) => task.clone(),
            None => return,
        };
        if task.state.get() == TaskState::Cancelled {
            self.tasks.borrow_mut().remove(id);
            return;
        }

        let fut = task.future.borrow_mut().take();
        if let Some(mut fut) = fut {
            let waker = waker_ref(&task.waker);
            let context = &mut Context::from_waker(&waker);
            match fut.as_mut().poll(context) {
                Poll::Pending => {
                    // the task might have cancelled itself while running
                    if task.state.get() == TaskState::Pending {
                        *task.future.borrow_mut() = Some(fut);
                    }
                }
                Poll::Ready(()) => {
                    trace!("task '{}' complete", task.name);
                    task.state.set(TaskState::Done);
                    self.tasks.borrow_mut().remove(id);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Cancels every task and forgets anything still scheduled.
    pub fn clear(&self) {
        let tasks: Vec<Rc<Task>> = self.tasks.borrow_mut().drain().map(|(_, t)| t).collect();
        for task in tasks {
            task.cancel();
        }
        *self.ready.lock().unwrap() = Queue::new();
    }
}

pub struct JoinHandle<T> {
    task: Option<Rc<Task>>,
    rx: oneshot::Receiver<T>,
}

impl<T> JoinHandle<T> {
    pub fn cancel(mut self) {
        // take the task, cancel it and drop the reference
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task
            .as_ref()
            .map_or(true, |t| t.state.get() != TaskState::Pending)
    }

    /// Non-blocking check: `Some(Some(v))` once the task returned, `Some(None)` if it
    /// was cancelled, `None` while it is still running.
    pub fn try_take(&mut self) -> Option<Option<T>> {
        match self.rx.try_recv() {
            Ok(Some(value)) => Some(Some(value)),
            Ok(None) => None,
            Err(_) => Some(None),
        }
    }
}

impl<T> Future for JoinHandle<T> {
    /// `None` if the task was cancelled before it returned.
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.rx.poll_unpin(cx).map(|result| result.ok())
    }
}
