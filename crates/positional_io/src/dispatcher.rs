// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::pin::Pin;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::task::{Context, Poll};
use core::time::Duration;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{Level, event};

const MAX_WORKERS: usize = 4;
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

struct DispatcherInner {
    sender: flume::Sender<async_task::Runnable>,
    receiver: flume::Receiver<async_task::Runnable>,
    worker_count: AtomicUsize,
    pending_count: AtomicUsize,
}

/// A thread pool that executes blocking positional syscalls on behalf of the
/// async API.
///
/// Handing a `pread`/`pwrite` to a worker is what lets the calling task
/// release its scheduling claim for the syscall's duration: the task suspends
/// at the returned future while other tasks keep running, and resumes once
/// the worker finishes the call.
///
/// The pool starts with a single worker and scales up to [`MAX_WORKERS`] when
/// the pending-operation count exceeds the current worker count. Idle workers
/// scale back down after [`IDLE_TIMEOUT`].
#[derive(Clone)]
pub(crate) struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Creates a new dispatcher with one initial worker thread.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        let dispatcher = Self {
            inner: Arc::new(DispatcherInner {
                sender,
                receiver,
                worker_count: AtomicUsize::new(1),
                pending_count: AtomicUsize::new(0),
            }),
        };
        Self::spawn_worker(&dispatcher.inner);
        dispatcher
    }

    /// The process-wide dispatcher shared by every file resource.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<Dispatcher> = OnceLock::new();
        GLOBAL.get_or_init(Self::new).clone()
    }

    /// Dispatches a blocking operation to a worker thread.
    ///
    /// Returns a future that resolves to the operation's return value. If the
    /// closure panics, the panic is forwarded to the caller. Dropping the
    /// future abandons the result; a closure already running on a worker
    /// still runs to completion there, so RAII guards acquired inside it are
    /// always released.
    pub fn dispatch<T: Send + 'static>(&self, f: impl FnOnce() -> T + Send + 'static) -> DispatchFuture<T> {
        let (runnable, task) = async_task::spawn(
            async move { std::panic::catch_unwind(core::panic::AssertUnwindSafe(f)) },
            self.schedule_fn(),
        );
        self.bump_pending();
        runnable.schedule();
        DispatchFuture { task }
    }

    /// Dispatches a blocking operation that may borrow from the caller.
    ///
    /// Like [`dispatch`](Self::dispatch), but the returned future **blocks on
    /// drop** until the closure has completed or is known to never start.
    /// This guarantees that data borrowed via raw pointers in the closure
    /// remains valid for the closure's entire execution, even when the future
    /// is cancelled.
    ///
    /// # Safety
    ///
    /// The closure may capture raw pointers to caller-owned data. The caller
    /// must ensure those pointers are derived from data that lives at least
    /// until the returned [`ScopedDispatchFuture`] is dropped.
    pub fn dispatch_scoped<T: Send + 'static>(&self, f: impl FnOnce() -> T + Send + 'static) -> ScopedDispatchFuture<T> {
        let (done_tx, done_rx) = flume::bounded(1);
        let signal = SignalOnDrop(Some(done_tx));
        let (runnable, task) = async_task::spawn(
            async move {
                let result = std::panic::catch_unwind(core::panic::AssertUnwindSafe(f));
                drop(signal);
                result
            },
            self.schedule_fn(),
        );
        self.bump_pending();
        runnable.schedule();
        ScopedDispatchFuture { task, done_rx }
    }

    fn schedule_fn(&self) -> impl Fn(async_task::Runnable) + Send + Sync + 'static {
        let sender = self.inner.sender.clone();
        move |runnable| {
            let _ = sender.send(runnable);
        }
    }

    /// Records one more pending operation, growing the pool if the queue is
    /// backing up.
    fn bump_pending(&self) {
        let prev_pending = self.inner.pending_count.fetch_add(1, Ordering::Relaxed);
        let workers = self.inner.worker_count.load(Ordering::Acquire);
        if prev_pending >= workers
            && workers < MAX_WORKERS
            && self
                .inner
                .worker_count
                .compare_exchange(workers, workers + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            event!(Level::DEBUG, workers = workers + 1, "scaling up i/o worker pool");
            Self::spawn_worker(&self.inner);
        }
    }

    fn spawn_worker(inner: &Arc<DispatcherInner>) {
        let inner = Arc::clone(inner);
        let _ = std::thread::Builder::new()
            .name("positional-io".into())
            .spawn(move || {
                Self::worker_loop(&inner);
            })
            .expect("failed to spawn i/o worker thread");
    }

    fn worker_loop(inner: &DispatcherInner) {
        loop {
            match inner.receiver.recv_timeout(IDLE_TIMEOUT) {
                Ok(runnable) => {
                    let _ = runnable.run();
                    let _ = inner.pending_count.fetch_sub(1, Ordering::Relaxed);
                }
                Err(flume::RecvTimeoutError::Timeout) => {
                    // Scale down: CAS ensures at least one worker remains.
                    let mut count = inner.worker_count.load(Ordering::Relaxed);
                    while count > 1 {
                        match inner
                            .worker_count
                            .compare_exchange_weak(count, count - 1, Ordering::AcqRel, Ordering::Relaxed)
                        {
                            Ok(_) => return,
                            Err(actual) => count = actual,
                        }
                    }
                    // Last worker keeps running.
                }
                Err(flume::RecvTimeoutError::Disconnected) => {
                    let _ = inner.worker_count.fetch_sub(1, Ordering::AcqRel);
                    return;
                }
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("workers", &self.inner.worker_count.load(Ordering::Relaxed))
            .field("pending", &self.inner.pending_count.load(Ordering::Relaxed))
            .finish()
    }
}

/// A future that resolves to the result of a dispatched operation.
///
/// If the worker thread panics, the original panic is re-raised on the
/// calling task via [`std::panic::resume_unwind`].
pub(crate) struct DispatchFuture<T> {
    task: async_task::Task<std::thread::Result<T>>,
}

impl<T> Future for DispatchFuture<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        match Pin::new(&mut this.task).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            Poll::Ready(Err(payload)) => {
                // Re-raise the original panic from the worker thread.
                std::panic::resume_unwind(payload);
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Sends a completion signal when dropped, whether the closure completed
/// normally or the task was cancelled before it ran.
struct SignalOnDrop(Option<flume::Sender<()>>);

impl Drop for SignalOnDrop {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

/// A cancellation-safe dispatch future for operations that borrow from the
/// caller via raw pointers.
///
/// If this future is dropped before the dispatched closure completes, the
/// destructor **blocks the current thread** until the closure finishes. This
/// guarantees that any caller-owned data referenced by raw pointers in the
/// closure remains valid for the closure's entire execution.
///
/// In the normal (non-cancelled) path, the future resolves asynchronously
/// with zero blocking.
pub(crate) struct ScopedDispatchFuture<T> {
    task: async_task::Task<std::thread::Result<T>>,
    done_rx: flume::Receiver<()>,
}

impl<T> Future for ScopedDispatchFuture<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        match Pin::new(&mut this.task).poll(cx) {
            Poll::Ready(Ok(value)) => {
                // Drain the signal so Drop doesn't block.
                let _ = this.done_rx.try_recv();
                Poll::Ready(value)
            }
            Poll::Ready(Err(payload)) => {
                let _ = this.done_rx.try_recv();
                std::panic::resume_unwind(payload);
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for ScopedDispatchFuture<T> {
    fn drop(&mut self) {
        // Block until the closure signals completion (or confirms it was
        // never started). The caller's borrowed data cannot be freed until
        // the worker is done with it.
        let _ = self.done_rx.recv();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#[allow(clippy::panic, reason = "Tests exercise panic forwarding")]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;

    use futures_lite::future::block_on;

    use super::*;

    #[test]
    fn dispatch_runs_the_closure_and_returns_its_value() {
        let dispatcher = Dispatcher::new();
        let value = block_on(dispatcher.dispatch(|| 40 + 2));
        assert_eq!(value, 42);
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn worker_panics_are_forwarded() {
        let dispatcher = Dispatcher::new();
        block_on(dispatcher.dispatch(|| panic!("boom")));
    }

    #[test]
    fn dropping_a_scoped_future_waits_for_the_closure() {
        let dispatcher = Dispatcher::new();
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();

        let flag = Arc::clone(&finished);
        let future = dispatcher.dispatch_scoped(move || {
            started_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
        });

        // Ensure the closure is actually running before cancelling.
        started_rx.recv().unwrap();
        drop(future);
        assert!(finished.load(Ordering::SeqCst));
    }
}
