//! Execution contexts the sampling pipeline hops between.
//!
//! A context is anything that runs posted jobs in order: a dedicated worker
//! thread for the render surface or for decode work, or the posting thread
//! itself. Stages take a [`Context`] tagged with the kind of work they do so
//! every hop is visible in the signature.

use std::{
    any::Any,
    fmt, io,
    marker::PhantomData,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crossbeam_channel::{Sender, unbounded};
use thiserror::Error;
use tracing::{debug, error};

/// Unit of work posted to a context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error)]
#[error("execution context {name:?} is closed")]
pub struct ContextClosed {
    pub name: String,
}

/// Something that runs posted jobs in submission order.
pub trait Executor: Send + Sync {
    fn name(&self) -> &str;

    /// Queue `job`. A job that cannot be queued is dropped before returning.
    fn post(&self, job: Job) -> Result<(), ContextClosed>;

    /// Stop waiting for queued work when the executor is dropped.
    fn detach(&self) {}
}

/// Runs every job immediately on the posting thread.
pub struct InlineExecutor {
    name: String,
}

impl InlineExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Executor for InlineExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, job: Job) -> Result<(), ContextClosed> {
        run_job(&self.name, job);
        Ok(())
    }
}

/// Dedicated worker thread draining a job queue.
///
/// Dropping the executor closes the queue, lets the worker finish what was
/// already posted, and joins it. A detached executor skips the join and
/// leaves the worker to exit on its own.
pub struct ThreadExecutor {
    name: String,
    tx: Option<Sender<Job>>,
    handle: Option<thread::JoinHandle<()>>,
    detached: AtomicBool,
}

impl ThreadExecutor {
    pub fn spawn(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let (tx, rx) = unbounded::<Job>();
        let worker_name = name.clone();
        let handle = spawn_thread(name.clone(), move || {
            for job in rx.iter() {
                run_job(&worker_name, job);
            }
            debug!(context = %worker_name, "execution context drained");
        })?;
        Ok(Self {
            name,
            tx: Some(tx),
            handle: Some(handle),
            detached: AtomicBool::new(false),
        })
    }
}

impl Executor for ThreadExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, job: Job) -> Result<(), ContextClosed> {
        let closed = || ContextClosed {
            name: self.name.clone(),
        };
        let tx = self.tx.as_ref().ok_or_else(closed)?;
        tx.send(job).map_err(|_| closed())
    }

    fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }
}

impl Drop for ThreadExecutor {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if self.detached.load(Ordering::SeqCst) {
                debug!(context = %self.name, "execution context detached");
                return;
            }
            // The last handle can be released from a job on the worker itself.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn run_job(context: &str, job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        error!(
            context,
            "job panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Spawn a thread that inherits the current tracing dispatcher.
pub fn spawn_thread<F, T>(name: impl Into<String>, f: F) -> io::Result<thread::JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());
    thread::Builder::new()
        .name(name.into())
        .spawn(move || tracing::dispatcher::with_default(&dispatch, f))
}

/// Kind of work a context is reserved for.
pub trait ContextKind: Send + Sync + 'static {
    const NAME: &'static str;
}

/// The only context allowed to touch render surfaces and render targets.
pub struct Render;

/// Background context for CPU-heavy work such as decoding.
pub struct Compute;

impl ContextKind for Render {
    const NAME: &'static str = "render";
}

impl ContextKind for Compute {
    const NAME: &'static str = "compute";
}

/// Handle to an executor reserved for work of kind `K`.
pub struct Context<K: ContextKind> {
    executor: Arc<dyn Executor>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ContextKind> Context<K> {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            _kind: PhantomData,
        }
    }

    /// Back the context with its own worker thread.
    pub fn threaded(prefix: &str) -> io::Result<Self> {
        let executor = ThreadExecutor::spawn(format!("{prefix}-{}", K::NAME))?;
        Ok(Self::new(Arc::new(executor)))
    }

    /// Run the context's jobs synchronously on whichever thread posts them.
    pub fn inline() -> Self {
        Self::new(Arc::new(InlineExecutor::new(K::NAME)))
    }

    pub fn name(&self) -> &str {
        self.executor.name()
    }

    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> Result<(), ContextClosed> {
        self.executor.post(Box::new(job))
    }

    /// Let the backing executor go without waiting for queued work.
    pub fn detach(&self) {
        self.executor.detach();
    }
}

impl<K: ContextKind> Clone for Context<K> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            _kind: PhantomData,
        }
    }
}

impl<K: ContextKind> fmt::Debug for Context<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("kind", &K::NAME)
            .field("executor", &self.executor.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn inline_runs_before_post_returns() {
        let context = Context::<Compute>::inline();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        context
            .post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn thread_executor_runs_jobs_in_order_and_drains_on_drop() {
        let executor = ThreadExecutor::spawn("test-ordered").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..16 {
            let seen = seen.clone();
            executor
                .post(Box::new(move || seen.lock().unwrap().push(i)))
                .unwrap();
        }
        drop(executor);
        assert_eq!(*seen.lock().unwrap(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn panicking_job_does_not_kill_the_worker() {
        let executor = ThreadExecutor::spawn("test-panic").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        executor.post(Box::new(|| panic!("boom"))).unwrap();
        let counter = hits.clone();
        executor
            .post(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        drop(executor);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detached_executor_does_not_wait_for_a_stuck_job() {
        let executor = ThreadExecutor::spawn("test-detach").unwrap();
        let (release, gate) = crossbeam_channel::bounded::<()>(0);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        executor
            .post(Box::new(move || {
                let _ = gate.recv();
                let _ = done_tx.send(());
            }))
            .unwrap();

        executor.detach();
        let started = std::time::Instant::now();
        drop(executor);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        // The job still runs to completion once unblocked.
        release.send(()).unwrap();
        done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload = panic::catch_unwind(|| panic!("bad {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "bad 7");
    }
}
