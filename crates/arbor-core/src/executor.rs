#![forbid(unsafe_code)]

//! Foreground and background executors.
//!
//! The tree model runs on two executors:
//!
//! - [`Foreground`]: a single dedicated thread draining a FIFO job queue.
//!   Everything that touches the widget-facing mirror (structural events,
//!   listener callbacks, lifecycle publication) runs here, strictly in
//!   submission order.
//! - [`Background`]: tokio tasks gated by a counting semaphore, used for
//!   domain computations and background visitor decisions.
//!
//! Both are passed around explicitly as an [`Executors`] bundle; nothing in
//! the crates reaches for a global executor.
//!
//! A panicking foreground job is caught and logged; the thread keeps serving
//! the queue.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, oneshot};

use crate::config::TreeModelConfig;
use crate::error::{ExecutorError, panic_message};
use crate::scope::Scope;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Command {
    Run(Job),
    Shutdown,
}

// ============================================================================
// Foreground
// ============================================================================

struct ForegroundInner {
    name: String,
    sender: mpsc::Sender<Command>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ForegroundInner {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(handle) = self.handle.lock().take() {
            // The last handle may be released by a job on the thread itself.
            if thread::current().id() != self.thread_id {
                let _ = handle.join();
            }
        }
    }
}

/// Serial executor backed by one dedicated thread.
#[derive(Clone)]
pub struct Foreground {
    inner: Arc<ForegroundInner>,
}

impl Foreground {
    /// Spawn the foreground thread.
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let (tx, rx) = mpsc::channel::<Command>();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || foreground_loop(rx))?;
        let thread_id = handle.thread().id();
        tracing::debug!(thread = %name, "foreground executor started");
        Ok(Self {
            inner: Arc::new(ForegroundInner {
                name,
                sender: tx,
                thread_id,
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the caller is running on the foreground thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// Enqueue `job` without waiting for it.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) -> Result<(), ExecutorError> {
        self.inner
            .sender
            .send(Command::Run(Box::new(job)))
            .map_err(|_| ExecutorError::Shutdown)
    }

    /// Run `f` on the foreground thread and await its result.
    pub async fn run<R, F>(&self, f: F) -> Result<R, ExecutorError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.dispatch(move || {
            let result = catch_unwind(AssertUnwindSafe(f))
                .map_err(|payload| ExecutorError::Panicked(panic_message(payload.as_ref())));
            let _ = tx.send(result);
        })?;
        rx.await.map_err(|_| ExecutorError::Shutdown)?
    }

    /// Resolve once every job enqueued before this call has run.
    pub async fn flush(&self) -> Result<(), ExecutorError> {
        self.run(|| ()).await
    }
}

impl std::fmt::Debug for Foreground {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Foreground")
            .field("name", &self.inner.name)
            .finish()
    }
}

fn foreground_loop(rx: mpsc::Receiver<Command>) {
    while let Ok(command) = rx.recv() {
        match command {
            Command::Run(job) => {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                    tracing::error!(
                        panic = %panic_message(payload.as_ref()),
                        "foreground job panicked"
                    );
                }
            }
            Command::Shutdown => break,
        }
    }
    tracing::debug!("foreground executor stopped");
}

// ============================================================================
// Background
// ============================================================================

/// Semaphore-gated background task pool.
///
/// Owns a runtime [`Handle`] so tasks can be started from threads that are
/// not runtime workers (the foreground thread in particular).
#[derive(Clone, Debug)]
pub struct Background {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    runtime: Handle,
}

impl Background {
    /// Create a pool allowing `max_concurrency` concurrent computations
    /// (at least one), spawning onto `runtime`.
    #[must_use]
    pub fn new(max_concurrency: usize, runtime: Handle) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            runtime,
        }
    }

    /// Pool bound to the runtime of the calling context.
    pub fn current(max_concurrency: usize) -> Result<Self, ExecutorError> {
        let runtime = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;
        Ok(Self::new(max_concurrency, runtime))
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    #[must_use]
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Wait for a permit. `None` if `scope` is cancelled first.
    pub async fn acquire(&self, scope: &Scope) -> Option<OwnedSemaphorePermit> {
        let semaphore = Arc::clone(&self.semaphore);
        scope
            .run(semaphore.acquire_owned())
            .await
            .and_then(Result::ok)
    }

    /// Run `fut` while holding a permit, bound to `scope`.
    pub async fn run<F>(&self, scope: &Scope, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        let _permit = self.acquire(scope).await?;
        scope.run(fut).await
    }

    /// Spawn `fut` as a permit-holding task bound to `scope`.
    pub fn spawn<F>(&self, scope: &Scope, fut: F) -> tokio::task::JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let this = self.clone();
        let scope = scope.clone();
        self.runtime
            .spawn(async move { this.run(&scope, fut).await })
    }

    /// Spawn `fut` bound to `scope` without taking a permit.
    ///
    /// For coordination tasks that acquire permits around their own
    /// domain calls.
    pub fn spawn_scoped<F>(&self, scope: &Scope, fut: F) -> tokio::task::JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let scope = scope.clone();
        self.runtime.spawn(async move { scope.run(fut).await })
    }
}

// ============================================================================
// Executors
// ============================================================================

/// Executor bundle handed to the view model, adapter and walker.
#[derive(Clone, Debug)]
pub struct Executors {
    pub foreground: Foreground,
    pub background: Background,
}

impl Executors {
    #[must_use]
    pub fn new(foreground: Foreground, background: Background) -> Self {
        Self {
            foreground,
            background,
        }
    }

    /// Spawn a foreground thread and size the background pool from
    /// `config`. Must be called from within a tokio runtime.
    pub fn from_config(config: &TreeModelConfig) -> Result<Self, ExecutorError> {
        let background = Background::current(config.max_concurrency)?;
        let foreground = Foreground::new(config.foreground_thread_name.clone())
            .map_err(|e| ExecutorError::Spawn(e.to_string()))?;
        Ok(Self {
            foreground,
            background,
        })
    }
}
