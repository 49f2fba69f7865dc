//! Where reads run and how their results come back.
//!
//! Every read completes exactly once through a [`ReadHandle`]. The work itself is handed to an
//! [`Executor`], so a UI can keep the default thread-per-read model, an async application can
//! reuse its tokio runtime, and tests can run everything inline.

use std::{
    fmt::Debug,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::error;

use crate::error::{Error, ReadResult};

/// A unit of work handed to an [`Executor`]
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks off the calling thread
pub trait Executor: Send + Sync + Debug {
    fn spawn(&self, task: Task);
}

/// Spawns a named OS thread per task
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn spawn(&self, task: Task) {
        if let Err(e) = std::thread::Builder::new()
            .name("ava-read".into())
            .spawn(task)
        {
            // the task is dropped with its sender, so the waiter sees `Error::Dropped`
            error!("failed to spawn read thread: {}", e);
        }
    }
}

/// Runs tasks on the blocking pool of a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running in, if any
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Executor for TokioExecutor {
    fn spawn(&self, task: Task) {
        drop(self.handle.spawn_blocking(task));
    }
}

/// Runs tasks immediately on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn spawn(&self, task: Task) {
        task()
    }
}

/// Pending result of a read
///
/// Await it from async code, [`wait`](Self::wait) for it from a worker thread, or poll it with
/// [`try_take`](Self::try_take) from a UI loop.
#[derive(Debug)]
pub struct ReadHandle<T = Bytes> {
    receiver: oneshot::Receiver<ReadResult<T>>,
}

/// Sending half of a [`ReadHandle`]
pub type Completion<T = Bytes> = oneshot::Sender<ReadResult<T>>;

impl<T> ReadHandle<T> {
    /// A handle and the sender that completes it
    pub fn channel() -> (Completion<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// A handle that is already complete
    pub fn ready(result: ReadResult<T>) -> Self {
        let (sender, handle) = Self::channel();
        let _ = sender.send(result);
        handle
    }

    /// Block the current thread until the read completes
    ///
    /// Must not be called from inside an async runtime, await the handle there instead.
    pub fn wait(self) -> ReadResult<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(Error::Dropped.into()))
    }

    /// The result, if the read has completed
    ///
    /// Returns `Some` once. Later calls report [`Error::Dropped`].
    pub fn try_take(&mut self) -> Option<ReadResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(Error::Dropped.into())),
        }
    }
}

impl<T> Future for ReadHandle<T> {
    type Output = ReadResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Err(Error::Dropped.into())))
    }
}
