//! Deterministic multi-resource cleanup.
//!
//! [`AsyncExitStack`] is a LIFO registry of cleanup actions, unwound in
//! reverse registration order. Every release is attempted even when earlier
//! releases fail; failures are chained so the outermost error can be traced
//! back through each one.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::errors::{Error, Result, TeardownFailure};

/// A resource acquired for a scope and released on every exit path.
#[async_trait]
pub trait ScopedResource: Send {
    /// Acquire the resource.
    async fn enter(&mut self) -> Result<()>;

    /// Release the resource. `error` is the error currently unwinding the
    /// scope, if any; returning `Ok(true)` suppresses it.
    async fn exit(&mut self, error: Option<&Error>) -> Result<bool>;
}

type ExitAction = Box<dyn for<'a> FnOnce(Option<&'a Error>) -> BoxFuture<'a, Result<bool>> + Send>;

/// LIFO registry of exit actions.
///
/// Actions registered later run earlier: an inner resource acquired while an
/// outer one is live must be torn down while the outer one is still valid.
/// No action starts until the previous one has fully completed.
#[derive(Default)]
pub struct AsyncExitStack {
    actions: Vec<ExitAction>,
}

impl AsyncExitStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending exit actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Register a raw exit handler. The handler sees the in-flight error and
    /// may suppress it by returning `Ok(true)`.
    pub fn push<F>(&mut self, handler: F)
    where
        F: for<'a> FnOnce(Option<&'a Error>) -> BoxFuture<'a, Result<bool>> + Send + 'static,
    {
        self.actions.push(Box::new(handler));
    }

    /// Register an asynchronous callback. Callbacks cannot suppress errors.
    pub fn callback<F, Fut>(&mut self, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.push(move |_| {
            Box::pin(async move {
                callback().await?;
                Ok(false)
            })
        });
    }

    /// Register a synchronous callback. Callbacks cannot suppress errors.
    pub fn sync_callback<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(move |_| {
            Box::pin(async move {
                callback();
                Ok(false)
            })
        });
    }

    /// Register the release of an already-acquired scoped resource. The
    /// release operation is bound now, at registration time.
    pub fn push_scoped<R>(&mut self, resource: Arc<Mutex<R>>)
    where
        R: ScopedResource + 'static,
    {
        self.push(move |error| Box::pin(async move { resource.lock().await.exit(error).await }));
    }

    /// Acquire `resource`, register its release, and return a shared handle
    /// to the acquired value.
    pub async fn enter_scoped<R>(&mut self, mut resource: R) -> Result<Arc<Mutex<R>>>
    where
        R: ScopedResource + 'static,
    {
        resource.enter().await?;
        let handle = Arc::new(Mutex::new(resource));
        self.push_scoped(Arc::clone(&handle));
        Ok(handle)
    }

    /// Transfer every pending action to a fresh stack, leaving this one
    /// empty so its future [`unwind`](Self::unwind) is a no-op.
    pub fn pop_all(&mut self) -> AsyncExitStack {
        AsyncExitStack {
            actions: std::mem::take(&mut self.actions),
        }
    }

    /// Unwind the stack with no in-flight error.
    pub async fn close(&mut self) -> Result<()> {
        self.unwind(None).await
    }

    /// Pop and run every action in reverse registration order.
    ///
    /// Every release is attempted. A failing release supersedes the current
    /// error and chains it as a cause; once unwinding finishes the composed
    /// [`TeardownFailure`] is surfaced. A handler returning `Ok(true)`
    /// suppresses the in-flight error (and any release failures chained so
    /// far); nothing further propagates unless a later release fails. With
    /// no failures, an unsuppressed incoming error propagates unchanged.
    pub async fn unwind(&mut self, error: Option<Error>) -> Result<()> {
        let mut current = error;
        let mut superseded: Vec<Error> = Vec::new();
        let mut release_failed = false;
        while let Some(action) = self.actions.pop() {
            match action(current.as_ref()).await {
                Ok(true) => {
                    current = None;
                    superseded.clear();
                    release_failed = false;
                }
                Ok(false) => {}
                Err(failure) => {
                    tracing::warn!(error = %failure, "exit action failed during unwind");
                    if let Some(previous) = current.take() {
                        superseded.push(previous);
                    }
                    current = Some(failure);
                    release_failed = true;
                }
            }
        }
        match current {
            Some(primary) if release_failed => {
                Err(Error::Teardown(TeardownFailure::new(primary, superseded)))
            }
            Some(unsuppressed) => Err(unsuppressed),
            None => Ok(()),
        }
    }
}
