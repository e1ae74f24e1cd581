//! Work items: deferred async callables handed to an executor.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use fanout_core::errors::TaskError;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::executor::outcome::TaskOutcome;

/// The boxed future a work item turns into once started.
pub type TaskFuture<T> = BoxFuture<'static, Result<T, TaskError>>;

/// A unit of submitted work.
///
/// Nothing runs until the executor starts the item; the callable (and the
/// arguments it captured) is consumed exactly once.
pub struct WorkItem<T> {
    label: Option<String>,
    start: Box<dyn FnOnce() -> TaskFuture<T> + Send + 'static>,
}

impl<T: Send + 'static> WorkItem<T> {
    /// Wrap a callable whose error is any displayable type.
    ///
    /// The error is captured as a [`TaskError`] named after its type.
    pub fn new<F, Fut, E>(task: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        Self {
            label: None,
            start: Box::new(move || {
                async move { task().await.map_err(|e| TaskError::from_error(&e)) }.boxed()
            }),
        }
    }

    /// Wrap a callable bound to an argument value.
    pub fn with_args<A, F, Fut, E>(task: F, args: A) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        Self::new(move || task(args))
    }

    /// Wrap a callable that cannot fail (it can still panic).
    pub fn infallible<F, Fut>(task: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            label: None,
            start: Box::new(move || async move { Ok::<_, TaskError>(task().await) }.boxed()),
        }
    }

    /// Wrap a callable that already reports [`TaskError`]s.
    pub fn from_task_result<F, Fut>(task: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        Self {
            label: None,
            start: Box::new(move || task().boxed()),
        }
    }

    /// Attach a label used in logs.
    #[must_use]
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The item's label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Start the item and await it, capturing errors and panics as data.
    pub(crate) async fn drive(self) -> TaskOutcome<T> {
        let Self { label, start } = self;
        // The callable itself is invoked inside the guarded future so a
        // panic before the first await is captured too.
        let guarded = AssertUnwindSafe(async move { start().await }).catch_unwind();
        match guarded.await {
            Ok(Ok(value)) => TaskOutcome::Success(value),
            Ok(Err(err)) => {
                tracing::debug!(label = label.as_deref(), error = %err, "work item failed");
                TaskOutcome::Failure(err)
            }
            Err(payload) => {
                let err = TaskError::from_panic(payload.as_ref());
                tracing::warn!(label = label.as_deref(), error = %err, "work item panicked");
                TaskOutcome::Failure(err)
            }
        }
    }
}

impl<T> fmt::Debug for WorkItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
