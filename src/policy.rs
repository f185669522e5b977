//! Execution policies routing generic algorithms to kernel launches.
//!
//! A [`KernelPolicy`] is an immutable value combining an executor source,
//! [`Parameters`], a diagnostic label and a [`Mode`]. Every transition
//! returns a new policy:
//!
//! | transition            | changes                     |
//! |-----------------------|-----------------------------|
//! | [`on`](KernelPolicy::on)         | the executor     |
//! | [`task`](KernelPolicy::task)     | the mode, to [`Deferred`] |
//! | [`with`](KernelPolicy::with)     | the parameters   |
//! | [`with_label`](KernelPolicy::with_label) | the label |
//!
//! The mode picks the algorithm result type at compile time: a
//! [`Synchronous`] policy blocks and yields `Result<T>`, a [`Deferred`]
//! one yields a [`Completion<T>`].

use crate::{
    error::Result,
    executor::Executor,
    future::Completion,
    space::{DefaultExecutionSpace, ExecutionSpace},
    types::{DEFAULT_LABEL, Label},
};
use core::fmt::Debug;
use std::borrow::Cow;

/// Executor parameters carried by a policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Parameters {
    /// Smallest run of consecutive indices a backend worker should take.
    /// `None` lets the backend decide.
    pub chunk_size: Option<usize>,
}

impl Parameters {
    /// Set the chunk hint.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Whether algorithms block or hand back a completion.
pub trait Mode: sealed::Sealed + Copy + Default + Debug + PartialEq + Send + Sync + 'static {
    /// `true` for [`Deferred`].
    const DEFERRED: bool;

    /// What an algorithm producing `T` returns under this mode.
    type Output<T: Clone + Send + 'static>;

    /// Turn the launch's completion into the algorithm result.
    fn finish<T: Clone + Send + 'static>(completion: Completion<T>) -> Self::Output<T>;
}

/// Block on the launch and return its outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Synchronous;

/// Return the launch's completion without blocking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Deferred;

impl sealed::Sealed for Synchronous {}
impl sealed::Sealed for Deferred {}

impl Mode for Synchronous {
    const DEFERRED: bool = false;

    type Output<T: Clone + Send + 'static> = Result<T>;

    fn finish<T: Clone + Send + 'static>(completion: Completion<T>) -> Result<T> {
        completion.get()
    }
}

impl Mode for Deferred {
    const DEFERRED: bool = true;

    type Output<T: Clone + Send + 'static> = Completion<T>;

    fn finish<T: Clone + Send + 'static>(completion: Completion<T>) -> Completion<T> {
        completion
    }
}

/// Where a policy gets its executor from.
pub trait ExecutorSource: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Backend the executor runs on.
    type Space: ExecutionSpace;

    /// The executor to launch on.
    fn executor(&self) -> Executor<Self::Space>;
}

/// The global instance of [`DefaultExecutionSpace`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DefaultExecutorSource;

impl ExecutorSource for DefaultExecutorSource {
    type Space = DefaultExecutionSpace;

    fn executor(&self) -> Executor<DefaultExecutionSpace> {
        Executor::global()
    }
}

impl<S: ExecutionSpace> ExecutorSource for Executor<S> {
    type Space = S;

    fn executor(&self) -> Executor<S> {
        self.clone()
    }
}

/// Execution policy for the generic algorithms.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub struct KernelPolicy<X: ExecutorSource = DefaultExecutorSource, M: Mode = Synchronous> {
    source: X,
    parameters: Parameters,
    label: Label,
    mode: M,
}

/// Deferred policy.
pub type KernelTaskPolicy<X = DefaultExecutorSource> = KernelPolicy<X, Deferred>;

/// Synchronous policy on the default executor.
pub const KERNEL_POLICY: KernelPolicy = KernelPolicy {
    source: DefaultExecutorSource,
    parameters: Parameters { chunk_size: None },
    label: Cow::Borrowed(DEFAULT_LABEL),
    mode: Synchronous,
};

/// Synchronous policy on the default executor.
pub fn kernel_policy() -> KernelPolicy {
    KERNEL_POLICY
}

/// Deferred policy on the default executor.
pub fn kernel_task_policy() -> KernelTaskPolicy {
    KERNEL_POLICY.task()
}

impl Default for KernelPolicy {
    fn default() -> Self {
        KERNEL_POLICY
    }
}

impl<X: ExecutorSource, M: Mode> KernelPolicy<X, M> {
    /// Same policy on `executor`.
    pub fn on<S: ExecutionSpace>(&self, executor: Executor<S>) -> KernelPolicy<Executor<S>, M> {
        KernelPolicy {
            source: executor,
            parameters: self.parameters,
            label: self.label.clone(),
            mode: self.mode,
        }
    }

    /// Deferred variant with the same executor, parameters and label.
    pub fn task(&self) -> KernelPolicy<X, Deferred> {
        KernelPolicy {
            source: self.source.clone(),
            parameters: self.parameters,
            label: self.label.clone(),
            mode: Deferred,
        }
    }

    /// Same policy with `parameters`.
    pub fn with(&self, parameters: Parameters) -> Self {
        Self {
            parameters,
            ..self.clone()
        }
    }

    /// Same policy with `label`. Labels only show up in diagnostics.
    pub fn with_label(&self, label: impl Into<Label>) -> Self {
        Self {
            label: label.into(),
            ..self.clone()
        }
    }

    /// Diagnostic label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Executor algorithms launch on.
    pub fn executor(&self) -> Executor<X::Space> {
        self.source.executor()
    }

    /// Executor parameters.
    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Whether algorithms return completions instead of blocking.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        M::DEFERRED
    }
}
