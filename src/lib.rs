//! Bridge between kernel-dispatch backends and future-based task
//! composition.
//!
//! Kernel launches on a data-parallel backend are asynchronous relative to
//! the submitting thread, but the backend only offers a blocking fence to
//! wait for them. This crate turns launches into [`Completion`] handles
//! that can be chained without blocking, and exposes backends through the
//! executor and execution-policy vocabulary of a task model. It:
//! - Maps an execution-space instance to a completion handle, per backend:
//!   a fence for host backends, polled events or host callbacks for device
//!   streams, the native future chain for task-model backends.
//! - Creates instances in a shared global mode or an independent mode that
//!   lets launches on different instances overlap.
//! - Wraps the transform, reduce and scan primitives and bulk copies so
//!   they return completion handles.
//! - Adapts instances into executors and composes executors into policies
//!   that route `for_each`, `for_loop` and `reduce` either synchronously or
//!   as deferred tasks.
//!
//! Key modules:
//! - `future`: `Completion`/`Promise` and the completion-signal adapter
//!   `signal_for`.
//! - `space`: the `ExecutionSpace` capability trait and the `Serial`,
//!   `Threads`, `Stream` and `Tasks` backends.
//! - `instance`: global/independent instance creation and `InstancePool`.
//! - `parallel`: index-space descriptors and the async kernel wrappers.
//! - `executor`: the `Executor` value type and the executor contracts.
//! - `policy` and `algorithms`: execution policies and generic algorithms.
//!
//! Quick start:
//! 1. Pick an executor, e.g. `Executor::<Stream>::new(Independent)?`.
//! 2. Build a policy with `kernel_policy().on(executor)`, and call `.task()`
//!    on it for deferred results.
//! 3. Call `for_each`, `for_loop` or `reduce` with the policy; a
//!    synchronous policy returns `Result<T>`, a deferred one a
//!    `Completion<T>` to chain on with `then` or `.await`.
//!
//! Work submitted to one instance runs in submission order. Nothing is
//! implied across instances unless a caller waits on a handle from one
//! before submitting to the other.

/// Concrete kernel-dispatch wrappers for the generic algorithms.
///
/// Routes `for_each`, `for_loop` and `reduce` through a policy, either
/// passing native range descriptors through or translating random-access
/// shapes into offset-indexed launches.
pub mod algorithms;
/// Runtime configuration of the emulated device and instance pools.
pub mod config;
/// Asynchronous bulk copies between views.
pub mod deep_copy;
mod error;
/// Task-model executors over execution-space instances.
///
/// Provides `Executor` with one-way, two-way and bulk submission, and the
/// contract traits every backend's executor satisfies.
pub mod executor;
/// Completion handles and the completion-signal adapter.
///
/// `Completion` becomes ready exactly once, accepts continuations without
/// blocking, and implements `Future`. `signal_for` produces one for all
/// work enqueued on an instance.
pub mod future;
/// Global and independent instance creation.
pub mod instance;
/// Index-space descriptors, reducers and the future-returning wrappers of
/// the transform, reduce and scan primitives.
pub mod parallel;
/// Execution policies: executor, parameters, label and sync/deferred mode.
pub mod policy;
/// Random-access shapes for bulk submission and generic algorithms.
pub mod shape;
/// Execution-space capability trait and the built-in backends.
///
/// Each backend declares whether it completes asynchronously, whether it
/// can allocate independent instances, how it runs index loops, and where
/// reduction results must live to keep the copy back asynchronous.
pub mod space;
mod sync;
/// Common aliases and identifiers.
pub mod types;
mod utils;
/// Labelled backend buffers with memory-space tags.
pub mod view;

pub use error::{Error, Result};
pub use future::Completion;
