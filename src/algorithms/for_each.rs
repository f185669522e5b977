use super::DispatchRange;
use crate::{
    parallel::for_on,
    policy::{ExecutorSource, KernelPolicy, Mode},
};

/// Apply `f` to every element of `range`.
///
/// Synchronous policies return once every element was visited; deferred
/// ones return the launch's completion.
pub fn for_each<X, M, R, F>(policy: &KernelPolicy<X, M>, range: R, f: F) -> M::Output<()>
where
    X: ExecutorSource,
    M: Mode,
    R: DispatchRange<X::Space>,
    F: Fn(R::Item) + Send + Sync + 'static,
{
    let executor = policy.executor();
    let target = range.bind(executor.instance().clone(), policy.parameters());
    M::finish(for_on(policy.label(), target, move |index| {
        f(range.item(index));
    }))
}
