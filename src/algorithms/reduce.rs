use super::DispatchRange;
use crate::{
    future::Completion,
    parallel::{Fold, ResultCell, reduce_on},
    policy::{ExecutorSource, KernelPolicy, Mode},
    space::ExecutionSpace,
};
use std::sync::Arc;

/// Combine every element of `range` with `op`, then combine `init` with
/// the result.
///
/// `op` must be associative; the order partial results are combined in is
/// up to the backend. An empty range yields `init`.
pub fn reduce<X, M, R, T, Op>(policy: &KernelPolicy<X, M>, range: R, init: T, op: Op) -> M::Output<T>
where
    X: ExecutorSource,
    M: Mode,
    R: DispatchRange<X::Space, Item = T>,
    T: Clone + Send + Sync + 'static,
    Op: Fn(T, T) -> T + Send + Sync + 'static,
{
    let op = Arc::new(op);
    let executor = policy.executor();
    let target = range.bind(executor.instance().clone(), policy.parameters());
    let cell = ResultCell::<Option<T>>::new_in(<X::Space as ExecutionSpace>::CAPABILITY.reduce_result_space);
    let fold = Fold::new({
        let op = Arc::clone(&op);
        move |lhs: T, rhs: T| op(lhs, rhs)
    });
    let kernel = {
        let op = Arc::clone(&op);
        move |index, partial: &mut Option<T>| {
            let item = range.item(index);
            *partial = Some(match partial.take() {
                Some(acc) => op(acc, item),
                None => item,
            });
        }
    };
    let launched =
        reduce_on(policy.label(), target, fold, kernel, cell.clone()).unwrap_or_else(Completion::failed);
    // The result cell is released by this continuation, once the launch
    // finished, rather than by the caller's scope.
    M::finish(launched.then(move |outcome| {
        outcome?;
        Ok(match cell.take().flatten() {
            Some(value) => op(init, value),
            None => init,
        })
    }))
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::{
        executor::Executor,
        policy::kernel_policy,
        space::{Serial, Threads},
        view::View,
    };

    #[test]
    fn reduces_views_and_vectors() {
        let policy = kernel_policy().on(Executor::<Threads>::global());
        let view = View::from_slice("v", &[1.5_f64, 2.5, 4.0]);
        assert_eq!(reduce(&policy, view, 0.0, |a, b| a + b), Ok(8.0));
        let words = vec!["b".to_owned(), "c".to_owned()];
        let joined = reduce(&policy.task(), words, "a".to_owned(), |a, b| a + &b);
        assert_eq!(joined.get().unwrap().len(), 3);
    }

    #[test]
    fn empty_range_yields_init() {
        let policy = kernel_policy().on(Executor::<Serial>::global());
        assert_eq!(reduce(&policy, 0_usize, 7, |a, b| a.max(b)), Ok(7));
    }
}
