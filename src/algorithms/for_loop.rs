use crate::{
    parallel::{Integral, RangePolicy, advance, parallel_for_async, span},
    policy::{ExecutorSource, KernelPolicy, Mode},
};

/// Call `f` for every integer in `[first, last)`.
///
/// Only integral bounds are accepted; an empty or reversed interval
/// launches nothing.
pub fn for_loop<X, M, I, F>(policy: &KernelPolicy<X, M>, first: I, last: I, f: F) -> M::Output<()>
where
    X: ExecutorSource,
    M: Mode,
    I: Integral,
    F: Fn(I) + Send + Sync + 'static,
{
    let executor = policy.executor();
    let launch = RangePolicy::new(executor.instance().clone(), 0..span(first, last))
        .with_chunk(policy.parameters().chunk_size.unwrap_or(1));
    M::finish(parallel_for_async(policy.label(), launch, move |offset| {
        f(advance(first, offset));
    }))
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::{executor::Executor, policy::kernel_policy, space::Serial};
    use std::sync::{Arc, Mutex};

    #[test]
    fn loops_over_signed_bounds() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let policy = kernel_policy().on(Executor::<Serial>::global());
        for_loop(&policy, -2_i16, 3, {
            let seen = Arc::clone(&seen);
            move |i| seen.lock().unwrap().push(i)
        })
        .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![-2, -1, 0, 1, 2]);
        for_loop(&policy, 5_u8, 5, |_| unreachable!()).unwrap();
        for_loop(&policy, 9_u64, 1, |_| unreachable!()).unwrap();
    }
}
