//! Index loops run inside a launched kernel.

use super::reducer::Reducer;
use crate::{space::Parallelism, utils::RangeChunks, view::Arithmetic};
use rayon::prelude::*;

pub(crate) fn for_each<F>(parallelism: Parallelism, len: usize, min_chunk: usize, f: F)
where
    F: Fn(usize) + Sync + Send,
{
    match parallelism {
        Parallelism::Sequential => (0..len).for_each(f),
        Parallelism::Rayon => (0..len)
            .into_par_iter()
            .with_min_len(min_chunk)
            .for_each(f),
    }
}

/// `f(offset, &mut partial)` accumulates each offset's contribution.
pub(crate) fn reduce<V, R, F>(
    parallelism: Parallelism,
    len: usize,
    min_chunk: usize,
    reducer: &R,
    f: F,
) -> V
where
    V: Send,
    R: Reducer<V>,
    F: Fn(usize, &mut V) + Sync + Send,
{
    match parallelism {
        Parallelism::Sequential => {
            let mut acc = reducer.identity();
            for offset in 0..len {
                f(offset, &mut acc);
            }
            acc
        }
        Parallelism::Rayon => (0..len)
            .into_par_iter()
            .with_min_len(min_chunk)
            .fold(
                || reducer.identity(),
                |mut acc, offset| {
                    f(offset, &mut acc);
                    acc
                },
            )
            .reduce(|| reducer.identity(), |lhs, rhs| reducer.join(lhs, rhs)),
    }
}

/// Two-pass chunked scan. `f(offset, &mut partial, is_final)` adds its
/// contribution to `partial`; on the final pass `partial` holds the
/// exclusive prefix on entry. Returns the total.
pub(crate) fn scan<T, F>(parallelism: Parallelism, len: usize, f: F) -> T
where
    T: Arithmetic,
    F: Fn(usize, &mut T, bool) + Sync + Send,
{
    let run = |range: core::ops::Range<usize>, mut partial: T, is_final: bool| {
        for offset in range {
            f(offset, &mut partial, is_final);
        }
        partial
    };
    match parallelism {
        Parallelism::Sequential => run(0..len, T::ZERO, true),
        Parallelism::Rayon => {
            let chunks = (0..len).chunks(rayon::current_num_threads());
            let sums: Vec<T> = chunks
                .par_iter()
                .map(|chunk| run(chunk.clone(), T::ZERO, false))
                .collect();
            let mut offsets = Vec::with_capacity(sums.len());
            let mut total = T::ZERO;
            for sum in sums {
                offsets.push(total);
                total = total.add(sum);
            }
            chunks
                .into_par_iter()
                .zip(offsets)
                .for_each(|(chunk, prefix)| {
                    run(chunk, prefix, true);
                });
            total
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::reducer::Sum;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BOTH: [Parallelism; 2] = [Parallelism::Sequential, Parallelism::Rayon];

    #[test]
    fn for_each_visits_every_offset_once() {
        for parallelism in BOTH {
            let hits: Vec<AtomicUsize> = (0..1000).map(|_| AtomicUsize::new(0)).collect();
            for_each(parallelism, hits.len(), 16, |i| {
                hits[i].fetch_add(1, Ordering::Relaxed);
            });
            assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
        }
    }

    #[test]
    fn reduce_sums_contributions() {
        for parallelism in BOTH {
            let total: u64 = reduce(parallelism, 101, 1, &Sum, |i, acc: &mut u64| {
                *acc += i as u64;
            });
            assert_eq!(total, 5050);
        }
    }

    #[test]
    fn scan_writes_exclusive_prefixes() {
        for parallelism in BOTH {
            let out: Vec<AtomicUsize> = (0..257).map(|_| AtomicUsize::new(0)).collect();
            let total = scan(parallelism, out.len(), |i, partial: &mut usize, is_final| {
                if is_final {
                    out[i].store(*partial, Ordering::Relaxed);
                }
                *partial += i;
            });
            assert_eq!(total, 256 * 257 / 2);
            for (i, slot) in out.iter().enumerate() {
                assert_eq!(slot.load(Ordering::Relaxed), i * i.saturating_sub(1) / 2);
            }
        }
    }

    #[test]
    fn empty_ranges() {
        for parallelism in BOTH {
            assert_eq!(scan(parallelism, 0, |_, _: &mut i32, _| unreachable!()), 0);
            assert_eq!(reduce(parallelism, 0, 1, &Sum, |_, _: &mut i32| unreachable!()), 0);
        }
    }
}
