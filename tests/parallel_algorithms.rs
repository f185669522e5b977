#![allow(missing_docs)]
#![cfg(all(feature = "stream", not(feature = "loom")))]

mod common;

use common::init_tracing;
use ktb::{
    algorithms::{for_each, for_loop, reduce},
    executor::Executor,
    instance::ExecutionSpaceMode,
    parallel::{RangePolicy, Sum, parallel_reduce_async},
    policy::{Parameters, kernel_policy, kernel_task_policy},
    space::{ExecutionSpace, Stream, Threads},
    view::{MemorySpace, View},
};

#[test]
fn synchronous_copy_of_a_million_elements() {
    init_tracing();
    const N: usize = 1_000_000;
    let a = View::<f64>::new_in("a", N, MemorySpace::Device);
    let b = View::<f64>::new_in("b", N, MemorySpace::Device);
    for_each(&kernel_policy().with_label("init"), N, {
        let a = a.clone();
        move |i: usize| a.set(i, f64::from(u32::try_from(i).unwrap()) * 0.5)
    })
    .unwrap();
    for_each(&kernel_policy().with_label("copy"), 0..N, {
        let (a, b) = (a.clone(), b.clone());
        move |i: usize| b.set(i, a.get(i))
    })
    .unwrap();
    assert_eq!(a.to_vec(), b.to_vec());
}

#[test]
fn deferred_sum_with_initial_offset() {
    let values: Vec<i64> = (0..43).collect();
    let view = View::from_slice("values", &values);
    let sum = reduce(&kernel_task_policy(), view, -3, |a, b| a + b);
    assert_eq!(sum.get(), Ok(900));

    let pinned = View::<i64>::new_in("sum", 1, MemorySpace::HostPinned);
    parallel_reduce_async(
        "sum",
        RangePolicy::<Stream>::global(0..43),
        Sum,
        |i: usize, acc: &mut i64| *acc += i64::try_from(i).unwrap(),
        pinned.clone(),
    )
    .unwrap()
    .get()
    .unwrap();
    assert_eq!(pinned.get(0) - 3, 900);
}

#[test]
fn reduce_over_ranges_and_views_on_any_executor() {
    let threads = kernel_policy().on(Executor::<Threads>::global());
    assert_eq!(reduce(&threads, 1..101_usize, 0, |a, b| a + b), Ok(5050));
    let view = View::from_slice("v", &[3_i32, -8, 5, 1]);
    assert_eq!(reduce(&threads, view.range(0..4), i32::MAX, i32::min), Ok(-8));

    let stream = Executor::<Stream>::new(ExecutionSpaceMode::Independent).unwrap();
    let deferred = kernel_task_policy().on(stream);
    let product = reduce(&deferred, vec![1_u64, 2, 3, 4, 5], 2, |a, b| a * b);
    assert_eq!(product.get(), Ok(240));
}

#[test]
fn for_loop_with_chunk_hint() {
    let out = View::<i32>::new("out", 20);
    let policy = kernel_policy()
        .with(Parameters::default().with_chunk_size(4))
        .with_label("shifted");
    for_loop(&policy, -10_i32, 10, {
        let out = out.clone();
        move |i: i32| out.set(usize::try_from(i + 10).unwrap(), i * i)
    })
    .unwrap();
    assert_eq!(out.get(0), 100);
    assert_eq!(out.get(10), 0);
    assert_eq!(out.get(19), 81);
}

#[test]
fn deferred_algorithms_chain_without_blocking() {
    let stream = Executor::<Stream>::new(ExecutionSpaceMode::Independent).unwrap();
    let policy = kernel_task_policy().on(stream.clone());
    let data = View::<u32>::new("data", 1000);
    let written = for_loop(&policy, 0_usize, 1000, {
        let data = data.clone();
        move |i: usize| data.set(i, 1)
    });
    let total = reduce(&policy, data.clone(), 0, |a, b| a + b);
    let reported = written.then(move |outcome| outcome.map(|()| "written"));
    assert_eq!(total.get(), Ok(1000));
    assert_eq!(reported.get(), Ok("written"));
}

#[test]
fn host_result_space_on_a_stream_degrades_to_a_fence() {
    let stream = <Stream as ExecutionSpace>::independent().unwrap();
    let host = View::<u64>::new_in("host", 1, MemorySpace::Host);
    let done = parallel_reduce_async(
        "host target",
        RangePolicy::new(stream, 0..10_000),
        Sum,
        |i: usize, acc: &mut u64| *acc += u64::try_from(i).unwrap(),
        host.clone(),
    )
    .unwrap();
    assert!(done.is_ready());
    assert_eq!(host.get(0), 49_995_000);
}
