#![allow(missing_docs)]
#![cfg(all(feature = "stream", feature = "tasks", not(feature = "loom")))]

use ktb::{
    Error,
    config::Config,
    executor::Executor,
    instance::{ExecutionSpaceMode, InstancePool, make_instance},
    space::{ExecutionSpace, Serial, Stream, StreamDevice, Tasks, Threads},
};

#[test]
fn global_mode_is_shared() {
    let a: Stream = make_instance(ExecutionSpaceMode::Global).unwrap();
    let b: Stream = make_instance(ExecutionSpaceMode::Global).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.instance_id(), b.instance_id());
    assert_eq!(Executor::<Tasks>::global(), Executor::<Tasks>::global());
}

#[test]
fn independent_mode_allocates_where_supported() {
    let global = Stream::global();
    let fresh: Stream = make_instance(ExecutionSpaceMode::Independent).unwrap();
    assert_ne!(fresh, global);
    assert_ne!(
        make_instance::<Tasks>(ExecutionSpaceMode::Independent).unwrap(),
        Tasks::global()
    );
    assert_eq!(
        make_instance::<Threads>(ExecutionSpaceMode::Independent).unwrap(),
        Threads::global()
    );
    assert!(!Serial::CAPABILITY.independent_instances);
}

#[test]
fn stream_exhaustion_is_a_resource_error() {
    let device = StreamDevice::new(Config::default().with_max_streams(3)).unwrap();
    let streams: Vec<_> = (0..2).map(|_| device.create_stream().unwrap()).collect();
    let err = device.create_stream().unwrap_err();
    assert!(matches!(err, Error::ResourceCreation { backend: "Stream", .. }));
    assert!(err.to_string().contains("stream limit of 3"));
    drop(streams);
    assert_eq!(device.live_streams(), 1);
}

#[test]
fn device_without_room_for_its_default_stream_fails() {
    assert!(matches!(
        StreamDevice::new(Config::default().with_max_streams(0)),
        Err(Error::ResourceCreation { .. })
    ));
}

#[test]
fn pool_hands_out_instances_round_robin() {
    let pool = InstancePool::<Stream>::new(3).unwrap();
    assert_eq!(pool.len(), 3);
    let ids: Vec<_> = (0..6).map(|_| pool.instance().instance_id()).collect();
    assert_eq!(ids[..3], ids[3..]);
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);
    assert!(pool.iter().all(|stream| *stream != Stream::global()));

    let exec = pool.executor();
    assert_eq!(exec.async_execute(|| 1 + 1).get(), Ok(2));
}

#[test]
fn pool_size_comes_from_config() {
    let pool = InstancePool::<Tasks>::from_config(&Config::default().with_pool_instances(4)).unwrap();
    assert_eq!(pool.len(), 4);
}
