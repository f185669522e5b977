#![allow(missing_docs)]
#![cfg(all(feature = "stream", not(feature = "loom")))]

use ktb::{
    Error,
    deep_copy::{deep_copy, deep_copy_async},
    space::{Capability, ExecutionSpace, Parallelism, SignalSource, Stream},
    types::{InstanceId, Work},
    view::{MemorySpace, View},
};

#[test]
fn round_trip_through_device_memory() {
    let stream = Stream::independent().unwrap();
    let host: Vec<f32> = (0..4096_u16).map(|v| f32::from(v) * 0.25 - 3.0).collect();
    let src = View::from_slice("host", &host);
    let device = View::<f32>::new_in("device", host.len(), MemorySpace::Device);
    let back = View::<f32>::new_in("back", host.len(), MemorySpace::HostPinned);

    let to_device = deep_copy_async(&stream, &device, &src).unwrap();
    let to_host = deep_copy_async(&stream, &back, &device).unwrap();
    to_device.get().unwrap();
    to_host.get().unwrap();

    let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&back.to_vec()), bits(&host));
}

#[test]
fn copies_see_earlier_work_on_the_instance() {
    let stream = Stream::independent().unwrap();
    let src = View::<u64>::new("src", 8);
    let dst = View::<u64>::new("dst", 8);
    stream.enqueue("fill", {
        let src = src.clone();
        Box::new(move || src.fill(11))
    });
    deep_copy(&stream, &dst, &src).unwrap();
    assert_eq!(dst.to_vec(), vec![11; 8]);
}

#[test]
fn preconditions_are_checked_before_enqueueing() {
    let stream = Stream::independent().unwrap();
    let buf = View::<i16>::new("buf", 10);
    assert_eq!(
        deep_copy_async(&stream, &buf, &View::new("short", 9)).unwrap_err(),
        Error::ExtentMismatch { dst: 10, src: 9 }
    );
    assert_eq!(
        deep_copy_async(&stream, &buf.subview(0..6), &buf.subview(4..10)).unwrap_err(),
        Error::OverlappingCopy
    );
    assert!(stream.is_idle());
}

/// A queue that may reorder its commands.
#[derive(Debug, Clone, PartialEq)]
struct Unordered;

impl ExecutionSpace for Unordered {
    const NAME: &'static str = "Unordered";
    const CAPABILITY: Capability = Capability {
        async_completion: false,
        independent_instances: false,
        parallelism: Parallelism::Sequential,
        reduce_result_space: MemorySpace::Host,
    };

    fn global() -> Self {
        Self
    }

    fn independent() -> ktb::Result<Self> {
        Ok(Self)
    }

    fn instance_id(&self) -> InstanceId {
        InstanceId::SINGLETON
    }

    fn enqueue(&self, _label: &str, _work: Work) {
        panic!("nothing may be enqueued on an unordered queue");
    }

    fn fence(&self) {}

    fn signal_source(&self) -> SignalSource {
        SignalSource::Fence
    }

    fn is_in_order(&self) -> bool {
        false
    }
}

#[test]
fn out_of_order_queues_are_rejected() {
    let src = View::<u8>::new("src", 3);
    let dst = View::<u8>::new("dst", 3);
    assert_eq!(
        deep_copy(&Unordered, &dst, &src).unwrap_err(),
        Error::OutOfOrderQueue {
            backend: "Unordered"
        }
    );
}
