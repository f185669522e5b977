//! Asynchronous bulk copies between views.

use crate::{
    error::{Error, Result},
    future::{Completion, signal_for},
    space::ExecutionSpace,
    view::{Element, View},
};
use tracing::debug;

/// Enqueue a copy of `src` into `dst` on `space` and return the
/// completion of everything enqueued on `space` up to and including it.
///
/// The copy is ordered with other work on `space` like any kernel, so it
/// reads `src` as left by the work enqueued before it. Element types match
/// by construction; extents, overlap and queue ordering are checked here,
/// before anything is enqueued.
///
/// # Errors
/// - [`Error::ExtentMismatch`] when the views differ in length.
/// - [`Error::OverlappingCopy`] when the views alias common elements.
/// - [`Error::OutOfOrderQueue`] when `space` does not run work in order.
pub fn deep_copy_async<S, T>(space: &S, dst: &View<T>, src: &View<T>) -> Result<Completion>
where
    S: ExecutionSpace,
    T: Element,
{
    if dst.len() != src.len() {
        return Err(Error::ExtentMismatch {
            dst: dst.len(),
            src: src.len(),
        });
    }
    if dst.overlaps(src) {
        return Err(Error::OverlappingCopy);
    }
    if !space.is_in_order() {
        return Err(Error::OutOfOrderQueue { backend: S::NAME });
    }
    debug!(
        space = S::NAME,
        instance = %space.instance_id(),
        dst = dst.label(),
        src = src.label(),
        len = src.len(),
        from = ?src.space(),
        to = ?dst.space(),
        "deep_copy"
    );
    let (dst, src) = (dst.clone(), src.clone());
    space.enqueue(
        "deep_copy",
        Box::new(move || {
            for index in 0..src.len() {
                dst.set(index, src.get(index));
            }
        }),
    );
    Ok(signal_for(space))
}

/// Blocking [`deep_copy_async`].
///
/// # Errors
/// Those of [`deep_copy_async`], plus any fault already recorded on
/// `space` by earlier work.
pub fn deep_copy<S, T>(space: &S, dst: &View<T>, src: &View<T>) -> Result<()>
where
    S: ExecutionSpace,
    T: Element,
{
    deep_copy_async(space, dst, src)?.get()
}
