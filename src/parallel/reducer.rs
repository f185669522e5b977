use crate::{
    error::{Error, Result},
    view::{Arithmetic, Element, MemorySpace, View},
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Associative combination with an identity, used by reductions.
pub trait Reducer<V>: Clone + Send + Sync + 'static {
    /// Neutral element each worker starts from.
    fn identity(&self) -> V;
    /// Combine two partial results.
    fn join(&self, lhs: V, rhs: V) -> V;
}

/// Sum of contributions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sum;

/// Product of contributions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Prod;

/// Smallest contribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Min;

/// Largest contribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Max;

impl<T: Arithmetic> Reducer<T> for Sum {
    fn identity(&self) -> T {
        T::ZERO
    }

    fn join(&self, lhs: T, rhs: T) -> T {
        lhs.add(rhs)
    }
}

impl<T: Arithmetic> Reducer<T> for Prod {
    fn identity(&self) -> T {
        T::ONE
    }

    fn join(&self, lhs: T, rhs: T) -> T {
        lhs.mul(rhs)
    }
}

impl<T: Arithmetic> Reducer<T> for Min {
    fn identity(&self) -> T {
        T::HIGHEST
    }

    fn join(&self, lhs: T, rhs: T) -> T {
        if rhs < lhs { rhs } else { lhs }
    }
}

impl<T: Arithmetic> Reducer<T> for Max {
    fn identity(&self) -> T {
        T::LOWEST
    }

    fn join(&self, lhs: T, rhs: T) -> T {
        if rhs > lhs { rhs } else { lhs }
    }
}

/// Reducer over a bare binary operation without a known identity.
///
/// Partial results are `None` until a worker contributes a value.
pub(crate) struct Fold<F> {
    op: Arc<F>,
}

impl<F> Clone for Fold<F> {
    fn clone(&self) -> Self {
        Self {
            op: Arc::clone(&self.op),
        }
    }
}

impl<F> Fold<F> {
    pub(crate) fn new(op: F) -> Self {
        Self { op: Arc::new(op) }
    }
}

impl<T, F> Reducer<Option<T>> for Fold<F>
where
    T: Send,
    F: Fn(T, T) -> T + Send + Sync + 'static,
{
    fn identity(&self) -> Option<T> {
        None
    }

    fn join(&self, lhs: Option<T>, rhs: Option<T>) -> Option<T> {
        match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => Some((self.op)(lhs, rhs)),
            (lhs, rhs) => lhs.or(rhs),
        }
    }
}

/// Destination of a reduction or scan total.
pub trait ReduceTarget<V>: Send + 'static {
    /// Memory space the value is copied into; `None` if it is discarded.
    fn memory_space(&self) -> Option<MemorySpace>;

    /// Check the target can receive a value.
    ///
    /// # Errors
    /// When the target has the wrong shape.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Deliver the final value.
    fn store(&self, value: V);
}

/// A one-element view receives the value in element 0.
impl<T: Element> ReduceTarget<T> for View<T> {
    fn memory_space(&self) -> Option<MemorySpace> {
        Some(self.space())
    }

    fn validate(&self) -> Result<()> {
        if self.len() == 1 {
            Ok(())
        } else {
            Err(Error::ResultExtent(self.len()))
        }
    }

    fn store(&self, value: T) {
        self.set(0, value);
    }
}

/// Discard the value.
impl<V> ReduceTarget<V> for () {
    fn memory_space(&self) -> Option<MemorySpace> {
        None
    }

    fn store(&self, _value: V) {}
}

/// Single-value result slot for arbitrary value types.
///
/// Clones share the slot.
#[derive(Debug)]
pub struct ResultCell<V> {
    space: MemorySpace,
    value: Arc<Mutex<Option<V>>>,
}

impl<V> Clone for ResultCell<V> {
    fn clone(&self) -> Self {
        Self {
            space: self.space,
            value: Arc::clone(&self.value),
        }
    }
}

impl<V> Default for ResultCell<V> {
    fn default() -> Self {
        Self::new_in(MemorySpace::Host)
    }
}

impl<V> ResultCell<V> {
    /// Empty slot in `space`.
    #[must_use]
    pub fn new_in(space: MemorySpace) -> Self {
        Self {
            space,
            value: Arc::new(Mutex::new(None)),
        }
    }

    /// Memory space of the slot.
    #[must_use]
    pub fn space(&self) -> MemorySpace {
        self.space
    }

    /// Take the stored value, leaving the slot empty.
    #[must_use]
    pub fn take(&self) -> Option<V> {
        self.value.lock().take()
    }
}

impl<V: Clone> ResultCell<V> {
    /// Copy of the stored value.
    #[must_use]
    pub fn get(&self) -> Option<V> {
        self.value.lock().clone()
    }
}

impl<V: Send + 'static> ReduceTarget<V> for ResultCell<V> {
    fn memory_space(&self) -> Option<MemorySpace> {
        Some(self.space)
    }

    fn store(&self, value: V) {
        *self.value.lock() = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold_all<V, R: Reducer<V>>(reducer: &R, values: impl IntoIterator<Item = V>) -> V {
        values
            .into_iter()
            .fold(reducer.identity(), |acc, v| reducer.join(acc, v))
    }

    #[test]
    fn builtin_reducers() {
        assert_eq!(fold_all(&Sum, [1_i32, 2, 3]), 6);
        assert_eq!(fold_all(&Prod, [2_u64, 3, 4]), 24);
        assert_eq!(fold_all(&Min, [3.5_f64, -1.0, 2.0]), -1.0);
        assert_eq!(fold_all(&Max, [3_i8, -1, 7]), 7);
        assert_eq!(fold_all::<u16, _>(&Max, []), u16::MIN);
    }

    #[test]
    fn fold_without_identity() {
        let fold = Fold::new(|a: String, b: String| a + &b);
        let parts = [None, Some("ab".to_owned()), None, Some("c".to_owned())];
        assert_eq!(fold_all(&fold, parts), Some("abc".to_owned()));
        assert_eq!(fold_all(&fold, [None::<String>, None]), None);
    }

    #[test]
    fn view_targets_need_one_element() {
        let ok = View::<i32>::new("r", 1);
        assert_eq!(ok.validate(), Ok(()));
        ok.store(5);
        assert_eq!(ok.get(0), 5);
        assert_eq!(View::<i32>::new("r", 3).validate(), Err(Error::ResultExtent(3)));
    }

    #[test]
    fn result_cell_is_shared() {
        let cell = ResultCell::new_in(MemorySpace::HostPinned);
        let other = cell.clone();
        other.store(vec![1, 2]);
        assert_eq!(cell.get(), Some(vec![1, 2]));
        assert_eq!(cell.take(), Some(vec![1, 2]));
        assert_eq!(other.get(), None);
        assert_eq!(ReduceTarget::<u8>::memory_space(&()), None);
    }
}
