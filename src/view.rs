//! Backend-managed buffers.
//!
//! [`View`] is the smallest buffer abstraction the bridge needs: a labelled,
//! reference-counted, fixed-length array tagged with the [`MemorySpace`] it
//! lives in. Elements sit in atomic cells so kernels running on several
//! threads can write disjoint indices through shared handles. Relaxed
//! accesses are sufficient because every hand-off between submitter and
//! kernel goes through a completion handle or a backend queue, both of
//! which synchronize.

use crate::types::Label;
use core::{
    fmt,
    ops::Range,
    sync::atomic::{
        AtomicBool, AtomicI8, AtomicI16, AtomicI32, AtomicI64, AtomicIsize, AtomicU8, AtomicU16,
        AtomicU32, AtomicU64, AtomicUsize, Ordering,
    },
};
use std::sync::Arc;

/// Where a buffer's storage lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MemorySpace {
    /// Pageable host memory.
    #[default]
    Host,
    /// Page-locked host memory; device-to-host copies into it are
    /// asynchronous.
    HostPinned,
    /// Device memory.
    Device,
}

impl MemorySpace {
    /// Whether a device writing its result here can do so without forcing
    /// the host to wait, given the space the backend asks for.
    #[must_use]
    pub fn accepts_async_copy(self, required: Self) -> bool {
        self == required || self == Self::Device
    }
}

/// Element types a [`View`] can hold.
pub trait Element: Copy + Send + Sync + PartialEq + fmt::Debug + 'static {
    /// Atomic storage cell for one element.
    type Cell: Send + Sync;

    /// Wrap a value in a cell.
    fn cell(value: Self) -> Self::Cell;
    /// Read a cell.
    fn load(cell: &Self::Cell) -> Self;
    /// Write a cell.
    fn store(cell: &Self::Cell, value: Self);
}

/// Elements with the arithmetic the built-in reducers and scans need.
pub trait Arithmetic: Element + PartialOrd {
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;
    /// Smallest representable value (identity of `max`).
    const LOWEST: Self;
    /// Largest representable value (identity of `min`).
    const HIGHEST: Self;

    /// `self + rhs`.
    #[must_use]
    fn add(self, rhs: Self) -> Self;
    /// `self * rhs`.
    #[must_use]
    fn mul(self, rhs: Self) -> Self;
}

macro_rules! impl_integer {
    ($($ty:ty => $atomic:ty),* $(,)?) => {$(
        impl Element for $ty {
            type Cell = $atomic;

            fn cell(value: Self) -> Self::Cell {
                <$atomic>::new(value)
            }

            fn load(cell: &Self::Cell) -> Self {
                cell.load(Ordering::Relaxed)
            }

            fn store(cell: &Self::Cell, value: Self) {
                cell.store(value, Ordering::Relaxed);
            }
        }

        impl Arithmetic for $ty {
            const ZERO: Self = 0;
            const ONE: Self = 1;
            const LOWEST: Self = <$ty>::MIN;
            const HIGHEST: Self = <$ty>::MAX;

            fn add(self, rhs: Self) -> Self {
                self + rhs
            }

            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }
        }
    )*};
}

impl_integer!(
    i8 => AtomicI8,
    i16 => AtomicI16,
    i32 => AtomicI32,
    i64 => AtomicI64,
    isize => AtomicIsize,
    u8 => AtomicU8,
    u16 => AtomicU16,
    u32 => AtomicU32,
    u64 => AtomicU64,
    usize => AtomicUsize,
);

macro_rules! impl_float {
    ($($ty:ty => $atomic:ty),* $(,)?) => {$(
        impl Element for $ty {
            type Cell = $atomic;

            fn cell(value: Self) -> Self::Cell {
                <$atomic>::new(value.to_bits())
            }

            fn load(cell: &Self::Cell) -> Self {
                <$ty>::from_bits(cell.load(Ordering::Relaxed))
            }

            fn store(cell: &Self::Cell, value: Self) {
                cell.store(value.to_bits(), Ordering::Relaxed);
            }
        }

        impl Arithmetic for $ty {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const LOWEST: Self = <$ty>::NEG_INFINITY;
            const HIGHEST: Self = <$ty>::INFINITY;

            fn add(self, rhs: Self) -> Self {
                self + rhs
            }

            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }
        }
    )*};
}

impl_float!(f32 => AtomicU32, f64 => AtomicU64);

impl Element for bool {
    type Cell = AtomicBool;

    fn cell(value: Self) -> Self::Cell {
        AtomicBool::new(value)
    }

    fn load(cell: &Self::Cell) -> Self {
        cell.load(Ordering::Relaxed)
    }

    fn store(cell: &Self::Cell, value: Self) {
        cell.store(value, Ordering::Relaxed);
    }
}

struct Storage<T: Element> {
    cells: Box<[T::Cell]>,
    space: MemorySpace,
}

/// Labelled, shared, fixed-length buffer.
///
/// Clones and subviews alias the same storage.
pub struct View<T: Element> {
    label: Label,
    storage: Arc<Storage<T>>,
    offset: usize,
    len: usize,
}

impl<T: Element> Clone for View<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            storage: Arc::clone(&self.storage),
            offset: self.offset,
            len: self.len,
        }
    }
}

impl<T: Element> fmt::Debug for View<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("label", &self.label)
            .field("space", &self.storage.space)
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

impl<T: Element + Default> View<T> {
    /// Zero-initialized host view.
    pub fn new(label: impl Into<Label>, len: usize) -> Self {
        Self::filled_in(label, len, T::default(), MemorySpace::Host)
    }

    /// Zero-initialized view in the given memory space.
    pub fn new_in(label: impl Into<Label>, len: usize, space: MemorySpace) -> Self {
        Self::filled_in(label, len, T::default(), space)
    }
}

impl<T: Element> View<T> {
    /// View in `space` with every element set to `value`.
    pub fn filled_in(label: impl Into<Label>, len: usize, value: T, space: MemorySpace) -> Self {
        Self::from_cells(label.into(), (0..len).map(|_| T::cell(value)).collect(), space)
    }

    /// Host view holding a copy of `data`.
    pub fn from_slice(label: impl Into<Label>, data: &[T]) -> Self {
        Self::from_slice_in(label, data, MemorySpace::Host)
    }

    /// View in `space` holding a copy of `data`.
    pub fn from_slice_in(label: impl Into<Label>, data: &[T], space: MemorySpace) -> Self {
        Self::from_cells(label.into(), data.iter().map(|&v| T::cell(v)).collect(), space)
    }

    fn from_cells(label: Label, cells: Box<[T::Cell]>, space: MemorySpace) -> Self {
        let len = cells.len();
        Self {
            label,
            storage: Arc::new(Storage { cells, space }),
            offset: 0,
            len,
        }
    }

    /// Diagnostic label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Memory space of the underlying storage.
    #[must_use]
    pub fn space(&self) -> MemorySpace {
        self.storage.space
    }

    fn cell(&self, index: usize) -> &T::Cell {
        assert!(
            index < self.len,
            "index {index} out of bounds for view `{}` of length {}",
            self.label,
            self.len
        );
        &self.storage.cells[self.offset + index]
    }

    /// Read element `index`.
    ///
    /// # Panics
    /// If `index` is out of bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> T {
        T::load(self.cell(index))
    }

    /// Write element `index`.
    ///
    /// # Panics
    /// If `index` is out of bounds.
    pub fn set(&self, index: usize, value: T) {
        T::store(self.cell(index), value);
    }

    /// Set every element to `value`.
    pub fn fill(&self, value: T) {
        for index in 0..self.len {
            self.set(index, value);
        }
    }

    /// Copy the contents out.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        (0..self.len).map(|index| self.get(index)).collect()
    }

    /// A view of `range` aliasing this view's storage.
    ///
    /// # Panics
    /// If `range` is not within `0..self.len()`.
    #[must_use]
    pub fn subview(&self, range: Range<usize>) -> Self {
        assert!(
            range.start <= range.end && range.end <= self.len,
            "subview {range:?} out of bounds for view `{}` of length {}",
            self.label,
            self.len
        );
        Self {
            label: self.label.clone(),
            storage: Arc::clone(&self.storage),
            offset: self.offset + range.start,
            len: range.len(),
        }
    }

    /// Whether both views alias the same allocation.
    #[must_use]
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Whether both views alias at least one common element.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.shares_storage(other)
            && !self.is_empty()
            && !other.is_empty()
            && self.offset < other.offset + other.len
            && other.offset < self.offset + self.len
    }

    /// Random-access position range over `range` of this view.
    ///
    /// # Panics
    /// If `range` is not within `0..self.len()`.
    #[must_use]
    pub fn range(&self, range: Range<usize>) -> ViewRange<T> {
        ViewRange {
            view: self.subview(range),
        }
    }

    /// Random-access position range over the whole view.
    #[must_use]
    pub fn positions(&self) -> ViewRange<T> {
        ViewRange { view: self.clone() }
    }
}

/// A `[begin, end)` pair of positions into a [`View`].
///
/// Dereferencing position `i` is an offset computation, which is what lets
/// generic algorithms translate it into an index-based kernel.
#[derive(Debug, Clone)]
pub struct ViewRange<T: Element> {
    view: View<T>,
}

impl<T: Element> ViewRange<T> {
    /// Number of positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.view.len()
    }

    /// Whether the range is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Value at `offset` positions past the beginning.
    #[must_use]
    pub fn at(&self, offset: usize) -> T {
        self.view.get(offset)
    }

    /// The positions as a view.
    #[must_use]
    pub fn as_view(&self) -> &View<T> {
        &self.view
    }
}
