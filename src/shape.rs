//! Random-access index shapes accepted by bulk submission and the generic
//! algorithms.
//!
//! A shape is anything whose elements can be fetched by offset, which is
//! what turns it into a single index-based kernel launch. Only random-access
//! containers implement [`Shape`]; sequential iterators do not and are
//! rejected at compile time.

use crate::view::{Element, View, ViewRange};
use core::ops::Range;
use std::sync::Arc;

/// A random-access sequence of work items.
pub trait Shape: Send + Sync + 'static {
    /// Item handed to the kernel for each position.
    type Item: Send;

    /// Number of positions.
    fn len(&self) -> usize;

    /// Whether there are no positions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item at `offset` positions from the beginning.
    fn at(&self, offset: usize) -> Self::Item;
}

/// `0..n`.
impl Shape for usize {
    type Item = usize;

    fn len(&self) -> usize {
        *self
    }

    fn at(&self, offset: usize) -> usize {
        offset
    }
}

impl Shape for Range<usize> {
    type Item = usize;

    fn len(&self) -> usize {
        ExactSizeIterator::len(self)
    }

    fn at(&self, offset: usize) -> usize {
        self.start + offset
    }
}

impl<T: Clone + Send + Sync + 'static> Shape for Vec<T> {
    type Item = T;

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn at(&self, offset: usize) -> T {
        self[offset].clone()
    }
}

impl<T: Clone + Send + Sync + 'static> Shape for Arc<[T]> {
    type Item = T;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn at(&self, offset: usize) -> T {
        self[offset].clone()
    }
}

impl<T: Element> Shape for View<T> {
    type Item = T;

    fn len(&self) -> usize {
        View::len(self)
    }

    fn at(&self, offset: usize) -> T {
        self.get(offset)
    }
}

impl<T: Element> Shape for ViewRange<T> {
    type Item = T;

    fn len(&self) -> usize {
        ViewRange::len(self)
    }

    fn at(&self, offset: usize) -> T {
        ViewRange::at(self, offset)
    }
}
