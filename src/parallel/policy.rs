use crate::space::{DefaultExecutionSpace, ExecutionSpace};
use core::{fmt, ops::Range};

/// An index-space descriptor bound to an execution-space instance.
pub trait IndexSpace: Clone + Send + Sync + 'static {
    /// Backend the kernel is launched on.
    type Space: ExecutionSpace;
    /// Index handed to the kernel body.
    type Index: Send;

    /// The instance the kernel is launched on.
    fn space(&self) -> &Self::Space;

    /// Number of indices.
    fn len(&self) -> usize;

    /// Whether the index space is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index at flat position `offset`.
    fn index(&self, offset: usize) -> Self::Index;

    /// Smallest number of consecutive indices one worker should take.
    fn min_chunk(&self) -> usize {
        1
    }
}

/// Conversion into an [`IndexSpace`].
///
/// A flat count and a `Range<usize>` launch on the global instance of
/// [`DefaultExecutionSpace`].
pub trait IntoIndexSpace {
    /// Resulting descriptor.
    type Target: IndexSpace;

    /// Perform the conversion.
    fn into_index_space(self) -> Self::Target;
}

impl IntoIndexSpace for usize {
    type Target = RangePolicy<DefaultExecutionSpace>;

    fn into_index_space(self) -> Self::Target {
        RangePolicy::new(DefaultExecutionSpace::global(), 0..self)
    }
}

impl IntoIndexSpace for Range<usize> {
    type Target = RangePolicy<DefaultExecutionSpace>;

    fn into_index_space(self) -> Self::Target {
        RangePolicy::new(DefaultExecutionSpace::global(), self)
    }
}

/// Flat 1-D index range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangePolicy<S: ExecutionSpace = DefaultExecutionSpace> {
    space: S,
    range: Range<usize>,
    chunk: usize,
}

impl<S: ExecutionSpace> RangePolicy<S> {
    /// `range` on `space`.
    pub fn new(space: S, range: Range<usize>) -> Self {
        Self {
            space,
            range,
            chunk: 1,
        }
    }

    /// `range` on the global instance of `S`.
    pub fn global(range: Range<usize>) -> Self {
        Self::new(S::global(), range)
    }

    /// Set the minimum chunk of consecutive indices per worker.
    #[must_use]
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    /// The same range on another instance.
    #[must_use]
    pub fn with_space(self, space: S) -> Self {
        Self { space, ..self }
    }

    /// Index bounds.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }
}

impl<S: ExecutionSpace> IndexSpace for RangePolicy<S> {
    type Space = S;
    type Index = usize;

    fn space(&self) -> &S {
        &self.space
    }

    fn len(&self) -> usize {
        self.range.end.saturating_sub(self.range.start)
    }

    fn index(&self, offset: usize) -> usize {
        self.range.start + offset
    }

    fn min_chunk(&self) -> usize {
        self.chunk
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Integral index types accepted by multi-dimensional ranges and
/// `for_loop`.
///
/// Sealed: floating-point or other bounds do not compile.
pub trait Integral:
    sealed::Sealed + Copy + Send + Sync + PartialOrd + fmt::Debug + 'static
{
    /// Widen to the common offset type.
    fn to_wide(self) -> i128;
    /// Narrow back from the common offset type.
    fn from_wide(wide: i128) -> Self;
}

macro_rules! impl_integral {
    ($($ty:ty),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}

        impl Integral for $ty {
            fn to_wide(self) -> i128 {
                i128::from(self)
            }

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            fn from_wide(wide: i128) -> Self {
                wide as Self
            }
        }
    )*};
}

impl_integral!(i8, i16, i32, i64, u8, u16, u32, u64);

impl sealed::Sealed for usize {}

impl Integral for usize {
    fn to_wide(self) -> i128 {
        self as i128
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_wide(wide: i128) -> Self {
        wide as Self
    }
}

impl sealed::Sealed for isize {}

impl Integral for isize {
    fn to_wide(self) -> i128 {
        self as i128
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_wide(wide: i128) -> Self {
        wide as Self
    }
}

/// Number of indices in `[first, last)`; zero when `last <= first`.
pub(crate) fn span<I: Integral>(first: I, last: I) -> usize {
    usize::try_from((last.to_wide() - first.to_wide()).max(0)).unwrap_or(usize::MAX)
}

/// `first + offset`.
pub(crate) fn advance<I: Integral>(first: I, offset: usize) -> I {
    I::from_wide(first.to_wide() + offset as i128)
}

/// Rectangular `N`-dimensional index range, iterated row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct MdRangePolicy<S: ExecutionSpace, I: Integral, const N: usize> {
    space: S,
    lower: [I; N],
    upper: [I; N],
    tile: Option<[usize; N]>,
}

impl<S: ExecutionSpace, I: Integral, const N: usize> MdRangePolicy<S, I, N> {
    /// `[lower, upper)` on `space`.
    pub fn new(space: S, lower: [I; N], upper: [I; N]) -> Self {
        Self {
            space,
            lower,
            upper,
            tile: None,
        }
    }

    /// `[lower, upper)` on the global instance of `S`.
    pub fn global(lower: [I; N], upper: [I; N]) -> Self {
        Self::new(S::global(), lower, upper)
    }

    /// Tile-size hint. Tiles along the innermost dimension set the minimum
    /// chunk a worker takes.
    #[must_use]
    pub fn with_tile(mut self, tile: [usize; N]) -> Self {
        self.tile = Some(tile);
        self
    }

    /// The same range on another instance.
    #[must_use]
    pub fn with_space(self, space: S) -> Self {
        Self { space, ..self }
    }

    /// Extent along each dimension.
    #[must_use]
    pub fn extents(&self) -> [usize; N] {
        core::array::from_fn(|dim| span(self.lower[dim], self.upper[dim]))
    }
}

impl<S: ExecutionSpace, I: Integral, const N: usize> IndexSpace for MdRangePolicy<S, I, N> {
    type Space = S;
    type Index = [I; N];

    fn space(&self) -> &S {
        &self.space
    }

    fn len(&self) -> usize {
        self.extents().iter().product()
    }

    fn index(&self, offset: usize) -> [I; N] {
        let extents = self.extents();
        let mut rest = offset;
        let mut index = self.lower;
        for dim in (0..N).rev() {
            index[dim] = advance(self.lower[dim], rest % extents[dim]);
            rest /= extents[dim];
        }
        index
    }

    fn min_chunk(&self) -> usize {
        self.tile
            .and_then(|tile| tile.last().copied())
            .map_or(1, |inner| inner.max(1))
    }
}

/// Hierarchical launch: a league of teams, each with `team_size` members.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamPolicy<S: ExecutionSpace = DefaultExecutionSpace> {
    space: S,
    league_size: usize,
    team_size: usize,
}

impl<S: ExecutionSpace> TeamPolicy<S> {
    /// `league_size` teams of `team_size` members on `space`.
    pub fn new(space: S, league_size: usize, team_size: usize) -> Self {
        Self {
            space,
            league_size,
            team_size: team_size.max(1),
        }
    }

    /// The same policy on the global instance of `S`.
    pub fn global(league_size: usize, team_size: usize) -> Self {
        Self::new(S::global(), league_size, team_size)
    }

    /// Number of teams.
    #[must_use]
    pub fn league_size(&self) -> usize {
        self.league_size
    }

    /// Members per team.
    #[must_use]
    pub fn team_size(&self) -> usize {
        self.team_size
    }
}

/// Position of one kernel invocation inside a [`TeamPolicy`] launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TeamMember {
    /// Team index within the league.
    pub league_rank: usize,
    /// Member index within the team.
    pub team_rank: usize,
    /// Number of teams.
    pub league_size: usize,
    /// Members per team.
    pub team_size: usize,
}

impl<S: ExecutionSpace> IndexSpace for TeamPolicy<S> {
    type Space = S;
    type Index = TeamMember;

    fn space(&self) -> &S {
        &self.space
    }

    /// Saturates at `usize::MAX` members.
    fn len(&self) -> usize {
        self.league_size.saturating_mul(self.team_size)
    }

    fn index(&self, offset: usize) -> TeamMember {
        TeamMember {
            league_rank: offset / self.team_size,
            team_rank: offset % self.team_size,
            league_size: self.league_size,
            team_size: self.team_size,
        }
    }

    fn min_chunk(&self) -> usize {
        self.team_size
    }
}

macro_rules! impl_into_index_space {
    ($($policy:ty => [$($gen:tt)*]),* $(,)?) => {$(
        impl<$($gen)*> IntoIndexSpace for $policy {
            type Target = Self;

            fn into_index_space(self) -> Self {
                self
            }
        }
    )*};
}

impl_into_index_space!(
    RangePolicy<S> => [S: ExecutionSpace],
    MdRangePolicy<S, I, N> => [S: ExecutionSpace, I: Integral, const N: usize],
    TeamPolicy<S> => [S: ExecutionSpace],
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::Serial;

    #[test]
    fn range_policy_offsets() {
        let policy = RangePolicy::new(Serial, 10..14).with_chunk(0);
        assert_eq!(policy.len(), 4);
        assert_eq!(policy.index(0), 10);
        assert_eq!(policy.index(3), 13);
        assert_eq!(policy.min_chunk(), 1);
        assert!(RangePolicy::new(Serial, 5..2).is_empty());
    }

    #[test]
    fn md_range_is_row_major() {
        let policy = MdRangePolicy::new(Serial, [1_i32, -1], [3, 2]);
        assert_eq!(policy.extents(), [2, 3]);
        let indices: Vec<_> = (0..policy.len()).map(|offset| policy.index(offset)).collect();
        assert_eq!(
            indices,
            vec![[1, -1], [1, 0], [1, 1], [2, -1], [2, 0], [2, 1]]
        );
    }

    #[test]
    fn md_range_tile_sets_min_chunk() {
        let policy = MdRangePolicy::new(Serial, [0_u64; 3], [4, 4, 8]).with_tile([1, 2, 4]);
        assert_eq!(policy.len(), 128);
        assert_eq!(policy.min_chunk(), 4);
        let empty = MdRangePolicy::new(Serial, [5_usize, 0], [2, 10]);
        assert!(empty.is_empty());
    }

    #[test]
    fn team_members_enumerate_league() {
        let policy = TeamPolicy::new(Serial, 3, 2);
        assert_eq!(policy.len(), 6);
        let member = policy.index(5);
        assert_eq!((member.league_rank, member.team_rank), (2, 1));
        assert_eq!((member.league_size, member.team_size), (3, 2));
    }

    #[test]
    fn oversized_league_saturates() {
        let policy = TeamPolicy::new(Serial, usize::MAX / 2, 3);
        assert_eq!(policy.len(), usize::MAX);
        let last = policy.index(usize::MAX);
        assert!(last.league_rank < policy.league_size());
        assert_eq!(last.team_rank, usize::MAX % 3);
    }

    #[test]
    fn integral_span_and_advance() {
        assert_eq!(span(-3_i64, 4), 7);
        assert_eq!(span(9_u8, 2), 0);
        assert_eq!(advance(250_u8, 5), 255);
        assert_eq!(advance(-2_isize, 2), 0);
    }
}
