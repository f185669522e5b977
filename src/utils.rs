use core::ops::Range;

pub(crate) trait RangeChunks {
    /// Split into at most `count` contiguous, non-empty chunks whose lengths
    /// differ by at most one.
    fn chunks(&self, count: usize) -> Vec<Range<usize>>;
}

impl RangeChunks for Range<usize> {
    fn chunks(&self, count: usize) -> Vec<Range<usize>> {
        let len = self.end.saturating_sub(self.start);
        let count = count.clamp(1, len.max(1));
        let base = len / count;
        let rem = len % count;
        let mut start = self.start;
        (0..count)
            .map(|chunk| {
                let end = start + base + usize::from(chunk < rem);
                let range = start..end;
                start = end;
                range
            })
            .filter(|range| !range.is_empty())
            .collect()
    }
}
