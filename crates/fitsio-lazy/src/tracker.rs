//! Bookkeeping of which data bytes of a container have been fetched.
//!
//! This is reporting only. Re-reading a range that was already recorded is
//! always allowed; the tracker just answers whether any HDU with data still
//! has bytes nobody has asked for.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::plan::ByteRange;

/// A set of half-open `u64` intervals, kept sorted and disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
    spans: Vec<(u64, u64)>,
}

impl RangeSet {
    pub fn new() -> Self {
        RangeSet::default()
    }

    /// Adds `start..end`, merging with anything it touches.
    pub fn insert(&mut self, start: u64, end: u64) {
        if start >= end {
            return;
        }
        let first = self.spans.partition_point(|&(_, e)| e < start);
        let last = self.spans.partition_point(|&(s, _)| s <= end);
        if first == last {
            self.spans.insert(first, (start, end));
            return;
        }
        let merged = (
            start.min(self.spans[first].0),
            end.max(self.spans[last - 1].1),
        );
        self.spans.splice(first..last, core::iter::once(merged));
    }

    /// Total number of bytes covered.
    pub fn covered(&self) -> u64 {
        self.spans.iter().map(|(s, e)| e - s).sum()
    }

    /// Returns `true` if `start..end` lies inside a single span.
    pub fn contains(&self, start: u64, end: u64) -> bool {
        if start >= end {
            return true;
        }
        let i = self.spans.partition_point(|&(s, _)| s <= start);
        i > 0 && self.spans[i - 1].1 >= end
    }

    pub fn spans(&self) -> &[(u64, u64)] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Extent {
    data: ByteRange,
    fetched: RangeSet,
}

/// Per-container record of fetched data ranges, keyed by HDU index.
#[derive(Debug, Clone, Default)]
pub struct MaterializationTracker {
    extents: BTreeMap<usize, Extent>,
}

impl MaterializationTracker {
    pub fn new() -> Self {
        MaterializationTracker::default()
    }

    /// Declares the data segment of an HDU. HDUs without data are not tracked.
    pub fn register(&mut self, hdu: usize, data: ByteRange) {
        if data.length == 0 {
            return;
        }
        self.extents.insert(
            hdu,
            Extent {
                data,
                fetched: RangeSet::new(),
            },
        );
    }

    /// Records a fetched byte range, clipped to the HDU's data segment.
    pub fn record(&mut self, hdu: usize, range: ByteRange) {
        if let Some(extent) = self.extents.get_mut(&hdu) {
            let start = range.offset.max(extent.data.offset);
            let end = range.end().min(extent.data.end());
            extent.fetched.insert(start, end);
        }
    }

    /// Marks the whole data segment of an HDU as fetched.
    pub fn mark_full(&mut self, hdu: usize) {
        if let Some(extent) = self.extents.get_mut(&hdu) {
            extent.fetched.insert(extent.data.offset, extent.data.end());
        }
    }

    /// Bytes of the HDU's data segment fetched so far.
    pub fn fetched_bytes(&self, hdu: usize) -> u64 {
        self.extents
            .get(&hdu)
            .map_or(0, |extent| extent.fetched.covered())
    }

    /// HDUs without data count as fully materialized.
    pub fn is_fully_materialized(&self, hdu: usize) -> bool {
        self.extents.get(&hdu).map_or(true, |extent| {
            extent
                .fetched
                .contains(extent.data.offset, extent.data.end())
        })
    }

    /// Returns `true` if at least one tracked HDU still has unfetched bytes.
    pub fn any_partial(&self) -> bool {
        self.extents
            .keys()
            .any(|&hdu| !self.is_fully_materialized(hdu))
    }
}
