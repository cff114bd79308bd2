//! Translation of a normalized index into byte ranges.
//!
//! Storage is row-major with the last axis fastest. Trailing axes that are
//! selected whole collapse into one contiguous chunk; the first axis that is
//! not whole either extends that chunk (unit step) or splits it into one run
//! per selected index. Everything further out is iterated index by index.
//! Runs are kept in output order for reassembly, while the ranges handed to
//! the byte source are sorted and coalesced.

use alloc::vec::Vec;

use crate::array::row_major_strides;
use crate::descriptor::ExtensionDescriptor;
use crate::error::{Error, Result};
use crate::index::{AxisSelector, IndexSpec};

/// A half-open span of bytes, `offset..offset + length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        ByteRange { offset, length }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    pub fn contains(&self, other: &ByteRange) -> bool {
        self.offset <= other.offset && other.end() <= self.end()
    }
}

/// The byte ranges to fetch for one section read, and how to lay them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    /// Sorted, non-overlapping, adjacent ranges merged.
    pub ranges: Vec<ByteRange>,
    /// Contiguous source spans in output order.
    pub runs: Vec<ByteRange>,
    /// Shape of the assembled result.
    pub shape: Vec<usize>,
    pub element_size: usize,
}

impl FetchPlan {
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Bytes that will be read from the source.
    pub fn total_bytes(&self) -> u64 {
        self.ranges.iter().map(|r| r.length).sum()
    }

    /// Copies the runs out of `fetched` (one buffer per entry of `ranges`)
    /// into a single buffer in output order.
    pub fn assemble(&self, fetched: &[Vec<u8>]) -> Result<Vec<u8>> {
        if fetched.len() != self.ranges.len() {
            return Err(Error::ShapeMismatch {
                expected: self.ranges.len(),
                actual: fetched.len(),
            });
        }
        let total: u64 = self.runs.iter().map(|r| r.length).sum();
        let mut out = Vec::with_capacity(total as usize);
        for run in &self.runs {
            let i = self
                .ranges
                .partition_point(|r| r.offset <= run.offset)
                .checked_sub(1)
                .ok_or(Error::UnexpectedEof)?;
            let range = &self.ranges[i];
            if !range.contains(run) {
                return Err(Error::UnexpectedEof);
            }
            let start = (run.offset - range.offset) as usize;
            let bytes = fetched[i]
                .get(start..start + run.length as usize)
                .ok_or(Error::ShortRead {
                    offset: range.offset,
                    expected: range.length,
                    actual: fetched[i].len() as u64,
                })?;
            out.extend_from_slice(bytes);
        }
        Ok(out)
    }
}

/// Sorts ranges and merges those that touch or overlap.
pub fn coalesce(mut ranges: Vec<ByteRange>) -> Vec<ByteRange> {
    ranges.sort_unstable();
    let mut merged: Vec<ByteRange> = Vec::with_capacity(ranges.len());
    for r in ranges.into_iter().filter(|r| r.length > 0) {
        match merged.last_mut() {
            Some(last) if r.offset <= last.end() => {
                last.length = last.end().max(r.end()) - last.offset;
            }
            _ => merged.push(r),
        }
    }
    merged
}

/// How the pivot axis (the outermost axis inside the odometer) is read.
enum Pivot {
    /// One run of `count` consecutive indices starting at `start`.
    Contiguous { start: usize, count: usize },
    /// One run per listed index.
    Each(Vec<usize>),
}

/// Resolve a normalized index against an HDU's data layout.
pub fn resolve(desc: &ExtensionDescriptor, spec: &IndexSpec) -> Result<FetchPlan> {
    if !desc.sliceable() {
        return Err(Error::AttributeNotSupported {
            kind: desc.kind.type_name(),
            attribute: "section",
        });
    }
    if spec.shape != desc.shape {
        return Err(Error::ShapeMismatch {
            expected: desc.element_count(),
            actual: spec.shape.iter().product(),
        });
    }

    let element_size = desc.dtype.size();
    let shape = spec.output_shape();
    let axes: Vec<(AxisSelector, usize)> = spec.consuming().map(|(s, n)| (*s, n)).collect();

    if axes.iter().any(|(s, n)| s.count(*n) == 0) {
        return Ok(FetchPlan {
            ranges: Vec::new(),
            runs: Vec::new(),
            shape,
            element_size,
        });
    }

    let strides = row_major_strides(&desc.shape);

    // Trailing whole axes form one contiguous chunk of `chunk` elements.
    let mut inner = axes.len();
    let mut chunk = 1usize;
    while inner > 0 && axes[inner - 1].0.is_full(axes[inner - 1].1) {
        inner -= 1;
        chunk *= axes[inner].1;
    }

    let mut runs = Vec::new();
    let byte_run = |element: usize, len: usize| {
        ByteRange::new(
            desc.data_offset + (element * element_size) as u64,
            (len * element_size) as u64,
        )
    };

    if inner == 0 {
        runs.push(byte_run(0, chunk));
    } else {
        let pivot_axis = inner - 1;
        let (selector, size) = axes[pivot_axis];
        let pivot = match selector {
            AxisSelector::Point(i) => Pivot::Contiguous { start: i, count: 1 },
            AxisSelector::Range { start, step: 1, .. } => Pivot::Contiguous {
                start: start as usize,
                count: selector.count(size),
            },
            other => Pivot::Each(other.indices(size).collect()),
        };
        let pivot_stride = strides[pivot_axis];

        let outer: Vec<Vec<usize>> = axes[..pivot_axis]
            .iter()
            .map(|(s, n)| s.indices(*n).collect())
            .collect();
        let mut cursor = alloc::vec![0usize; outer.len()];
        'odometer: loop {
            let base: usize = cursor
                .iter()
                .enumerate()
                .map(|(axis, &k)| outer[axis][k] * strides[axis])
                .sum();
            match &pivot {
                Pivot::Contiguous { start, count } => {
                    runs.push(byte_run(base + start * pivot_stride, count * chunk));
                }
                Pivot::Each(indices) => {
                    runs.extend(indices.iter().map(|&i| byte_run(base + i * pivot_stride, chunk)));
                }
            }

            let mut axis = outer.len();
            loop {
                if axis == 0 {
                    break 'odometer;
                }
                axis -= 1;
                cursor[axis] += 1;
                if cursor[axis] < outer[axis].len() {
                    break;
                }
                cursor[axis] = 0;
            }
        }
    }

    let ranges = coalesce(runs.clone());
    tracing::trace!(
        hdu = desc.index,
        runs = runs.len(),
        ranges = ranges.len(),
        bytes = ranges.iter().map(|r| r.length).sum::<u64>(),
        "resolved fetch plan"
    );
    Ok(FetchPlan {
        ranges,
        runs,
        shape,
        element_size,
    })
}
