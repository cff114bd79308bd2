//! Index expressions and their normalization against an array shape.
//!
//! An [`IndexExpr`] is the NumPy basic-indexing vocabulary: integers,
//! slices, one ellipsis, and `newaxis`. [`normalize`] resolves it against a
//! concrete shape into an [`IndexSpec`] with exactly one dimension-consuming
//! [`AxisSelector`] per axis, all bounds checked and all negatives resolved.

use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::error::IndexError;

/// A Python-style `start:stop:step` slice. `None` fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl Slice {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Slice { start, stop, step }
    }

    /// The slice `:`.
    pub fn full() -> Self {
        Slice::default()
    }

    /// The slice `start:stop`.
    pub fn range(start: i64, stop: i64) -> Self {
        Slice::new(Some(start), Some(stop), None)
    }

    /// Resolve against an axis of length `size` the way CPython's
    /// `PySlice_AdjustIndices` does. Returns `(start, stop, step, count)`.
    pub fn adjust(&self, size: usize) -> Result<(i64, i64, i64, usize), IndexError> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(IndexError::ZeroStep);
        }
        // `-step` must stay representable.
        let step = step.max(-i64::MAX);
        let len = size as i64;
        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
        let clamp = |v: i64| {
            let v = if v < 0 { v + len } else { v };
            v.clamp(lower, upper)
        };
        let start = self.start.map_or(if step < 0 { upper } else { lower }, clamp);
        let stop = self.stop.map_or(if step < 0 { lower } else { upper }, clamp);

        let count = if step < 0 {
            if stop < start {
                (start - stop - 1) / step.unsigned_abs() as i64 + 1
            } else {
                0
            }
        } else if start < stop {
            (stop - start - 1) / step + 1
        } else {
            0
        };
        Ok((start, stop, step, count as usize))
    }
}

/// One element of an index expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexItem {
    Int(i64),
    Slice(Slice),
    Ellipsis,
    NewAxis,
}

impl IndexItem {
    fn consumes_axis(&self) -> bool {
        matches!(self, IndexItem::Int(_) | IndexItem::Slice(_))
    }
}

impl From<i64> for IndexItem {
    fn from(i: i64) -> Self {
        IndexItem::Int(i)
    }
}

impl From<Slice> for IndexItem {
    fn from(s: Slice) -> Self {
        IndexItem::Slice(s)
    }
}

/// An ordered index expression, as written inside `a[...]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexExpr {
    items: Vec<IndexItem>,
}

impl IndexExpr {
    pub fn new(items: Vec<IndexItem>) -> Self {
        IndexExpr { items }
    }

    /// The empty expression, which selects everything.
    pub fn all() -> Self {
        IndexExpr::default()
    }

    pub fn items(&self) -> &[IndexItem] {
        &self.items
    }
}

impl From<Vec<IndexItem>> for IndexExpr {
    fn from(items: Vec<IndexItem>) -> Self {
        IndexExpr::new(items)
    }
}

impl From<IndexItem> for IndexExpr {
    fn from(item: IndexItem) -> Self {
        IndexExpr::new(alloc::vec![item])
    }
}

impl From<i64> for IndexExpr {
    fn from(i: i64) -> Self {
        IndexItem::Int(i).into()
    }
}

impl From<Slice> for IndexExpr {
    fn from(s: Slice) -> Self {
        IndexItem::Slice(s).into()
    }
}

fn parse_bound(text: &str) -> Result<Option<i64>, IndexError> {
    let text = text.trim();
    if text.is_empty() || text == "None" {
        return Ok(None);
    }
    text.parse()
        .map(Some)
        .map_err(|_| IndexError::Parse(text.to_string()))
}

fn parse_item(text: &str) -> Result<IndexItem, IndexError> {
    match text {
        "..." | "Ellipsis" => return Ok(IndexItem::Ellipsis),
        "None" | "newaxis" | "np.newaxis" => return Ok(IndexItem::NewAxis),
        _ => {}
    }
    if text.contains(':') {
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() > 3 {
            return Err(IndexError::Parse(text.to_string()));
        }
        return Ok(IndexItem::Slice(Slice::new(
            parse_bound(parts[0])?,
            parse_bound(parts[1])?,
            parts.get(2).map_or(Ok(None), |p| parse_bound(p))?,
        )));
    }
    text.parse()
        .map(IndexItem::Int)
        .map_err(|_| IndexError::Parse(text.to_string()))
}

/// Parses the textual form used inside brackets, e.g. `"1:3, ..., None"`.
///
/// Surrounding `[]` or `()` and a trailing comma are accepted. The empty
/// string is the empty expression.
impl FromStr for IndexExpr {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut text = s.trim();
        for (open, close) in [('[', ']'), ('(', ')')] {
            if let Some(inner) = text.strip_prefix(open).and_then(|t| t.strip_suffix(close)) {
                text = inner.trim();
            }
        }
        if text.is_empty() {
            return Ok(IndexExpr::all());
        }
        let text = text.strip_suffix(',').unwrap_or(text);
        text.split(',')
            .map(|part| parse_item(part.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map(IndexExpr::new)
    }
}

impl fmt::Display for IndexItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexItem::Int(i) => write!(f, "{i}"),
            IndexItem::Ellipsis => f.write_str("..."),
            IndexItem::NewAxis => f.write_str("None"),
            IndexItem::Slice(s) => {
                if let Some(start) = s.start {
                    write!(f, "{start}")?;
                }
                f.write_str(":")?;
                if let Some(stop) = s.stop {
                    write!(f, "{stop}")?;
                }
                if let Some(step) = s.step {
                    write!(f, ":{step}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for IndexExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

/// A normalized selector for one output position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSelector {
    /// A single in-bounds index; removes the axis from the output.
    Point(usize),
    /// An adjusted slice. `stop` may be `-1` for negative steps.
    Range { start: i64, stop: i64, step: i64 },
    /// Inserts a length-1 output axis without consuming a source axis.
    NewAxis,
    /// The whole axis, in order.
    Full,
}

impl AxisSelector {
    /// Number of source indices visited along an axis of length `size`.
    pub fn count(&self, size: usize) -> usize {
        match *self {
            AxisSelector::Point(_) => 1,
            AxisSelector::Full => size,
            AxisSelector::NewAxis => 0,
            AxisSelector::Range { start, stop, step } => {
                let (span, stride) = if step < 0 {
                    (start - stop, step.unsigned_abs())
                } else {
                    (stop - start, step.unsigned_abs())
                };
                if span > 0 {
                    ((span as u64 - 1) / stride + 1) as usize
                } else {
                    0
                }
            }
        }
    }

    /// Returns `true` if this selector covers `0..size` in order.
    pub fn is_full(&self, size: usize) -> bool {
        match *self {
            AxisSelector::Full => true,
            AxisSelector::Range { start, step, .. } => {
                step == 1 && start == 0 && self.count(size) == size
            }
            _ => false,
        }
    }
}

/// A fully normalized index against a known source shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub selectors: Vec<AxisSelector>,
    pub shape: Vec<usize>,
}

impl IndexSpec {
    /// The dimension-consuming selectors paired with their source axis length.
    pub fn consuming(&self) -> impl Iterator<Item = (&AxisSelector, usize)> + '_ {
        self.selectors
            .iter()
            .filter(|s| !matches!(s, AxisSelector::NewAxis))
            .zip(self.shape.iter().copied())
    }

    /// Shape of the result: points drop out and new axes contribute 1.
    pub fn output_shape(&self) -> Vec<usize> {
        let mut sizes = self.shape.iter().copied();
        let mut out = Vec::with_capacity(self.selectors.len());
        for selector in &self.selectors {
            match selector {
                AxisSelector::NewAxis => out.push(1),
                AxisSelector::Point(_) => {
                    sizes.next();
                }
                other => {
                    let size = sizes.next().unwrap_or(0);
                    out.push(other.count(size));
                }
            }
        }
        out
    }

    /// Total number of selected elements.
    pub fn element_count(&self) -> usize {
        self.consuming().map(|(s, n)| s.count(n)).product()
    }
}

/// Normalize `expr` against `shape` (outermost axis first).
pub fn normalize(shape: &[usize], expr: &IndexExpr) -> Result<IndexSpec, IndexError> {
    let items = expr.items();
    let ellipses = items.iter().filter(|i| **i == IndexItem::Ellipsis).count();
    if ellipses > 1 {
        return Err(IndexError::MultipleEllipsis);
    }
    let consuming = items.iter().filter(|i| i.consumes_axis()).count();
    if consuming > shape.len() {
        return Err(IndexError::TooManyIndices {
            given: consuming,
            ndim: shape.len(),
        });
    }

    let mut selectors = Vec::with_capacity(shape.len() + items.len());
    let mut axis = 0usize;
    for item in items {
        match *item {
            IndexItem::NewAxis => selectors.push(AxisSelector::NewAxis),
            IndexItem::Ellipsis => {
                let fill = shape.len() - consuming;
                selectors.extend(core::iter::repeat(AxisSelector::Full).take(fill));
                axis += fill;
            }
            IndexItem::Int(i) => {
                let size = shape[axis];
                let resolved = if i < 0 { i + size as i64 } else { i };
                if resolved < 0 || resolved >= size as i64 {
                    return Err(IndexError::OutOfBounds {
                        index: i,
                        axis,
                        size,
                    });
                }
                selectors.push(AxisSelector::Point(resolved as usize));
                axis += 1;
            }
            IndexItem::Slice(s) => {
                let (start, stop, step, _) = s.adjust(shape[axis])?;
                selectors.push(AxisSelector::Range { start, stop, step });
                axis += 1;
            }
        }
    }
    selectors.extend(core::iter::repeat(AxisSelector::Full).take(shape.len() - axis));

    Ok(IndexSpec {
        selectors,
        shape: shape.to_vec(),
    })
}

impl IndexExpr {
    /// Builds `start:stop` slices for each axis, outermost first.
    pub fn window(ranges: &[(i64, i64)]) -> Self {
        IndexExpr::new(
            ranges
                .iter()
                .map(|&(a, b)| IndexItem::Slice(Slice::range(a, b)))
                .collect(),
        )
    }
}
