//! Rectangular cutouts of 2-D images.
//!
//! [`cutout_2d`] accepts anything [`Sliceable`], so the same call cuts from
//! an in-memory array or from a lazy section, and in the latter case only the
//! rows of the window are fetched.

use alloc::vec;
use alloc::vec::Vec;

use crate::array::{Array, ArrayData, Sliceable};
use crate::error::{Error, Result};
use crate::index::IndexExpr;

/// How a window that crosses the array edge is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutoutMode {
    /// Keep only the overlapping part; the cutout may be smaller than asked.
    #[default]
    Trim,
    /// Keep the requested size, filling the outside with NaN.
    Partial,
    /// Fail unless the window lies entirely inside the array.
    Strict,
}

/// Half-open index window along one axis.
pub type Span = (usize, usize);

/// Matching windows in the large array and in the cutout, per axis
/// (outermost first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub large: Vec<Span>,
    pub small: Vec<Span>,
}

/// Computes the overlap of a `small_shape` window centred on `position` with
/// an array of `large_shape`. Positions and shapes are outermost axis first.
///
/// Window edges are `ceil(position - size / 2)` and `ceil(position + size / 2)`,
/// so an odd-sized window is centred on the pixel containing `position`.
pub fn overlap_slices(
    large_shape: &[usize],
    small_shape: &[usize],
    position: &[f64],
    mode: CutoutMode,
) -> Result<Overlap> {
    if large_shape.len() != small_shape.len() || position.len() != large_shape.len() {
        return Err(Error::ShapeMismatch {
            expected: large_shape.len(),
            actual: small_shape.len().min(position.len()),
        });
    }

    let mut large = Vec::with_capacity(large_shape.len());
    let mut small = Vec::with_capacity(large_shape.len());
    for ((&big, &size), &pos) in large_shape.iter().zip(small_shape).zip(position) {
        let lo = libm::ceil(pos - size as f64 / 2.0) as i64;
        let hi = libm::ceil(pos + size as f64 / 2.0) as i64;
        let big = big as i64;
        if hi <= 0 || lo >= big {
            return Err(Error::NoOverlap);
        }
        if mode == CutoutMode::Strict && (lo < 0 || hi > big) {
            return Err(Error::PartialOverlap);
        }
        let start = lo.max(0);
        let stop = hi.min(big);
        large.push((start as usize, stop as usize));
        small.push(match mode {
            CutoutMode::Trim => (0, (stop - start) as usize),
            _ => ((start - lo) as usize, (stop - lo) as usize),
        });
    }
    Ok(Overlap { large, small })
}

/// A 2-D cutout and its placement in the original array.
#[derive(Debug, Clone, PartialEq)]
pub struct Cutout {
    pub data: Array,
    /// `(rows, columns)` windows in the original array.
    pub slices_original: [Span; 2],
    /// `(rows, columns)` windows in the cutout.
    pub slices_cutout: [Span; 2],
    /// Requested centre, `(x, y)` in original pixel coordinates.
    pub position_original: (f64, f64),
}

impl Cutout {
    /// Lower-left corner `(x, y)` of the copied window in the original array.
    pub fn origin_original(&self) -> (usize, usize) {
        (self.slices_original[1].0, self.slices_original[0].0)
    }

    /// Lower-left corner `(x, y)` of the copied window in the cutout.
    pub fn origin_cutout(&self) -> (usize, usize) {
        (self.slices_cutout[1].0, self.slices_cutout[0].0)
    }

    /// Converts original `(x, y)` pixel coordinates to cutout coordinates.
    pub fn to_cutout_position(&self, (x, y): (f64, f64)) -> (f64, f64) {
        let (ox, oy) = self.origin_original();
        let (cx, cy) = self.origin_cutout();
        (x - ox as f64 + cx as f64, y - oy as f64 + cy as f64)
    }

    /// Converts cutout `(x, y)` pixel coordinates to original coordinates.
    pub fn to_original_position(&self, (x, y): (f64, f64)) -> (f64, f64) {
        let (ox, oy) = self.origin_original();
        let (cx, cy) = self.origin_cutout();
        (x + ox as f64 - cx as f64, y + oy as f64 - cy as f64)
    }

    /// The requested centre in cutout coordinates.
    pub fn position_cutout(&self) -> (f64, f64) {
        self.to_cutout_position(self.position_original)
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

/// Cuts a `(ny, nx)` window centred on `(x, y)` out of a 2-D image.
pub fn cutout_2d<S: Sliceable + ?Sized>(
    source: &S,
    position: (f64, f64),
    size: (usize, usize),
    mode: CutoutMode,
) -> Result<Cutout> {
    if source.ndim() != 2 {
        return Err(Error::ShapeMismatch {
            expected: 2,
            actual: source.ndim(),
        });
    }
    let (x, y) = position;
    let overlap = overlap_slices(source.shape(), &[size.0, size.1], &[y, x], mode)?;
    let window: Vec<(i64, i64)> = overlap
        .large
        .iter()
        .map(|&(a, b)| (a as i64, b as i64))
        .collect();
    let copied = source.slice(&IndexExpr::window(&window))?;

    let data = match mode {
        CutoutMode::Partial => {
            let (ny, nx) = size;
            let mut filled = vec![f64::NAN; ny * nx];
            let values = copied.to_f64_vec();
            let (r0, r1) = overlap.small[0];
            let (c0, c1) = overlap.small[1];
            let width = c1 - c0;
            for (row, src) in (r0..r1).zip(values.chunks(width.max(1))) {
                filled[row * nx + c0..row * nx + c1].copy_from_slice(src);
            }
            Array::new(vec![ny, nx], ArrayData::F64(filled))?
        }
        _ => copied,
    };

    Ok(Cutout {
        data,
        slices_original: [overlap.large[0], overlap.large[1]],
        slices_cutout: [overlap.small[0], overlap.small[1]],
        position_original: position,
    })
}
