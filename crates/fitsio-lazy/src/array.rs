//! Materialized N-dimensional arrays and in-memory indexing.
//!
//! [`Array`] is what both access paths hand back: `.data()` decodes a whole
//! data segment into one, and a lazy section assembles one from the byte
//! ranges it fetched. [`Array::slice`] applies an index expression to an
//! array that is already resident, which is the reference behaviour the lazy
//! path must reproduce element for element.

use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::index::{normalize, AxisSelector, IndexExpr};

/// Typed element storage, one variant per element type the reader produces.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    U8(Vec<u8>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Applies `$body` to the inner vector of any variant, producing a common type.
macro_rules! with_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::U8($v) => $body,
            ArrayData::I8($v) => $body,
            ArrayData::I16($v) => $body,
            ArrayData::U16($v) => $body,
            ArrayData::I32($v) => $body,
            ArrayData::U32($v) => $body,
            ArrayData::I64($v) => $body,
            ArrayData::U64($v) => $body,
            ArrayData::F32($v) => $body,
            ArrayData::F64($v) => $body,
        }
    };
}

/// Applies `$body` to the inner vector and rewraps the result in the same variant.
macro_rules! map_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::U8($v) => ArrayData::U8($body),
            ArrayData::I8($v) => ArrayData::I8($body),
            ArrayData::I16($v) => ArrayData::I16($body),
            ArrayData::U16($v) => ArrayData::U16($body),
            ArrayData::I32($v) => ArrayData::I32($body),
            ArrayData::U32($v) => ArrayData::U32($body),
            ArrayData::I64($v) => ArrayData::I64($body),
            ArrayData::U64($v) => ArrayData::U64($body),
            ArrayData::F32($v) => ArrayData::F32($body),
            ArrayData::F64($v) => ArrayData::F64($body),
        }
    };
}

impl ArrayData {
    pub fn len(&self) -> usize {
        with_data!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// NumPy-style name of the element type.
    pub fn type_name(&self) -> &'static str {
        match self {
            ArrayData::U8(_) => "uint8",
            ArrayData::I8(_) => "int8",
            ArrayData::I16(_) => "int16",
            ArrayData::U16(_) => "uint16",
            ArrayData::I32(_) => "int32",
            ArrayData::U32(_) => "uint32",
            ArrayData::I64(_) => "int64",
            ArrayData::U64(_) => "uint64",
            ArrayData::F32(_) => "float32",
            ArrayData::F64(_) => "float64",
        }
    }

    /// Element `i` widened to `f64`.
    pub fn get_f64(&self, i: usize) -> Option<f64> {
        with_data!(self, v => v.get(i).map(|&x| x as f64))
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        with_data!(self, v => v.iter().map(|&x| x as f64).collect())
    }

    /// Picks the elements at `flat` (in that order) into a new buffer.
    pub fn gather(&self, flat: &[usize]) -> ArrayData {
        map_data!(self, v => flat.iter().map(|&i| v[i]).collect())
    }
}

/// Element types that can be pulled out of an [`ArrayData`] without conversion.
pub trait Element: Copy + 'static {
    fn slice_of(data: &ArrayData) -> Option<&[Self]>;
    fn wrap(values: Vec<Self>) -> ArrayData;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            fn slice_of(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn wrap(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }
        }
    };
}

impl_element!(u8, U8);
impl_element!(i8, I8);
impl_element!(i16, I16);
impl_element!(u16, U16);
impl_element!(i32, I32);
impl_element!(u32, U32);
impl_element!(i64, I64);
impl_element!(u64, U64);
impl_element!(f32, F32);
impl_element!(f64, F64);

/// Row-major (C order) element strides for `shape`.
pub fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = alloc::vec![1usize; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

/// A fully materialized array in row-major order, outermost axis first.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    shape: Vec<usize>,
    data: ArrayData,
}

impl Array {
    /// Wraps `data` with `shape`, checking the element count.
    ///
    /// An empty `shape` describes a zero-dimensional array of one element.
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Array { shape, data })
    }

    pub fn from_vec<T: Element>(shape: Vec<usize>, values: Vec<T>) -> Result<Self> {
        Array::new(shape, T::wrap(values))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }

    pub fn dtype_name(&self) -> &'static str {
        self.data.type_name()
    }

    /// Borrow the elements as `T`, or `None` if the element type differs.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice_of(&self.data)
    }

    /// Element at a full multi-index, widened to `f64`.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.shape.len() || index.iter().zip(&self.shape).any(|(i, n)| i >= n) {
            return None;
        }
        let flat = index
            .iter()
            .zip(row_major_strides(&self.shape))
            .map(|(i, s)| i * s)
            .sum();
        self.data.get_f64(flat)
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.data.to_f64_vec()
    }

    /// Index this array the way NumPy's basic indexing does.
    pub fn slice(&self, expr: &IndexExpr) -> Result<Array> {
        let spec = normalize(&self.shape, expr)?;
        let out_shape = spec.output_shape();
        let strides = row_major_strides(&self.shape);

        let per_axis: Vec<Vec<usize>> = spec
            .consuming()
            .map(|(selector, size)| selector.indices(size).collect())
            .collect();

        let mut flat = Vec::with_capacity(out_shape.iter().product());
        if per_axis.iter().all(|ix| !ix.is_empty()) {
            let mut cursor = alloc::vec![0usize; per_axis.len()];
            loop {
                flat.push(
                    cursor
                        .iter()
                        .enumerate()
                        .map(|(axis, &k)| per_axis[axis][k] * strides[axis])
                        .sum(),
                );
                // Odometer step, last axis fastest.
                let mut axis = per_axis.len();
                loop {
                    if axis == 0 {
                        return Array::new(out_shape, self.data.gather(&flat));
                    }
                    axis -= 1;
                    cursor[axis] += 1;
                    if cursor[axis] < per_axis[axis].len() {
                        break;
                    }
                    cursor[axis] = 0;
                }
            }
        }
        Array::new(out_shape, self.data.gather(&flat))
    }

    /// Returns `true` when shapes match and every element pair differs by at
    /// most `atol`. NaNs compare equal to NaNs.
    pub fn all_close(&self, other: &Array, atol: f64) -> bool {
        self.shape == other.shape
            && self
                .to_f64_vec()
                .iter()
                .zip(other.to_f64_vec())
                .all(|(a, b)| (a.is_nan() && b.is_nan()) || libm::fabs(a - b) <= atol)
    }

    /// Converts into an `ndarray` array of element type `T`.
    #[cfg(feature = "array")]
    pub fn to_ndarray<T: Element>(&self) -> Result<ndarray::ArrayD<T>> {
        let values = self.as_slice::<T>().ok_or(Error::InvalidValue)?.to_vec();
        ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&self.shape), values)
            .map_err(|_| Error::ShapeMismatch {
                expected: self.shape.iter().product(),
                actual: self.len(),
            })
    }
}

/// Anything that can answer an index expression with a materialized array.
///
/// Implemented by resident [`Array`]s and by lazy sections, so utilities such
/// as cutouts work the same over both.
pub trait Sliceable {
    fn shape(&self) -> &[usize];

    fn slice(&self, expr: &IndexExpr) -> Result<Array>;

    fn ndim(&self) -> usize {
        self.shape().len()
    }
}

impl Sliceable for Array {
    fn shape(&self) -> &[usize] {
        Array::shape(self)
    }

    fn slice(&self, expr: &IndexExpr) -> Result<Array> {
        Array::slice(self, expr)
    }
}

impl AxisSelector {
    /// Source indices this selector visits along an axis of length `size`, in
    /// output order. `NewAxis` visits nothing.
    pub fn indices(&self, size: usize) -> impl Iterator<Item = usize> {
        let (start, step, len) = match *self {
            AxisSelector::Point(i) => (i as i64, 1, 1),
            AxisSelector::Range { start, step, .. } => (start, step, self.count(size)),
            AxisSelector::Full => (0, 1, size),
            AxisSelector::NewAxis => (0, 1, 0),
        };
        (0..len).map(move |k| (start + k as i64 * step) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn arange(shape: &[usize]) -> Array {
        let n: usize = shape.iter().product();
        Array::from_vec(shape.to_vec(), (0..n as i32).collect::<Vec<_>>()).unwrap()
    }

    fn slice(a: &Array, expr: &str) -> Array {
        a.slice(&expr.parse().unwrap()).unwrap()
    }

    #[test]
    fn new_checks_element_count() {
        let err = Array::from_vec(vec![2, 3], vec![0u8; 5]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 6, actual: 5 }));
    }

    #[test]
    fn zero_dimensional_holds_one_element() {
        let a = Array::from_vec(vec![], vec![7i16]).unwrap();
        assert_eq!(a.ndim(), 0);
        assert_eq!(a.get(&[]), Some(7.0));
    }

    #[test]
    fn strides_are_row_major() {
        assert_eq!(row_major_strides(&[7, 10, 11]), vec![110, 11, 1]);
        assert_eq!(row_major_strides(&[5]), vec![1]);
        assert!(row_major_strides(&[]).is_empty());
    }

    #[test]
    fn slice_rows() {
        let a = arange(&[4, 3]);
        let s = slice(&a, "1:3");
        assert_eq!(s.shape(), &[2, 3]);
        assert_eq!(s.as_slice::<i32>().unwrap(), &[3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn slice_point_and_negative_step() {
        let a = arange(&[4, 3]);
        let s = slice(&a, "-1, ::-1");
        assert_eq!(s.shape(), &[3]);
        assert_eq!(s.as_slice::<i32>().unwrap(), &[11, 10, 9]);

        let a = arange(&[5]);
        let s = slice(&a, "::-9223372036854775808");
        assert_eq!(s.as_slice::<i32>().unwrap(), &[4]);
    }

    #[test]
    fn slice_with_newaxis_and_ellipsis() {
        let a = arange(&[2, 3, 4]);
        let s = slice(&a, "None, ..., 2");
        assert_eq!(s.shape(), &[1, 2, 3]);
        assert_eq!(s.as_slice::<i32>().unwrap(), &[2, 6, 10, 14, 18, 22]);
    }

    #[test]
    fn slice_all_points_gives_scalar() {
        let a = arange(&[2, 3, 4]);
        let s = slice(&a, "1, 2, 3");
        assert_eq!(s.shape(), &[] as &[usize]);
        assert_eq!(s.as_slice::<i32>().unwrap(), &[23]);
    }

    #[test]
    fn empty_slice_keeps_shape() {
        let a = arange(&[4, 3]);
        let s = slice(&a, "2:2");
        assert_eq!(s.shape(), &[0, 3]);
        assert!(s.is_empty());
    }

    #[test]
    fn out_of_bounds_is_an_index_error() {
        let a = arange(&[4, 3]);
        assert!(matches!(
            a.slice(&"4".parse().unwrap()),
            Err(Error::Index(_))
        ));
    }

    #[test]
    fn all_close_tolerates_small_differences() {
        let a = Array::from_vec(vec![2], vec![1.0f64, f64::NAN]).unwrap();
        let b = Array::from_vec(vec![2], vec![1.0f32 + 1e-8, f32::NAN]).unwrap();
        assert!(a.all_close(&b, 1e-7));
        let c = Array::from_vec(vec![1, 2], vec![1.0f64, f64::NAN]).unwrap();
        assert!(!a.all_close(&c, 1e-7));
    }

    #[test]
    fn get_rejects_bad_index() {
        let a = arange(&[4, 3]);
        assert_eq!(a.get(&[3, 2]), Some(11.0));
        assert_eq!(a.get(&[4, 0]), None);
        assert_eq!(a.get(&[1]), None);
    }

    #[cfg(feature = "array")]
    #[test]
    fn converts_to_ndarray() {
        let a = arange(&[2, 3]);
        let nd = a.to_ndarray::<i32>().unwrap();
        assert_eq!(nd.shape(), &[2, 3]);
        assert_eq!(nd[[1, 2]], 5);
        assert!(a.to_ndarray::<f32>().is_err());
    }
}
