//! Lazy sections must return exactly what indexing the loaded array returns.

use fitsio_lazy::header::Card;
use fitsio_lazy::value::Value;
use fitsio_lazy::{Array, FitsWriter, HduList, IndexExpr, MemorySource, Sliceable};

const INDEXING_PATTERNS: &[&str] = &[
    "0",
    "-1",
    "None",
    "...",
    ":",
    ":, :",
    "1:3",
    "-5:-2",
    "1, 2:4",
    "-2, 3:5",
    "1:2, 3",
    "2:3, -1",
    "0:5, 10:15",
    "-10:, -20:",
    "0, 1",
    "2, ...",
    "..., 3",
    "..., 1:2",
    "0, None, None",
    ":, None, None",
];

const INDEXING_PATTERNS_3D: &[&str] = &[
    "0, 1, 2",
    "-1, -1, -1",
    "..., 1, 2",
    "0, ..., 2",
    "1, 2, ...",
    "1, None, 3",
];

const STRIDED_PATTERNS: &[&str] = &["::2", "::-1", "5:1:-2, ::3", "..., ::-4", "None, 1:9:3, None"];

fn open_lazy(bytes: Vec<u8>) -> HduList {
    HduList::from_source(Box::new(MemorySource::new(bytes)), true).unwrap()
}

fn open_eager(bytes: Vec<u8>) -> HduList {
    HduList::from_source(Box::new(MemorySource::new(bytes)), false).unwrap()
}

/// Primary without data, a 40x40 float image, and a 20x30 integer image.
fn images() -> Vec<u8> {
    let sci = Array::from_vec(
        vec![40, 40],
        (0..1600).map(|v| v as f32 * 0.25 - 7.0).collect(),
    )
    .unwrap();
    let err = Array::from_vec(vec![20, 30], (0..600i32).map(|v| v * 3 - 100).collect()).unwrap();
    let mut w = FitsWriter::new();
    w.empty_primary()
        .unwrap()
        .image_extension(&sci, Some("SCI"))
        .unwrap()
        .image_extension(&err, Some("ERR"))
        .unwrap();
    w.finish()
}

/// A (7, 10, 11) int16 cube in the primary HDU.
fn cube() -> Vec<u8> {
    let a = Array::from_vec(vec![7, 10, 11], (0..770i16).collect()).unwrap();
    let mut w = FitsWriter::new();
    w.primary_image(&a).unwrap();
    w.finish()
}

fn assert_patterns(bytes: Vec<u8>, hdu: usize, patterns: &[&str]) {
    let eager = open_eager(bytes.clone());
    let lazy = open_lazy(bytes);
    let full = eager.hdu(hdu).unwrap().data().unwrap();
    let section = lazy.hdu(hdu).unwrap().section().unwrap();
    for pattern in patterns {
        let expr: IndexExpr = pattern.parse().unwrap();
        let expected = full.slice(&expr).unwrap();
        let actual = section.get(&expr).unwrap();
        assert_eq!(actual, expected, "pattern [{pattern}]");
    }
}

#[test]
fn subset_from_image() {
    assert_patterns(images(), 1, INDEXING_PATTERNS);
    assert_patterns(images(), 1, STRIDED_PATTERNS);
}

#[test]
fn subset_from_cube() {
    assert_patterns(cube(), 0, INDEXING_PATTERNS);
    assert_patterns(cube(), 0, INDEXING_PATTERNS_3D);
    assert_patterns(cube(), 0, STRIDED_PATTERNS);
}

#[test]
fn subset_of_second_extension() {
    let lazy = open_lazy(images());
    let eager = open_eager(images());
    let expr: IndexExpr = "3:5".parse().unwrap();
    let expected = eager.hdu(2).unwrap().data().unwrap().slice(&expr).unwrap();
    assert_eq!(lazy.hdu(2).unwrap().section().unwrap().get(&expr).unwrap(), expected);
}

#[test]
fn result_shapes() {
    let lazy = open_lazy(images());
    let view = lazy.hdu(1).unwrap().subset().unwrap();
    assert_eq!(view.get(&"3:5".parse().unwrap()).unwrap().shape(), &[2, 40]);
    assert_eq!(view.get(&"0, None, None".parse().unwrap()).unwrap().shape(), &[1, 1, 40]);
    assert_eq!(view.get(&"20:10".parse().unwrap()).unwrap().shape(), &[0, 40]);

    let lazy = open_lazy(cube());
    let view = lazy.hdu(0).unwrap().section().unwrap();
    assert_eq!(view.get(&"..., 1, 2".parse().unwrap()).unwrap().shape(), &[7]);
    assert_eq!(view.get(&"1, None, 3".parse().unwrap()).unwrap().shape(), &[1, 11]);
    let point = view.get(&"-1, -1, -1".parse().unwrap()).unwrap();
    assert_eq!(point.shape(), &[] as &[usize]);
    assert_eq!(point.as_slice::<i16>().unwrap(), &[769]);
}

#[test]
fn out_of_range_and_malformed_indices() {
    let lazy = open_lazy(cube());
    let view = lazy.hdu(0).unwrap().section().unwrap();
    for bad in ["7", "-8", "0, 10", "..., 11", "0, 0, 0, 0", "..., ...", "::0"] {
        assert!(view.get(&bad.parse().unwrap()).is_err(), "[{bad}] should fail");
    }
    assert!("1:2:3:4".parse::<IndexExpr>().is_err());
    assert_eq!(lazy.hdu(0).unwrap().fetched_bytes(), 0);
}

#[test]
fn scaled_and_blank_values_match() {
    let stored = Array::from_vec(vec![8, 6], (0..48i16).map(|v| v - 10).collect()).unwrap();
    let scaling = [
        Card::new("BSCALE", Value::Float(0.5)),
        Card::new("BZERO", Value::Float(100.0)),
        Card::new("BLANK", Value::Integer(-5)),
    ];
    let mut w = FitsWriter::new();
    w.empty_primary()
        .unwrap()
        .image_extension_with_cards(&stored, None, &scaling)
        .unwrap();
    let bytes = w.finish();

    let full = open_eager(bytes.clone()).hdu(1).unwrap().data().unwrap().clone();
    assert_eq!(full.dtype_name(), "float32");
    assert!(full.get(&[0, 5]).unwrap().is_nan());
    assert_eq!(full.get(&[0, 0]), Some(95.0));

    let lazy = open_lazy(bytes);
    let section = lazy.hdu(1).unwrap().section().unwrap();
    for pattern in ["0", "::-1, 2:5", "..., 5", "1:3, None"] {
        let expr: IndexExpr = pattern.parse().unwrap();
        let part = section.get(&expr).unwrap();
        assert!(part.all_close(&full.slice(&expr).unwrap(), 0.0), "pattern [{pattern}]");
    }
}

#[test]
fn unsigned_images_keep_their_type() {
    let a = Array::from_vec(vec![3, 4], (0..12u16).map(|v| v * 5000).collect()).unwrap();
    let mut w = FitsWriter::new();
    w.primary_image(&a).unwrap();
    let lazy = open_lazy(w.finish());
    let part = lazy.hdu(0).unwrap().section().unwrap().get(&"2".parse().unwrap()).unwrap();
    assert_eq!(part.as_slice::<u16>().unwrap(), &[40000, 45000, 50000, 55000]);
}

#[test]
fn sections_are_sliceable() {
    fn corner<S: Sliceable>(s: &S) -> Array {
        s.slice(&IndexExpr::window(&[(0, 2), (0, 2)])).unwrap()
    }
    let lazy = open_lazy(images());
    let eager = open_eager(images());
    let from_section = corner(&lazy.hdu(2).unwrap().section().unwrap());
    let from_array = corner(eager.hdu(2).unwrap().data().unwrap());
    assert_eq!(from_section, from_array);
    assert_eq!(from_section.as_slice::<i32>().unwrap(), &[-100, -97, -10, -7]);
}
