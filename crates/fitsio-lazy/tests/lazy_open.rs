//! Opening local containers lazily and eagerly, and what each mode reads.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fitsio_lazy::{
    cutout_2d, Array, ByteRangeSource, CutoutMode, Error, FitsWriter, HduKind, HduList,
    MemorySource, OpenOptions, PARTIALLY_READ, BLOCK_SIZE,
};

type Log = Rc<RefCell<Vec<(u64, u64)>>>;

/// Records every read issued to the wrapped source.
struct Logged {
    inner: MemorySource,
    log: Log,
}

impl ByteRangeSource for Logged {
    fn read(&mut self, offset: u64, length: u64) -> fitsio_lazy::Result<Vec<u8>> {
        self.log.borrow_mut().push((offset, length));
        self.inner.read(offset, length)
    }

    fn len(&mut self) -> fitsio_lazy::Result<u64> {
        self.inner.len()
    }

    fn describe(&self) -> String {
        String::from("logged")
    }
}

/// Fails every read while `down` is set.
struct Flaky {
    inner: MemorySource,
    down: Rc<Cell<bool>>,
}

impl ByteRangeSource for Flaky {
    fn read(&mut self, offset: u64, length: u64) -> fitsio_lazy::Result<Vec<u8>> {
        if self.down.get() {
            return Err(std::io::Error::other("connection reset").into());
        }
        self.inner.read(offset, length)
    }

    fn len(&mut self) -> fitsio_lazy::Result<u64> {
        self.inner.len()
    }

    fn describe(&self) -> String {
        String::from("flaky")
    }
}

fn sci() -> Array {
    Array::from_vec(vec![40, 40], (0..1600).map(|v| v as f32).collect()).unwrap()
}

/// Primary without data, SCI (40x40 float32), ERR (40x40 int16), a table
/// and a compressed image.
fn container() -> Vec<u8> {
    let err = Array::from_vec(vec![40, 40], (0..1600).map(|v| (v % 97) as i16).collect()).unwrap();
    let mut w = FitsWriter::new();
    w.empty_primary()
        .unwrap()
        .image_extension(&sci(), Some("SCI"))
        .unwrap()
        .image_extension(&err, Some("ERR"))
        .unwrap()
        .byte_table(10, 16, Some("CAT"))
        .unwrap()
        .compressed_image_stub(&[440, 300], 16, Some("COMP"))
        .unwrap();
    w.finish()
}

fn write_container() -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test0.fits");
    std::fs::write(&path, container()).unwrap();
    let path = path.to_string_lossy().into_owned();
    (dir, path)
}

fn logged(lazy: bool) -> (HduList, Log) {
    let log = Log::default();
    let source = Logged {
        inner: MemorySource::new(container()),
        log: Rc::clone(&log),
    };
    let list = OpenOptions::new().lazy(lazy).open_source(source).unwrap();
    (list, log)
}

#[test]
fn local_files_default_to_eager() {
    let (_dir, path) = write_container();
    let list = fitsio_lazy::OpenOptions::new().open(&path).unwrap();
    assert!(!list.is_lazy());
    assert!(!list.is_partially_read());
    assert!(!format!("{list:?}").contains(PARTIALLY_READ));
    assert!(!list.to_string().contains(PARTIALLY_READ));
}

#[test]
fn lazy_and_eager_data_agree() {
    let (_dir, path) = write_container();
    let eager = OpenOptions::new().lazy(false).open(&path).unwrap();
    let lazy = OpenOptions::new().lazy(true).open(&path).unwrap();
    assert_eq!(eager.hdu(2).unwrap().data().unwrap(), lazy.hdu(2).unwrap().data().unwrap());
    assert!(!format!("{eager:?}").contains(PARTIALLY_READ));
    assert!(format!("{lazy:?}").contains(PARTIALLY_READ));
    eager.close();
    lazy.close();
}

#[test]
fn section_agrees_with_full_read() {
    let (_dir, path) = write_container();
    let eager = OpenOptions::new().lazy(false).open(&path).unwrap();
    let lazy = OpenOptions::new().lazy(true).open(&path).unwrap();
    let expr = "3:5".parse().unwrap();
    let from_data = eager.hdu(2).unwrap().data().unwrap().slice(&expr).unwrap();
    let from_section = lazy.hdu(2).unwrap().section().unwrap().get(&expr).unwrap();
    assert_eq!(from_data, from_section);
}

#[test]
fn lazy_open_reads_headers_only() {
    let (list, log) = logged(true);
    assert_eq!(list.len(), 5);
    let header_reads = log.borrow().len();
    assert!(log.borrow().iter().all(|&(_, len)| len == BLOCK_SIZE as u64));
    assert_eq!(header_reads, 5);
    for hdu in list.iter() {
        assert_eq!(hdu.fetched_bytes(), 0);
    }
    assert!(list.is_partially_read());
}

#[test]
fn one_read_per_contiguous_run() {
    let (list, log) = logged(true);
    log.borrow_mut().clear();
    let section = list.by_name("SCI").unwrap().section().unwrap();

    // Whole rows are one contiguous run.
    section.get(&"10:12".parse().unwrap()).unwrap();
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(log.borrow()[0].1, 2 * 40 * 4);

    // A 2x3 window touches two separate runs.
    log.borrow_mut().clear();
    let window = section.get(&"20:22, 9:12".parse().unwrap()).unwrap();
    assert_eq!(window.as_slice::<f32>().unwrap(), &[809.0, 810.0, 811.0, 849.0, 850.0, 851.0]);
    assert_eq!(log.borrow().len(), 2);
    assert!(log.borrow().iter().all(|&(_, len)| len == 12));
}

#[test]
fn partially_read_until_every_segment_is_fetched() {
    let (list, _log) = logged(true);
    list.hdu(1).unwrap().data().unwrap();
    list.hdu(2).unwrap().section().unwrap().get(&":".parse().unwrap()).unwrap();
    assert!(list.hdu(2).unwrap().is_fully_read());
    assert!(list.is_partially_read());

    list.hdu(3).unwrap().raw_data().unwrap();
    list.hdu(4).unwrap().raw_data().unwrap();
    assert!(!list.is_partially_read());
    assert!(!list.to_string().contains(PARTIALLY_READ));
    assert!(!list.info().contains(PARTIALLY_READ));
}

#[test]
fn eager_open_reads_every_segment_once() {
    let (list, log) = logged(false);
    let reads = log.borrow().len();
    assert!(!list.is_partially_read());
    list.hdu(1).unwrap().data().unwrap();
    list.hdu(1).unwrap().section().unwrap().get(&"0".parse().unwrap()).unwrap();
    assert_eq!(log.borrow().len(), reads);
}

#[test]
fn failed_read_records_nothing_and_can_be_retried() {
    let down = Rc::new(Cell::new(false));
    let source = Flaky {
        inner: MemorySource::new(container()),
        down: Rc::clone(&down),
    };
    let list = OpenOptions::new().lazy(true).open_source(source).unwrap();
    let hdu = list.by_name("SCI").unwrap();
    let expr = "20:22, 9:12".parse().unwrap();

    down.set(true);
    assert!(matches!(hdu.section().unwrap().get(&expr), Err(Error::Io(_))));
    assert_eq!(hdu.fetched_bytes(), 0);
    assert!(list.is_partially_read());
    assert!(list.to_string().contains(PARTIALLY_READ));

    down.set(false);
    let window = hdu.section().unwrap().get(&expr).unwrap();
    assert_eq!(window, sci().slice(&expr).unwrap());
    assert_eq!(hdu.fetched_bytes(), 2 * 3 * 4);
    assert!(list.is_partially_read());
}

#[test]
fn compressed_images_have_no_lazy_views() {
    let (list, _log) = logged(true);
    let comp = list.by_name("COMP").unwrap();
    assert_eq!(comp.kind(), HduKind::CompressedImage);
    assert_eq!(comp.shape(), &[440, 300]);

    let err = comp.subset().unwrap_err();
    assert_eq!(err.to_string(), "'CompImageHDU' object has no attribute 'subset'");
    let err = comp.section().unwrap_err();
    assert_eq!(err.to_string(), "'CompImageHDU' object has no attribute 'section'");
    assert!(matches!(comp.data(), Err(Error::DataNotSupported { .. })));
    assert_eq!(comp.fetched_bytes(), 0);

    let (eager, _log) = logged(false);
    let err = eager.hdu(4).unwrap().subset().unwrap_err();
    assert_eq!(err.to_string(), "'CompImageHDU' object has no attribute 'subset'");
}

#[test]
fn tables_have_no_lazy_views() {
    let (list, _log) = logged(true);
    let table = list.by_name("CAT").unwrap();
    assert!(matches!(
        table.section(),
        Err(Error::AttributeNotSupported { kind: "BinTableHDU", .. })
    ));
    assert_eq!(table.raw_data().unwrap().len(), 160);
    assert!(list.info().contains("10R x 1C"));
}

#[test]
fn cutout_matches_in_memory_cutout() {
    let (list, log) = logged(true);
    log.borrow_mut().clear();
    let hdu = list.hdu(1).unwrap();
    let position = (10.0, 20.0);
    let size = (2, 3);

    let lazy = cutout_2d(&hdu.section().unwrap(), position, size, CutoutMode::Trim).unwrap();
    assert_eq!(log.borrow().len(), 2);
    let fetched = hdu.fetched_bytes();
    assert_eq!(fetched, 2 * 3 * 4);

    let full = cutout_2d(hdu.data().unwrap(), position, size, CutoutMode::Trim).unwrap();
    assert!(lazy.data.all_close(&full.data, 0.0));
    assert_eq!(lazy.slices_original, full.slices_original);
}

#[test]
fn open_errors() {
    assert!(matches!(
        OpenOptions::new().open("ftp://host/file.fits"),
        Err(Error::UnsupportedScheme(_))
    ));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.fits");
    std::fs::write(&path, b"SIMPLE  =").unwrap();
    assert!(OpenOptions::new().open(path.to_str().unwrap()).is_err());
}
