//! Opened FITS containers and their HDUs.
//!
//! An [`HduList`] owns its byte source. Header blocks are read at open time;
//! data is read either right away (eager) or on first use (lazy), and every
//! data byte that comes back is recorded so the container can report whether
//! it has been read in full.

use std::cell::{OnceCell, RefCell};
use std::fmt;

use crate::array::Array;
use crate::descriptor::{ExtensionDescriptor, HduKind};
use crate::dtype::{decode, DType};
use crate::error::{Error, Result};
use crate::hdu::{scan_hdus, HduEntry};
use crate::header::{find_value, Card};
use crate::plan::ByteRange;
use crate::section::Section;
use crate::source::{ByteRangeSource, MemorySource};
use crate::tracker::MaterializationTracker;
use crate::value::Value;

/// Marker appended to diagnostics while some data has not been fetched.
pub const PARTIALLY_READ: &str = "partially read";

/// All HDUs of one FITS container, in file order.
pub struct HduList {
    name: String,
    lazy: bool,
    source: RefCell<Box<dyn ByteRangeSource>>,
    entries: Vec<HduEntry>,
    data: Vec<OnceCell<Array>>,
    raw: Vec<OnceCell<Vec<u8>>>,
    tracker: RefCell<MaterializationTracker>,
}

impl HduList {
    /// Walks the headers of `source` and, unless `lazy`, reads all data.
    pub fn from_source(mut source: Box<dyn ByteRangeSource>, lazy: bool) -> Result<Self> {
        let name = source.describe();
        let total = source.len()?;
        let entries = scan_hdus(total, |offset, len| source.read(offset, len as u64))?;
        tracing::debug!(source = %name, hdus = entries.len(), lazy, "opened container");

        let mut tracker = MaterializationTracker::new();
        for entry in &entries {
            let d = &entry.descriptor;
            tracker.register(d.index, ByteRange::new(d.data_offset, d.data_len));
        }

        let list = HduList {
            name,
            lazy,
            source: RefCell::new(source),
            data: entries.iter().map(|_| OnceCell::new()).collect(),
            raw: entries.iter().map(|_| OnceCell::new()).collect(),
            entries,
            tracker: RefCell::new(tracker),
        };
        if !lazy {
            list.load_all()?;
        }
        Ok(list)
    }

    /// Parses an in-memory FITS image, eagerly.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        HduList::from_source(Box::new(MemorySource::new(bytes)), false)
    }

    fn load_all(&self) -> Result<()> {
        for entry in &self.entries {
            let d = &entry.descriptor;
            if !d.has_data() {
                continue;
            }
            if matches!(d.kind, HduKind::Primary | HduKind::Image) {
                self.image_data(d)?;
            } else {
                self.raw_bytes(d)?;
            }
        }
        Ok(())
    }

    /// Reads `ranges` of HDU `hdu` in order. Nothing is recorded unless every
    /// read succeeds.
    pub(crate) fn read_ranges(&self, hdu: usize, ranges: &[ByteRange]) -> Result<Vec<Vec<u8>>> {
        let fetched = self.source.borrow_mut().read_ranges(ranges)?;
        let mut tracker = self.tracker.borrow_mut();
        for range in ranges {
            tracker.record(hdu, *range);
        }
        Ok(fetched)
    }

    fn read_segment(&self, d: &ExtensionDescriptor) -> Result<Vec<u8>> {
        let range = ByteRange::new(d.data_offset, d.data_len);
        let mut fetched = self.read_ranges(d.index, &[range])?;
        self.tracker.borrow_mut().mark_full(d.index);
        fetched.pop().ok_or(Error::UnexpectedEof)
    }

    pub(crate) fn cached_data(&self, index: usize) -> Option<&Array> {
        self.data.get(index).and_then(OnceCell::get)
    }

    fn image_data(&self, d: &ExtensionDescriptor) -> Result<&Array> {
        let cell = &self.data[d.index];
        if let Some(array) = cell.get() {
            return Ok(array);
        }
        let bytes = match self.raw[d.index].get() {
            Some(raw) => raw.clone(),
            None => self.read_segment(d)?,
        };
        let values = d.scaling.apply(decode(&bytes, &d.dtype)?);
        let array = Array::new(d.shape.clone(), values)?;
        tracing::debug!(hdu = d.index, shape = ?d.shape, "materialized data");
        Ok(cell.get_or_init(|| array))
    }

    fn raw_bytes(&self, d: &ExtensionDescriptor) -> Result<&[u8]> {
        let cell = &self.raw[d.index];
        if let Some(bytes) = cell.get() {
            return Ok(bytes);
        }
        let bytes = self.read_segment(d)?;
        Ok(cell.get_or_init(|| bytes))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Source name: the path or URL the container was opened from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn hdu(&self, index: usize) -> Result<Hdu<'_>> {
        if index >= self.entries.len() {
            return Err(Error::HduNotFound(index.to_string()));
        }
        Ok(Hdu { list: self, index })
    }

    pub fn primary(&self) -> Result<Hdu<'_>> {
        self.hdu(0)
    }

    /// Finds an HDU by EXTNAME, ignoring case. `PRIMARY` names HDU 0.
    pub fn by_name(&self, name: &str) -> Result<Hdu<'_>> {
        if name.eq_ignore_ascii_case("PRIMARY") {
            return self.hdu(0);
        }
        self.entries
            .iter()
            .position(|e| {
                e.descriptor
                    .name
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(name))
            })
            .map(|index| Hdu { list: self, index })
            .ok_or_else(|| Error::HduNotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = Hdu<'_>> {
        (0..self.entries.len()).map(move |index| Hdu { list: self, index })
    }

    /// True while a lazily opened container has unfetched data bytes.
    pub fn is_partially_read(&self) -> bool {
        self.lazy && self.tracker.borrow().any_partial()
    }

    /// A table of all HDUs, one line each.
    pub fn info(&self) -> String {
        let mut out = format!("Filename: {}\n", self.name);
        out.push_str("No.    Name      Ver    Type      Cards   Dimensions   Format\n");
        for hdu in self.iter() {
            let d = hdu.descriptor();
            out.push_str(&format!(
                "{:>3}  {:<10} {:>3}  {:<12} {:>5}   {:<12} {}\n",
                d.index,
                hdu.display_name(),
                d.version.unwrap_or(1),
                d.kind.type_name(),
                hdu.cards().iter().filter(|c| !c.is_end()).count(),
                hdu.dimensions(),
                hdu.format(),
            ));
        }
        if self.is_partially_read() {
            out.push_str(&format!("({PARTIALLY_READ})\n"));
        }
        out
    }

    /// Releases the source.
    pub fn close(self) {
        tracing::debug!(source = %self.name, "closed container");
    }
}

impl fmt::Display for HduList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.iter().map(|h| h.kind().type_name()).collect();
        write!(f, "[{}]", kinds.join(", "))?;
        if self.is_partially_read() {
            write!(f, " ({PARTIALLY_READ})")?;
        }
        Ok(())
    }
}

impl fmt::Debug for HduList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.iter().map(|h| h.kind().type_name()).collect();
        f.debug_struct("HduList")
            .field("name", &self.name)
            .field("lazy", &self.lazy)
            .field("hdus", &kinds)
            .field(
                "status",
                &if self.is_partially_read() {
                    PARTIALLY_READ
                } else {
                    "fully read"
                },
            )
            .finish()
    }
}

/// A borrowed handle to one HDU of an [`HduList`].
#[derive(Clone, Copy)]
pub struct Hdu<'a> {
    list: &'a HduList,
    index: usize,
}

impl<'a> Hdu<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn descriptor(&self) -> &'a ExtensionDescriptor {
        &self.list.entries[self.index].descriptor
    }

    pub fn kind(&self) -> HduKind {
        self.descriptor().kind
    }

    pub fn name(&self) -> Option<&'a str> {
        self.descriptor().name.as_deref()
    }

    fn display_name(&self) -> &'a str {
        match self.name() {
            Some(name) => name,
            None if self.index == 0 => "PRIMARY",
            None => "",
        }
    }

    pub fn cards(&self) -> &'a [Card] {
        &self.list.entries[self.index].cards
    }

    pub fn header_value(&self, keyword: &str) -> Option<&'a Value> {
        find_value(self.cards(), keyword)
    }

    /// Outermost axis first.
    pub fn shape(&self) -> &'a [usize] {
        &self.descriptor().shape
    }

    pub fn dtype(&self) -> DType {
        self.descriptor().dtype
    }

    /// Axis lengths in header order, `(NAXIS1, NAXIS2, ...)`.
    fn dimensions(&self) -> String {
        let d = self.descriptor();
        match (d.kind, d.columns) {
            (HduKind::BinaryTable | HduKind::AsciiTable, Some(cols)) => {
                format!("{}R x {}C", d.shape.first().copied().unwrap_or(0), cols)
            }
            _ => {
                let dims: Vec<String> = d.shape.iter().rev().map(usize::to_string).collect();
                format!("({})", dims.join(", "))
            }
        }
    }

    /// Element type name after scaling, blank when there is no data.
    fn format(&self) -> &'static str {
        let d = self.descriptor();
        let image = matches!(
            d.kind,
            HduKind::Primary | HduKind::Image | HduKind::CompressedImage
        );
        if !d.has_data() || !image {
            return "";
        }
        match decode(&[], &d.dtype) {
            Ok(empty) => d.scaling.apply(empty).type_name(),
            Err(_) => "",
        }
    }

    /// The whole data array. The first call reads and caches it.
    pub fn data(&self) -> Result<&'a Array> {
        let d = self.descriptor();
        if !matches!(d.kind, HduKind::Primary | HduKind::Image) {
            return Err(Error::DataNotSupported {
                kind: d.kind.type_name(),
            });
        }
        if !d.has_data() {
            return Err(Error::NoData(self.index));
        }
        self.list.image_data(d)
    }

    /// The stored bytes of the data segment, for any HDU kind.
    pub fn raw_data(&self) -> Result<&'a [u8]> {
        self.list.raw_bytes(self.descriptor())
    }

    fn lazy_view(&self, attribute: &'static str) -> Result<Section<'a>> {
        let d = self.descriptor();
        if !d.sliceable() {
            return Err(Error::AttributeNotSupported {
                kind: d.kind.type_name(),
                attribute,
            });
        }
        Ok(Section::new(self.list, d))
    }

    /// Lazy sub-array access that reads only the bytes an index needs.
    pub fn section(&self) -> Result<Section<'a>> {
        self.lazy_view("section")
    }

    /// Alias of [`Hdu::section`].
    pub fn subset(&self) -> Result<Section<'a>> {
        self.lazy_view("subset")
    }

    pub fn fetched_bytes(&self) -> u64 {
        self.list.tracker.borrow().fetched_bytes(self.index)
    }

    pub fn is_fully_read(&self) -> bool {
        self.list.tracker.borrow().is_fully_materialized(self.index)
    }
}

impl fmt::Debug for Hdu<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.kind().type_name())
            .field("index", &self.index)
            .field("name", &self.name())
            .field("shape", &self.shape())
            .finish()
    }
}
