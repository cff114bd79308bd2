//! Randomly addressable byte stores.
//!
//! Everything the container reads goes through [`ByteRangeSource::read`], one
//! call per byte range. Local files and in-memory buffers answer directly;
//! remote sources pay one round trip per call, which is why [`CachedSource`]
//! exists.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::plan::ByteRange;

/// A store that can return any byte range of a fixed-length object.
pub trait ByteRangeSource {
    /// Returns exactly `length` bytes starting at `offset`, or an error.
    fn read(&mut self, offset: u64, length: u64) -> Result<Vec<u8>>;

    /// Total length of the object in bytes.
    fn len(&mut self) -> Result<u64>;

    /// Human readable name, used in diagnostics.
    fn describe(&self) -> String;

    /// Reads several ranges, in order.
    fn read_ranges(&mut self, ranges: &[ByteRange]) -> Result<Vec<Vec<u8>>> {
        ranges
            .iter()
            .map(|r| self.read(r.offset, r.length))
            .collect()
    }
}

impl<S: ByteRangeSource + ?Sized> ByteRangeSource for Box<S> {
    fn read(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        (**self).read(offset, length)
    }

    fn len(&mut self) -> Result<u64> {
        (**self).len()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn read_ranges(&mut self, ranges: &[ByteRange]) -> Result<Vec<Vec<u8>>> {
        (**self).read_ranges(ranges)
    }
}

pub(crate) fn check_bounds(offset: u64, length: u64, total: u64) -> Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= total => Ok(()),
        _ => Err(Error::ShortRead {
            offset,
            expected: length,
            actual: total.saturating_sub(offset),
        }),
    }
}

/// A local file, read with seek + read.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: File,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        Ok(FileSource { path, file, len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteRangeSource for FileSource {
    fn read(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        check_bounds(offset, length, self.len)?;
        tracing::trace!(path = %self.path.display(), offset, length, "file read");
        let mut buf = vec![0u8; length as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.len)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A FITS image held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        MemorySource::named("<memory>", data)
    }

    pub fn named(name: impl Into<String>, data: Vec<u8>) -> Self {
        MemorySource {
            name: name.into(),
            data,
        }
    }
}

impl ByteRangeSource for MemorySource {
    fn read(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        check_bounds(offset, length, self.data.len() as u64)?;
        let start = offset as usize;
        Ok(self.data[start..start + length as usize].to_vec())
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Hit and miss counters of a [`CachedSource`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Reads forwarded to the wrapped source.
    pub fetches: u64,
    pub bytes_fetched: u64,
}

/// Block-aligned LRU read cache in front of another source.
///
/// Reads are served from fixed-size aligned blocks. Missing blocks that are
/// adjacent are fetched with a single read of the wrapped source. Requests
/// larger than the whole cache bypass it.
#[derive(Debug)]
pub struct CachedSource<S> {
    inner: S,
    block_size: u64,
    capacity: usize,
    blocks: HashMap<u64, Vec<u8>>,
    lru: VecDeque<u64>,
    len: Option<u64>,
    stats: CacheStats,
}

impl<S: ByteRangeSource> CachedSource<S> {
    pub fn new(inner: S, block_size: u64, capacity: usize) -> Self {
        CachedSource {
            inner,
            block_size: block_size.max(1),
            capacity: capacity.max(1),
            blocks: HashMap::new(),
            lru: VecDeque::new(),
            len: None,
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn touch(&mut self, block: u64) {
        if let Some(pos) = self.lru.iter().position(|&b| b == block) {
            self.lru.remove(pos);
        }
        self.lru.push_back(block);
    }

    fn insert(&mut self, block: u64, bytes: Vec<u8>) {
        while self.blocks.len() >= self.capacity {
            match self.lru.pop_front() {
                Some(evicted) => {
                    self.blocks.remove(&evicted);
                }
                None => break,
            }
        }
        self.blocks.insert(block, bytes);
        self.touch(block);
    }

    fn fetch_direct(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.stats.fetches += 1;
        self.stats.bytes_fetched += length;
        self.inner.read(offset, length)
    }

    /// Fetches blocks `first..=last` that are not cached, coalescing runs.
    fn fill(&mut self, first: u64, last: u64, total: u64) -> Result<()> {
        let mut block = first;
        while block <= last {
            if self.blocks.contains_key(&block) {
                self.stats.hits += 1;
                self.touch(block);
                block += 1;
                continue;
            }
            let run_start = block;
            while block <= last && !self.blocks.contains_key(&block) {
                self.stats.misses += 1;
                block += 1;
            }
            let offset = run_start * self.block_size;
            let end = (block * self.block_size).min(total);
            let bytes = self.fetch_direct(offset, end - offset)?;
            for (i, chunk) in bytes.chunks(self.block_size as usize).enumerate() {
                self.insert(run_start + i as u64, chunk.to_vec());
            }
        }
        Ok(())
    }
}

impl<S: ByteRangeSource> ByteRangeSource for CachedSource<S> {
    fn read(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let total = self.len()?;
        check_bounds(offset, length, total)?;
        if length == 0 {
            return Ok(Vec::new());
        }
        let first = offset / self.block_size;
        let last = (offset + length - 1) / self.block_size;
        if last - first + 1 > self.capacity as u64 {
            return self.fetch_direct(offset, length);
        }
        self.fill(first, last, total)?;

        let mut out = Vec::with_capacity(length as usize);
        for block in first..=last {
            let bytes = self.blocks.get(&block).ok_or(Error::UnexpectedEof)?;
            let block_start = block * self.block_size;
            let lo = offset.saturating_sub(block_start) as usize;
            let hi = ((offset + length).min(block_start + bytes.len() as u64) - block_start) as usize;
            out.extend_from_slice(&bytes[lo..hi]);
        }
        Ok(out)
    }

    fn len(&mut self) -> Result<u64> {
        match self.len {
            Some(len) => Ok(len),
            None => {
                let len = self.inner.len()?;
                self.len = Some(len);
                Ok(len)
            }
        }
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}
