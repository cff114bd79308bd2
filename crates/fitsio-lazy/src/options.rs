//! Open-time configuration.

use crate::block::BLOCK_SIZE;
use crate::container::HduList;
use crate::error::{Error, Result};
use crate::location::Location;
use crate::source::{ByteRangeSource, FileSource};

/// Builder for opening containers.
///
/// ```no_run
/// let list = fitsio_lazy::OpenOptions::new()
///     .lazy(true)
///     .open("data/test0.fits")?;
/// # Ok::<(), fitsio_lazy::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOptions {
    lazy: Option<bool>,
    cache_block_size: u64,
    cache_capacity: usize,
    s3_region: String,
    s3_endpoint: Option<String>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            lazy: None,
            cache_block_size: OpenOptions::DEFAULT_CACHE_BLOCK_SIZE,
            cache_capacity: OpenOptions::DEFAULT_CACHE_CAPACITY,
            s3_region: OpenOptions::DEFAULT_S3_REGION.to_string(),
            s3_endpoint: None,
        }
    }
}

fn parse_env<T: std::str::FromStr>(value: Option<String>) -> Result<Option<T>> {
    value
        .map(|v| v.trim().parse().map_err(|_| Error::InvalidValue))
        .transpose()
}

impl OpenOptions {
    /// Remote reads are served from blocks of 128 FITS blocks (360 KiB).
    pub const DEFAULT_CACHE_BLOCK_SIZE: u64 = BLOCK_SIZE as u64 * 128;
    pub const DEFAULT_CACHE_CAPACITY: usize = 32;
    pub const DEFAULT_S3_REGION: &'static str = "us-east-1";

    pub fn new() -> Self {
        OpenOptions::default()
    }

    /// Reads overrides from the process environment.
    ///
    /// | variable | meaning |
    /// |---|---|
    /// | `FITSIO_LAZY_MODE` | `lazy` / `eager` (or `true` / `false`) |
    /// | `FITSIO_LAZY_CACHE_BLOCK_SIZE` | cache block size in bytes |
    /// | `FITSIO_LAZY_CACHE_BLOCKS` | number of cached blocks |
    /// | `AWS_REGION`, `AWS_DEFAULT_REGION` | S3 region |
    /// | `AWS_ENDPOINT_URL_S3`, `AWS_ENDPOINT_URL` | S3-compatible endpoint |
    pub fn from_env() -> Result<Self> {
        OpenOptions::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`OpenOptions::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = OpenOptions::default();
        if let Some(mode) = lookup("FITSIO_LAZY_MODE") {
            options.lazy = Some(match mode.trim().to_ascii_lowercase().as_str() {
                "lazy" | "true" | "1" => true,
                "eager" | "false" | "0" => false,
                _ => return Err(Error::InvalidValue),
            });
        }
        if let Some(size) = parse_env(lookup("FITSIO_LAZY_CACHE_BLOCK_SIZE"))? {
            options.cache_block_size = size;
        }
        if let Some(blocks) = parse_env(lookup("FITSIO_LAZY_CACHE_BLOCKS"))? {
            options.cache_capacity = blocks;
        }
        if let Some(region) = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")) {
            options.s3_region = region;
        }
        options.s3_endpoint = lookup("AWS_ENDPOINT_URL_S3").or_else(|| lookup("AWS_ENDPOINT_URL"));
        Ok(options)
    }

    /// Forces lazy (`true`) or eager (`false`) data loading. Unset, the mode
    /// follows the location: `s3://` is lazy, everything else eager.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = Some(lazy);
        self
    }

    pub fn cache_block_size(mut self, bytes: u64) -> Self {
        self.cache_block_size = bytes;
        self
    }

    pub fn cache_capacity(mut self, blocks: usize) -> Self {
        self.cache_capacity = blocks;
        self
    }

    pub fn s3_region(mut self, region: impl Into<String>) -> Self {
        self.s3_region = region.into();
        self
    }

    pub fn s3_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.s3_endpoint = Some(endpoint.into());
        self
    }

    /// The lazy setting that will apply to `location`.
    pub fn resolve_lazy(&self, location: &Location) -> bool {
        self.lazy.unwrap_or_else(|| location.default_lazy())
    }

    /// Opens a path or `file://`, `http(s)://` or `s3://` URI.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn open(&self, uri: &str) -> Result<HduList> {
        let location = Location::parse(uri)?;
        let lazy = self.resolve_lazy(&location);
        let source = self.source_for(&location)?;
        HduList::from_source(source, lazy)
    }

    /// Opens a custom source. Without an explicit `lazy` setting this is eager.
    pub fn open_source<S: ByteRangeSource + 'static>(&self, source: S) -> Result<HduList> {
        HduList::from_source(Box::new(source), self.lazy.unwrap_or(false))
    }

    fn source_for(&self, location: &Location) -> Result<Box<dyn ByteRangeSource>> {
        match location {
            Location::Local(path) => Ok(Box::new(FileSource::open(path)?)),
            Location::Http(url) => self.remote(url.clone()),
            Location::S3 { bucket, key } => self.remote(Location::s3_url(
                bucket,
                key,
                &self.s3_region,
                self.s3_endpoint.as_deref(),
            )),
        }
    }

    #[cfg(feature = "remote")]
    fn remote(&self, url: String) -> Result<Box<dyn ByteRangeSource>> {
        use crate::remote::HttpSource;
        use crate::source::CachedSource;

        Ok(Box::new(CachedSource::new(
            HttpSource::new(url)?,
            self.cache_block_size,
            self.cache_capacity,
        )))
    }

    #[cfg(not(feature = "remote"))]
    fn remote(&self, url: String) -> Result<Box<dyn ByteRangeSource>> {
        Err(Error::RemoteDisabled(url))
    }
}
