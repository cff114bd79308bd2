//! Lazy sub-array access to FITS images.
//!
//! Opening a container reads only its headers. Indexing an image through
//! [`Hdu::section`] then fetches just the bytes the index selects, from a
//! local file, an HTTP server or S3.
//!
//! ```no_run
//! let list = fitsio_lazy::OpenOptions::new().lazy(true).open("s3://bucket/image.fits")?;
//! let window = list.hdu(1)?.section()?.get(&"10:12, 20:23".parse()?)?;
//! assert_eq!(window.shape(), &[2, 3]);
//! # Ok::<(), fitsio_lazy::Error>(())
//! ```
//!
//! Without the default `std` feature only the format core is built: header
//! parsing, HDU discovery over a caller-supplied reader, index normalization,
//! fetch planning, decoding and writing.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod array;
pub mod block;
pub mod cutout;
pub mod descriptor;
pub mod dtype;
pub mod error;
pub mod hdu;
pub mod header;
pub mod index;
pub mod plan;
pub mod tracker;
pub mod value;
pub mod writer;

#[cfg(feature = "std")]
pub mod container;
#[cfg(feature = "std")]
pub mod location;
#[cfg(feature = "std")]
pub mod options;
#[cfg(feature = "remote")]
pub mod remote;
#[cfg(feature = "std")]
pub mod section;
#[cfg(feature = "std")]
pub mod source;

pub use array::{Array, ArrayData, Sliceable};
pub use block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
pub use cutout::{cutout_2d, Cutout, CutoutMode};
pub use descriptor::{ExtensionDescriptor, HduKind};
pub use dtype::{DType, Scaling};
pub use error::{Error, IndexError, Result};
pub use index::{IndexExpr, IndexItem, Slice};
pub use plan::{ByteRange, FetchPlan};
pub use writer::FitsWriter;

#[cfg(feature = "std")]
pub use container::{Hdu, HduList, PARTIALLY_READ};
#[cfg(feature = "std")]
pub use location::Location;
#[cfg(feature = "std")]
pub use options::OpenOptions;
#[cfg(feature = "remote")]
pub use remote::HttpSource;
#[cfg(feature = "std")]
pub use section::Section;
#[cfg(feature = "std")]
pub use source::{ByteRangeSource, CachedSource, FileSource, MemorySource};

/// Opens a path or URI with default options, honouring the environment
/// overrides read by [`OpenOptions::from_env`].
#[cfg(feature = "std")]
pub fn open(uri: &str) -> Result<HduList> {
    OpenOptions::from_env()?.open(uri)
}
