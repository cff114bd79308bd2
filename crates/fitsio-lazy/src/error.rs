use alloc::string::String;

/// Failures raised while normalizing or parsing an index expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// An integer index fell outside `[-size, size)` for its axis.
    #[error("index {index} is out of bounds for axis {axis} with size {size}")]
    OutOfBounds { index: i64, axis: usize, size: usize },
    /// More dimension-consuming indices than the array has axes.
    #[error("too many indices for array: array is {ndim}-dimensional, but {given} were indexed")]
    TooManyIndices { given: usize, ndim: usize },
    /// Two or more ellipses in the same expression.
    #[error("an index can only have a single ellipsis ('...')")]
    MultipleEllipsis,
    /// A slice with `step == 0`.
    #[error("slice step cannot be zero")]
    ZeroStep,
    /// The textual form of an index expression could not be parsed.
    #[error("invalid index expression: {0}")]
    Parse(String),
}

/// All errors that can occur while opening, scanning or slicing a FITS container.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed FITS header block.
    #[error("invalid FITS header: {0}")]
    InvalidHeader(&'static str),
    /// Premature end of data while reading.
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// Unrecognized BITPIX value.
    #[error("invalid BITPIX value: {0}")]
    InvalidBitpix(i64),
    /// Malformed keyword name in a header card.
    #[error("invalid keyword name")]
    InvalidKeyword,
    /// Unknown XTENSION type.
    #[error("unsupported XTENSION type: {0}")]
    UnsupportedExtension(String),
    /// A header or argument value could not be interpreted.
    #[error("invalid value")]
    InvalidValue,
    /// A required keyword was not found in the header.
    #[error("missing required keyword: {0}")]
    MissingKeyword(&'static str),
    /// Lazy sub-array access was requested on an HDU kind that cannot provide it.
    #[error("'{kind}' object has no attribute '{attribute}'")]
    AttributeNotSupported {
        kind: &'static str,
        attribute: &'static str,
    },
    /// Decoding the data segment of this HDU kind is not implemented.
    #[error("reading data from '{kind}' HDUs is not supported")]
    DataNotSupported { kind: &'static str },
    /// The HDU has no data segment (NAXIS = 0).
    #[error("HDU {0} has no data")]
    NoData(usize),
    /// No HDU matched the requested index or EXTNAME.
    #[error("HDU not found: {0}")]
    HduNotFound(String),
    /// Bad index expression.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Buffer length does not match the element count of a shape.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    /// A cutout window lies completely outside the array.
    #[error("arrays do not overlap")]
    NoOverlap,
    /// A strict cutout window extends past the array edge.
    #[error("arrays overlap only partially")]
    PartialOverlap,
    /// A byte source returned fewer bytes than requested.
    #[error("short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: u64,
        actual: u64,
    },
    /// The location scheme is not recognised.
    #[error("unsupported location scheme: {0}")]
    UnsupportedScheme(String),
    /// The location needs a transport that was not compiled in.
    #[error("remote access to '{0}' requires the `remote` feature")]
    RemoteDisabled(String),
    /// An I/O error from the standard library.
    #[cfg(feature = "std")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A transport error from the HTTP client.
    #[cfg(feature = "remote")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The remote server answered with a non-success status.
    #[cfg(feature = "remote")]
    #[error("HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
