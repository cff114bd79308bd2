use alloc::string::String;
use alloc::vec::Vec;

use crate::block::padded_byte_len;
use crate::dtype::{DType, Scaling};

/// The closed set of HDU kinds the reader recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HduKind {
    Primary,
    Image,
    /// Tile-compressed image stored in a binary table (`ZIMAGE = T`).
    CompressedImage,
    BinaryTable,
    AsciiTable,
    RandomGroups,
}

impl HduKind {
    /// The class name used in diagnostics and attribute errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            HduKind::Primary => "PrimaryHDU",
            HduKind::Image => "ImageHDU",
            HduKind::CompressedImage => "CompImageHDU",
            HduKind::BinaryTable => "BinTableHDU",
            HduKind::AsciiTable => "TableHDU",
            HduKind::RandomGroups => "GroupsHDU",
        }
    }

    /// Only uncompressed image arrays map elements to fixed byte offsets.
    pub fn is_sliceable(&self) -> bool {
        matches!(self, HduKind::Primary | HduKind::Image)
    }
}

/// Layout of one HDU's data segment, fixed once the header has been parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionDescriptor {
    /// Position of the HDU in the container, primary = 0.
    pub index: usize,
    pub kind: HduKind,
    /// Stored element type. For compressed images this is the uncompressed type.
    pub dtype: DType,
    /// Outermost axis first, i.e. `[NAXISn, ..., NAXIS1]`.
    pub shape: Vec<usize>,
    /// Absolute byte offset of the first data byte.
    pub data_offset: u64,
    /// Unpadded length of the data segment in bytes.
    pub data_len: u64,
    pub scaling: Scaling,
    /// EXTNAME, if present.
    pub name: Option<String>,
    pub version: Option<i64>,
    /// TFIELDS for table kinds.
    pub columns: Option<usize>,
}

impl ExtensionDescriptor {
    /// True for image HDUs with at least one axis.
    pub fn sliceable(&self) -> bool {
        self.kind.is_sliceable() && !self.shape.is_empty()
    }

    pub fn has_data(&self) -> bool {
        self.data_len > 0
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Offset of the next HDU's header.
    pub fn data_end_padded(&self) -> u64 {
        self.data_offset + padded_byte_len(self.data_len)
    }

    pub fn data_range(&self) -> core::ops::Range<u64> {
        self.data_offset..self.data_offset + self.data_len
    }
}
