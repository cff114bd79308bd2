//! HDU discovery.
//!
//! The walker reads header blocks only. Data segments are skipped by offset
//! arithmetic, so opening a remote container costs one small read per header
//! block rather than a download of the whole file.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::block::{padded_byte_len, BLOCK_SIZE};
use crate::descriptor::{ExtensionDescriptor, HduKind};
use crate::dtype::{DType, Scaling};
use crate::error::{Error, Result};
use crate::header::{
    card_float, card_integer, card_logical, card_string, end_card_position, parse_header_blocks,
    require_usize, Card,
};

/// A discovered HDU: its parsed header and the layout of its data segment.
#[derive(Debug, Clone)]
pub struct HduEntry {
    pub descriptor: ExtensionDescriptor,
    pub cards: Vec<Card>,
    /// Absolute offset of the first header block.
    pub header_start: u64,
}

fn is_primary_hdu(cards: &[Card]) -> bool {
    cards
        .first()
        .map(|c| c.keyword_str() == "SIMPLE")
        .unwrap_or(false)
}

/// Reads `prefix1..=prefixN` as axis lengths, in header order.
fn axes(cards: &[Card], count_kw: &str, prefix: &str) -> Result<Vec<usize>> {
    let n = card_integer(cards, count_kw).ok_or(Error::MissingKeyword("NAXIS"))?;
    let n = usize::try_from(n).map_err(|_| Error::InvalidHeader("negative NAXIS"))?;
    (1..=n)
        .map(|i| require_usize(cards, &alloc::format!("{prefix}{i}"), "NAXISn"))
        .collect()
}

fn checked_product(dims: &[usize]) -> Result<u64> {
    dims.iter()
        .try_fold(1u64, |acc, &d| acc.checked_mul(d as u64))
        .ok_or(Error::InvalidHeader("data size overflow"))
}

/// Unpadded data segment length implied by a header.
pub fn data_byte_len(cards: &[Card], is_primary: bool) -> Result<u64> {
    let bitpix = card_integer(cards, "BITPIX").ok_or(Error::MissingKeyword("BITPIX"))?;
    let naxes = axes(cards, "NAXIS", "NAXIS")?;
    if naxes.is_empty() {
        return Ok(0);
    }
    let bytes_per_value = bitpix.unsigned_abs() / 8;

    let groups = is_primary && naxes[0] == 0 && card_logical(cards, "GROUPS") == Some(true);
    let (pixels, pcount, gcount) = if groups {
        (
            checked_product(&naxes[1..])?,
            require_usize(cards, "PCOUNT", "PCOUNT")? as u64,
            require_usize(cards, "GCOUNT", "GCOUNT")? as u64,
        )
    } else if is_primary {
        (checked_product(&naxes)?, 0, 1)
    } else {
        let pcount = card_integer(cards, "PCOUNT").unwrap_or(0).max(0) as u64;
        let gcount = card_integer(cards, "GCOUNT").unwrap_or(1).max(1) as u64;
        (checked_product(&naxes)?, pcount, gcount)
    };

    // Random groups carry PCOUNT parameters per group; extensions carry a
    // PCOUNT-byte heap per group.
    let len = if groups {
        pixels
            .checked_add(pcount)
            .and_then(|n| n.checked_mul(gcount))
            .and_then(|n| n.checked_mul(bytes_per_value))
    } else {
        pixels
            .checked_mul(bytes_per_value)
            .and_then(|n| n.checked_add(pcount))
            .and_then(|n| n.checked_mul(gcount))
    };
    len.ok_or(Error::InvalidHeader("data size overflow"))
}

fn classify(cards: &[Card], is_primary: bool) -> Result<HduKind> {
    if is_primary {
        let naxis1 = card_integer(cards, "NAXIS1");
        if naxis1 == Some(0) && card_logical(cards, "GROUPS") == Some(true) {
            return Ok(HduKind::RandomGroups);
        }
        return Ok(HduKind::Primary);
    }
    let xtension = card_string(cards, "XTENSION").ok_or(Error::MissingKeyword("XTENSION"))?;
    match xtension {
        "IMAGE" | "IUEIMAGE" => Ok(HduKind::Image),
        "TABLE" => Ok(HduKind::AsciiTable),
        "BINTABLE" | "A3DTABLE" if card_logical(cards, "ZIMAGE") == Some(true) => {
            Ok(HduKind::CompressedImage)
        }
        "BINTABLE" | "A3DTABLE" => Ok(HduKind::BinaryTable),
        other => Err(Error::UnsupportedExtension(other.to_string())),
    }
}

/// Builds the data layout for one HDU from its header cards.
pub fn describe(index: usize, cards: &[Card], data_offset: u64) -> Result<ExtensionDescriptor> {
    let is_primary = index == 0;
    let kind = classify(cards, is_primary)?;
    let data_len = data_byte_len(cards, is_primary)?;

    let (bitpix, mut shape) = match kind {
        HduKind::CompressedImage => (
            card_integer(cards, "ZBITPIX").ok_or(Error::MissingKeyword("ZBITPIX"))?,
            axes(cards, "ZNAXIS", "ZNAXIS")?,
        ),
        HduKind::RandomGroups => {
            let naxes = axes(cards, "NAXIS", "NAXIS")?;
            (
                card_integer(cards, "BITPIX").ok_or(Error::MissingKeyword("BITPIX"))?,
                naxes.get(1..).map(<[usize]>::to_vec).unwrap_or_default(),
            )
        }
        _ => (
            card_integer(cards, "BITPIX").ok_or(Error::MissingKeyword("BITPIX"))?,
            axes(cards, "NAXIS", "NAXIS")?,
        ),
    };
    shape.reverse();

    let scaling = match kind {
        HduKind::CompressedImage => Scaling {
            bscale: card_float(cards, "ZSCALE")
                .or_else(|| card_float(cards, "BSCALE"))
                .unwrap_or(1.0),
            bzero: card_float(cards, "ZZERO")
                .or_else(|| card_float(cards, "BZERO"))
                .unwrap_or(0.0),
            blank: card_integer(cards, "ZBLANK").or_else(|| card_integer(cards, "BLANK")),
        },
        HduKind::Primary | HduKind::Image | HduKind::RandomGroups => Scaling::from_cards(cards),
        _ => Scaling::IDENTITY,
    };

    let columns = match kind {
        HduKind::BinaryTable | HduKind::AsciiTable | HduKind::CompressedImage => {
            Some(require_usize(cards, "TFIELDS", "TFIELDS")?)
        }
        _ => None,
    };

    Ok(ExtensionDescriptor {
        index,
        kind,
        dtype: DType::from_bitpix(bitpix)?,
        shape,
        data_offset,
        data_len,
        scaling,
        name: card_string(cards, "EXTNAME").map(String::from),
        version: card_integer(cards, "EXTVER"),
        columns,
    })
}

/// Reads whole header blocks starting at `offset` until one holds END.
///
/// Returns the raw header bytes, or `None` if the source ends first.
fn read_header<F>(offset: u64, total_len: u64, read: &mut F) -> Result<Option<Vec<u8>>>
where
    F: FnMut(u64, usize) -> Result<Vec<u8>>,
{
    let mut header = Vec::with_capacity(BLOCK_SIZE);
    let mut pos = offset;
    while pos + BLOCK_SIZE as u64 <= total_len {
        let block = read(pos, BLOCK_SIZE)?;
        if block.len() != BLOCK_SIZE {
            return Err(Error::ShortRead {
                offset: pos,
                expected: BLOCK_SIZE as u64,
                actual: block.len() as u64,
            });
        }
        let done = end_card_position(&block).is_some();
        header.extend_from_slice(&block);
        pos += BLOCK_SIZE as u64;
        if done {
            return Ok(Some(header));
        }
    }
    Ok(None)
}

/// Walks every HDU of a container of `total_len` bytes.
///
/// `read(offset, len)` must return exactly `len` bytes. Once the primary HDU
/// has been found, anything unparseable after it ends the walk instead of
/// failing it, since trailing garbage after the last HDU is common in the
/// wild.
pub fn scan_hdus<F>(total_len: u64, mut read: F) -> Result<Vec<HduEntry>>
where
    F: FnMut(u64, usize) -> Result<Vec<u8>>,
{
    if total_len < BLOCK_SIZE as u64 {
        return Err(Error::UnexpectedEof);
    }

    let mut entries: Vec<HduEntry> = Vec::new();
    let mut offset = 0u64;

    while offset + BLOCK_SIZE as u64 <= total_len {
        let header = match read_header(offset, total_len, &mut read) {
            Ok(Some(header)) => header,
            Ok(None) if entries.is_empty() => return Err(Error::UnexpectedEof),
            Ok(None) => break,
            Err(e) => return Err(e),
        };
        let parsed = parse_header_blocks(&header).and_then(|cards| {
            if entries.is_empty() && !is_primary_hdu(&cards) {
                return Err(Error::InvalidHeader("first HDU must be primary"));
            }
            let data_offset = offset + header.len() as u64;
            describe(entries.len(), &cards, data_offset).map(|d| (cards, d))
        });
        let (cards, descriptor) = match parsed {
            Ok(parsed) => parsed,
            Err(e) if entries.is_empty() => return Err(e),
            Err(e) => {
                tracing::warn!(offset, error = %e, "ignoring unparseable data after last HDU");
                break;
            }
        };

        // Trailing block padding may be missing, but the data itself may not.
        let data_end = descriptor
            .data_offset
            .checked_add(descriptor.data_len)
            .ok_or(Error::InvalidHeader("data size overflow"))?;
        if data_end > total_len {
            return Err(Error::UnexpectedEof);
        }

        tracing::debug!(
            index = descriptor.index,
            kind = descriptor.kind.type_name(),
            data_offset = descriptor.data_offset,
            data_len = descriptor.data_len,
            "found HDU"
        );
        let next = descriptor
            .data_offset
            .checked_add(padded_byte_len(descriptor.data_len))
            .ok_or(Error::InvalidHeader("data size overflow"))?;
        entries.push(HduEntry {
            descriptor,
            cards,
            header_start: offset,
        });
        offset = next;
    }

    Ok(entries)
}

/// Walks the HDUs of a FITS image that is already in memory.
pub fn parse_fits(data: &[u8]) -> Result<Vec<HduEntry>> {
    scan_hdus(data.len() as u64, |offset, len| {
        let start = offset as usize;
        data.get(start..start + len)
            .map(<[u8]>::to_vec)
            .ok_or(Error::UnexpectedEof)
    })
}
