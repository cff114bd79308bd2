//! Serialization of image containers.
//!
//! The writer covers what the reader consumes: a primary HDU, image
//! extensions in any supported element type, and header-only stand-ins for
//! tables and tile-compressed images so that non-image HDUs can be laid out
//! around the images under test.

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::array::Array;
use crate::block::{pad_to_block, DATA_PAD_BYTE};
use crate::dtype::{encode, DType};
use crate::error::{Error, Result};
use crate::header::{serialize_header, Card};
use crate::value::Value;

fn commented(keyword: &str, value: Value, comment: &str) -> Card {
    Card {
        comment: Some(String::from(comment)),
        ..Card::new(keyword, value)
    }
}

/// Mandatory cards up to and including the axis lengths. `shape` is
/// outermost first; NAXISn are written fastest-varying first.
fn structural_cards(first: Card, bitpix: i64, shape: &[usize]) -> Vec<Card> {
    let mut cards = vec![
        first,
        commented("BITPIX", Value::Integer(bitpix), "bits per data value"),
        commented("NAXIS", Value::Integer(shape.len() as i64), "number of axes"),
    ];
    cards.extend(
        shape
            .iter()
            .rev()
            .enumerate()
            .map(|(i, &n)| Card::new(&format!("NAXIS{}", i + 1), Value::Integer(n as i64))),
    );
    cards
}

fn extension_card(xtension: &str) -> Card {
    commented(
        "XTENSION",
        Value::String(String::from(xtension)),
        "extension type",
    )
}

fn group_cards(pcount: usize) -> [Card; 2] {
    [
        Card::new("PCOUNT", Value::Integer(pcount as i64)),
        Card::new("GCOUNT", Value::Integer(1)),
    ]
}

/// Builds a FITS container HDU by HDU.
///
/// The first call must add the primary HDU.
#[derive(Debug, Default)]
pub struct FitsWriter {
    buf: Vec<u8>,
    hdus: usize,
}

impl FitsWriter {
    pub fn new() -> Self {
        FitsWriter::default()
    }

    /// Number of HDUs written so far.
    pub fn len(&self) -> usize {
        self.hdus
    }

    pub fn is_empty(&self) -> bool {
        self.hdus == 0
    }

    fn push(&mut self, cards: &[Card], data: &[u8]) {
        self.buf.extend_from_slice(&serialize_header(cards));
        // Headers end on a block boundary, so padding the whole buffer pads
        // just the data segment.
        self.buf.extend_from_slice(data);
        pad_to_block(&mut self.buf, DATA_PAD_BYTE);
        self.hdus += 1;
    }

    fn expect_primary(&self, primary: bool) -> Result<()> {
        match (primary, self.hdus) {
            (true, 0) => Ok(()),
            (true, _) => Err(Error::InvalidHeader("primary HDU already written")),
            (false, 0) => Err(Error::InvalidHeader("primary HDU must come first")),
            (false, _) => Ok(()),
        }
    }

    /// A primary HDU with no data.
    pub fn empty_primary(&mut self) -> Result<&mut Self> {
        self.expect_primary(true)?;
        let mut cards = structural_cards(
            commented("SIMPLE", Value::Logical(true), "conforms to FITS standard"),
            8,
            &[],
        );
        cards.push(Card::new("EXTEND", Value::Logical(true)));
        self.push(&cards, &[]);
        Ok(self)
    }

    /// A primary HDU holding `array`.
    pub fn primary_image(&mut self, array: &Array) -> Result<&mut Self> {
        self.primary_image_with_cards(array, &[])
    }

    pub fn primary_image_with_cards(&mut self, array: &Array, extra: &[Card]) -> Result<&mut Self> {
        self.expect_primary(true)?;
        let simple = commented("SIMPLE", Value::Logical(true), "conforms to FITS standard");
        self.image(simple, array, None, extra)
    }

    /// An IMAGE extension holding `array`, optionally named with EXTNAME.
    pub fn image_extension(&mut self, array: &Array, name: Option<&str>) -> Result<&mut Self> {
        self.image_extension_with_cards(array, name, &[])
    }

    /// Like [`FitsWriter::image_extension`], appending `extra` cards after
    /// the structural ones. Scaling cards in `extra` are written as given,
    /// so stored values can be paired with an arbitrary BSCALE/BZERO/BLANK.
    pub fn image_extension_with_cards(
        &mut self,
        array: &Array,
        name: Option<&str>,
        extra: &[Card],
    ) -> Result<&mut Self> {
        self.expect_primary(false)?;
        self.image(extension_card("IMAGE"), array, name, extra)
    }

    fn image(
        &mut self,
        first: Card,
        array: &Array,
        name: Option<&str>,
        extra: &[Card],
    ) -> Result<&mut Self> {
        let encoded = encode(array.data());
        let extension = self.hdus > 0;
        let mut cards = structural_cards(first, encoded.bitpix, array.shape());
        if extension {
            cards.extend(group_cards(0));
        } else {
            cards.push(Card::new("EXTEND", Value::Logical(true)));
        }
        if let Some(bzero) = encoded.bzero {
            cards.push(Card::new("BSCALE", Value::Integer(1)));
            cards.push(Card::new("BZERO", Value::Float(bzero)));
        }
        if let Some(name) = name {
            cards.push(Card::new("EXTNAME", Value::String(String::from(name))));
        }
        cards.extend_from_slice(extra);
        self.push(&cards, &encoded.bytes);
        Ok(self)
    }

    /// A binary table of `rows` rows with one `width`-byte column, filled
    /// with zeros.
    pub fn byte_table(&mut self, rows: usize, width: usize, name: Option<&str>) -> Result<&mut Self> {
        self.expect_primary(false)?;
        let mut cards = structural_cards(extension_card("BINTABLE"), 8, &[rows, width]);
        cards.extend(group_cards(0));
        cards.push(Card::new("TFIELDS", Value::Integer(1)));
        cards.push(Card::new("TFORM1", Value::String(format!("{width}B"))));
        if let Some(name) = name {
            cards.push(Card::new("EXTNAME", Value::String(String::from(name))));
        }
        self.push(&cards, &vec![0; rows * width]);
        Ok(self)
    }

    /// A tile-compressed image header for an image of `shape` (outermost
    /// first) and element type `zbitpix`, with empty tiles.
    ///
    /// The tiles are never decompressed by this crate; the stub exists so
    /// containers can carry a compressed HDU next to plain images.
    pub fn compressed_image_stub(
        &mut self,
        shape: &[usize],
        zbitpix: i64,
        name: Option<&str>,
    ) -> Result<&mut Self> {
        self.expect_primary(false)?;
        DType::from_bitpix(zbitpix)?;
        let rows = shape.first().copied().unwrap_or(0);
        // One variable-length array descriptor (two 32-bit words) per row.
        let mut cards = structural_cards(extension_card("BINTABLE"), 8, &[rows, 8]);
        cards.extend(group_cards(0));
        cards.push(Card::new("TFIELDS", Value::Integer(1)));
        cards.push(Card::new("TTYPE1", Value::String(String::from("COMPRESSED_DATA"))));
        cards.push(Card::new("TFORM1", Value::String(String::from("1PB(0)"))));
        cards.push(commented("ZIMAGE", Value::Logical(true), "extension contains compressed image"));
        cards.push(Card::new("ZBITPIX", Value::Integer(zbitpix)));
        cards.push(Card::new("ZNAXIS", Value::Integer(shape.len() as i64)));
        cards.extend(
            shape
                .iter()
                .rev()
                .enumerate()
                .map(|(i, &n)| Card::new(&format!("ZNAXIS{}", i + 1), Value::Integer(n as i64))),
        );
        cards.push(Card::new("ZCMPTYPE", Value::String(String::from("RICE_1"))));
        if let Some(name) = name {
            cards.push(Card::new("EXTNAME", Value::String(String::from(name))));
        }
        self.push(&cards, &vec![0; rows * 8]);
        Ok(self)
    }

    /// The serialized container.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Writes the container to `path`.
    #[cfg(feature = "std")]
    pub fn write_to(self, path: impl AsRef<std::path::Path>) -> Result<()> {
        std::fs::write(path, self.finish())?;
        Ok(())
    }
}
