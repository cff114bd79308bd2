//! FITS header card parsing, lookup, and serialization.

use alloc::string::String;
use alloc::vec::Vec;
use core::str;

use crate::block::{pad_to_block, BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE, HEADER_PAD_BYTE};
use crate::error::{Error, Result};
use crate::value::{format_value, parse_value, Value};

/// A parsed FITS header card (one 80-byte keyword record).
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// The 8-byte keyword name, ASCII, left-justified, space-padded.
    pub keyword: [u8; 8],
    /// The parsed value, if this card has a value indicator (`= ` in bytes 8..10).
    pub value: Option<Value>,
    /// An optional comment string.
    pub comment: Option<String>,
}

/// Pad a keyword name to 8 bytes with trailing ASCII spaces.
pub fn keyword_bytes(name: &str) -> [u8; 8] {
    let mut buf = [b' '; 8];
    let bytes = name.as_bytes();
    let len = bytes.len().min(8);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

impl Card {
    /// A value card with no comment.
    pub fn new(keyword: &str, value: Value) -> Self {
        Card {
            keyword: keyword_bytes(keyword),
            value: Some(value),
            comment: None,
        }
    }

    /// Return the keyword as a trimmed UTF-8 string.
    pub fn keyword_str(&self) -> &str {
        let end = self
            .keyword
            .iter()
            .rposition(|&b| b != b' ')
            .map(|i| i + 1)
            .unwrap_or(0);
        str::from_utf8(&self.keyword[..end]).unwrap_or("")
    }

    /// Returns `true` if this card is the END keyword.
    pub fn is_end(&self) -> bool {
        &self.keyword == b"END     "
    }

    /// Returns `true` if this is a blank card (keyword is all spaces).
    pub fn is_blank(&self) -> bool {
        self.keyword.iter().all(|&b| b == b' ')
    }
}

fn trailing_text(bytes: &[u8]) -> Result<Option<String>> {
    let text = str::from_utf8(bytes)
        .map_err(|_| Error::InvalidHeader("card is not ASCII"))?
        .trim_end();
    Ok((!text.is_empty()).then(|| String::from(text)))
}

/// Parse a single 80-byte FITS header card.
pub fn parse_card(card_bytes: &[u8; CARD_SIZE]) -> Result<Card> {
    let mut keyword = [b' '; 8];
    keyword.copy_from_slice(&card_bytes[..8]);

    if !keyword
        .iter()
        .all(|b| matches!(b, b'A'..=b'Z' | b'0'..=b'9' | b' ' | b'-' | b'_'))
    {
        return Err(Error::InvalidKeyword);
    }

    let commentary = matches!(&keyword, b"COMMENT " | b"HISTORY " | b"        " | b"END     ");
    if !commentary && &card_bytes[8..10] == b"= " {
        let field = &card_bytes[10..];
        return Ok(match parse_value(field) {
            Some((value, comment)) => Card {
                keyword,
                value: Some(value),
                comment: comment.map(String::from),
            },
            None => Card {
                keyword,
                value: None,
                comment: field
                    .windows(2)
                    .position(|w| w == b" /")
                    .map(|i| trailing_text(&field[i + 2..]))
                    .transpose()?
                    .flatten()
                    .map(|c| String::from(c.trim_start())),
            },
        });
    }

    Ok(Card {
        keyword,
        value: None,
        comment: trailing_text(&card_bytes[8..])?,
    })
}

/// Returns the index of the block containing the END card, if `block` has one.
///
/// Only the keyword bytes are inspected, so this is cheap enough to call on
/// every freshly fetched block while walking a remote file.
pub fn end_card_position(block: &[u8]) -> Option<usize> {
    block
        .chunks_exact(CARD_SIZE)
        .position(|card| &card[..8] == b"END     ")
}

/// Parse consecutive header blocks until the END card is found.
///
/// Only complete 2880-byte blocks are scanned. The END card is included as
/// the last element of the result.
pub fn parse_header_blocks(data: &[u8]) -> Result<Vec<Card>> {
    let mut cards = Vec::new();
    for block in data.chunks_exact(BLOCK_SIZE) {
        for raw in block.chunks_exact(CARD_SIZE) {
            let raw: &[u8; CARD_SIZE] = raw
                .try_into()
                .map_err(|_| Error::InvalidHeader("truncated card"))?;
            let card = parse_card(raw)?;
            let done = card.is_end();
            cards.push(card);
            if done {
                return Ok(cards);
            }
        }
    }
    Err(Error::UnexpectedEof)
}

/// Serialize a [`Card`] into an 80-byte card image.
pub fn format_card(card: &Card) -> [u8; CARD_SIZE] {
    let mut buf = [b' '; CARD_SIZE];
    buf[..8].copy_from_slice(&card.keyword);

    match (&card.value, &card.comment) {
        (Some(value), comment) => {
            buf[8] = b'=';
            let field = format_value(value);
            buf[10..].copy_from_slice(&field);
            if let Some(comment) = comment {
                let used = 10 + field.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
                let start = used.max(30) + 1;
                if start + 3 < CARD_SIZE {
                    buf[start..start + 2].copy_from_slice(b"/ ");
                    let bytes = comment.as_bytes();
                    let len = bytes.len().min(CARD_SIZE - start - 2);
                    buf[start + 2..start + 2 + len].copy_from_slice(&bytes[..len]);
                }
            }
        }
        (None, Some(text)) => {
            let bytes = text.as_bytes();
            let len = bytes.len().min(CARD_SIZE - 8);
            buf[8..8 + len].copy_from_slice(&bytes[..len]);
        }
        (None, None) => {}
    }
    buf
}

/// Serialize header cards into whole blocks, appending END and blank padding.
pub fn serialize_header(cards: &[Card]) -> Vec<u8> {
    let mut buf = Vec::with_capacity((cards.len() / CARDS_PER_BLOCK + 1) * BLOCK_SIZE);
    for card in cards.iter().filter(|c| !c.is_end()) {
        buf.extend_from_slice(&format_card(card));
    }
    let mut end = [b' '; CARD_SIZE];
    end[..3].copy_from_slice(b"END");
    buf.extend_from_slice(&end);
    pad_to_block(&mut buf, HEADER_PAD_BYTE);
    buf
}

// ── Lookup ──

/// Returns the value of the first card whose keyword is `keyword`.
pub fn find_value<'a>(cards: &'a [Card], keyword: &str) -> Option<&'a Value> {
    cards
        .iter()
        .find(|c| c.keyword_str() == keyword)
        .and_then(|c| c.value.as_ref())
}

pub fn card_integer(cards: &[Card], keyword: &str) -> Option<i64> {
    find_value(cards, keyword).and_then(Value::as_i64)
}

pub fn card_float(cards: &[Card], keyword: &str) -> Option<f64> {
    find_value(cards, keyword).and_then(Value::as_f64)
}

pub fn card_logical(cards: &[Card], keyword: &str) -> Option<bool> {
    find_value(cards, keyword).and_then(Value::as_bool)
}

pub fn card_string<'a>(cards: &'a [Card], keyword: &str) -> Option<&'a str> {
    find_value(cards, keyword)
        .and_then(Value::as_str)
        .map(str::trim)
}

/// Reads a non-negative integer keyword, reporting `name` when it is absent.
pub fn require_usize(cards: &[Card], keyword: &str, name: &'static str) -> Result<usize> {
    let n = card_integer(cards, keyword).ok_or(Error::MissingKeyword(name))?;
    usize::try_from(n).map_err(|_| Error::InvalidHeader("negative axis or count"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn make_card(s: &str) -> [u8; CARD_SIZE] {
        let mut buf = [b' '; CARD_SIZE];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        buf
    }

    fn block_of(cards: &[&str]) -> Vec<u8> {
        let mut block = vec![b' '; BLOCK_SIZE];
        for (i, c) in cards.iter().enumerate() {
            block[i * CARD_SIZE..(i + 1) * CARD_SIZE].copy_from_slice(&make_card(c));
        }
        block
    }

    #[test]
    fn parse_card_integer_with_comment() {
        let c = parse_card(&make_card("BITPIX  =                   16 / bits per pixel")).unwrap();
        assert_eq!(c.keyword_str(), "BITPIX");
        assert_eq!(c.value, Some(Value::Integer(16)));
        assert_eq!(c.comment.as_deref(), Some("bits per pixel"));
    }

    #[test]
    fn parse_card_commentary_keeps_text() {
        let c = parse_card(&make_card("HISTORY = not a value")).unwrap();
        assert!(c.value.is_none());
        assert_eq!(c.comment.as_deref(), Some("= not a value"));
    }

    #[test]
    fn parse_card_empty_value_keeps_comment() {
        let c = parse_card(&make_card("BLANK   =                      / undefined value")).unwrap();
        assert!(c.value.is_none());
        assert_eq!(c.comment.as_deref(), Some("undefined value"));
    }

    #[test]
    fn parse_card_rejects_lowercase_keyword() {
        assert!(matches!(
            parse_card(&make_card("bitpix  =                   16")),
            Err(Error::InvalidKeyword)
        ));
    }

    #[test]
    fn parse_header_stops_at_end() {
        let block = block_of(&[
            "SIMPLE  =                    T",
            "BITPIX  =                  -32",
            "NAXIS   =                    0",
            "END",
        ]);
        let cards = parse_header_blocks(&block).unwrap();
        assert_eq!(cards.len(), 4);
        assert!(cards[3].is_end());
        assert_eq!(card_integer(&cards, "BITPIX"), Some(-32));
        assert_eq!(card_logical(&cards, "SIMPLE"), Some(true));
    }

    #[test]
    fn parse_header_without_end_is_eof() {
        let block = block_of(&["SIMPLE  =                    T"]);
        assert!(matches!(parse_header_blocks(&block), Err(Error::UnexpectedEof)));
        assert!(matches!(parse_header_blocks(&[]), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn end_card_position_finds_card_index() {
        let block = block_of(&["SIMPLE  =                    T", "END"]);
        assert_eq!(end_card_position(&block), Some(1));
        assert_eq!(end_card_position(&block_of(&["SIMPLE  =                    T"])), None);
    }

    #[test]
    fn serialize_then_parse() {
        let mut extname = Card::new("EXTNAME", Value::String(String::from("SCI")));
        extname.comment = Some(String::from("extension name"));
        let cards = vec![
            Card::new("XTENSION", Value::String(String::from("IMAGE"))),
            Card::new("BITPIX", Value::Integer(16)),
            extname,
        ];
        let bytes = serialize_header(&cards);
        assert_eq!(bytes.len(), BLOCK_SIZE);
        let parsed = parse_header_blocks(&bytes).unwrap();
        assert_eq!(parsed.len(), 4);
        assert_eq!(card_string(&parsed, "EXTNAME"), Some("SCI"));
        assert_eq!(parsed[2].comment.as_deref(), Some("extension name"));
    }

    #[test]
    fn serialize_spills_to_second_block() {
        let cards: Vec<Card> = (0..CARDS_PER_BLOCK)
            .map(|i| Card::new(&alloc::format!("KEY{i}"), Value::Integer(i as i64)))
            .collect();
        assert_eq!(serialize_header(&cards).len(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn require_usize_rejects_negative() {
        let cards = vec![Card::new("NAXIS1", Value::Integer(-1))];
        assert!(require_usize(&cards, "NAXIS1", "NAXISn").is_err());
        assert!(matches!(
            require_usize(&cards, "NAXIS2", "NAXISn"),
            Err(Error::MissingKeyword("NAXISn"))
        ));
    }
}
