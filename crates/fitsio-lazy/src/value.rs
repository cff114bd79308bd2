//! Header value parsing and formatting.

use alloc::format;
use alloc::string::String;
use core::str;

/// Width of the value field of a card (bytes 10..80).
pub const VALUE_FIELD_LEN: usize = 70;

/// A parsed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS character string with trailing blanks removed.
    String(String),
}

impl Value {
    /// Integer view of the value. Floats with no fractional part also qualify.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(f) if libm::trunc(*f) == *f => Some(*f as i64),
            _ => None,
        }
    }

    /// Numeric view of the value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Logical(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Value::Logical(b) => write!(f, "{}", if *b { 'T' } else { 'F' }),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "'{s}'"),
        }
    }
}

/// Finds the ` /` comment separator and returns the trimmed comment after it.
fn comment_after(field: &[u8]) -> (usize, Option<&str>) {
    let sep = field.windows(2).position(|w| w == b" /");
    match sep {
        Some(i) => {
            let mut start = i + 2;
            if field.get(start) == Some(&b' ') {
                start += 1;
            }
            let comment = str::from_utf8(&field[start..])
                .ok()
                .map(str::trim_end)
                .filter(|s| !s.is_empty());
            (i, comment)
        }
        None => (field.len(), None),
    }
}

/// Quoted string starting at `field[0] == '\''`; `''` is an escaped quote.
fn parse_quoted(field: &[u8]) -> (Value, Option<&str>) {
    let mut text = String::new();
    let mut i = 1;
    while i < field.len() {
        match field[i] {
            b'\'' if field.get(i + 1) == Some(&b'\'') => {
                text.push('\'');
                i += 2;
            }
            b'\'' => {
                i += 1;
                break;
            }
            b => {
                text.push(b as char);
                i += 1;
            }
        }
    }
    let trimmed = String::from(text.trim_end());
    let (_, comment) = comment_after(&field[i.min(field.len())..]);
    (Value::String(trimmed), comment)
}

fn parse_float_text(text: &str) -> Option<f64> {
    if text.contains(['D', 'd']) {
        text.replace(['D', 'd'], "E").parse().ok()
    } else {
        text.parse().ok()
    }
}

/// Parse the 70-byte value field of a card (bytes 10..80).
///
/// Returns the value and the optional comment that follows it. Leading
/// blanks before a string's opening quote are tolerated.
pub fn parse_value(field: &[u8]) -> Option<(Value, Option<&str>)> {
    let lead = field.iter().position(|&b| b != b' ')?;
    if field[lead] == b'\'' {
        return Some(parse_quoted(&field[lead..]));
    }

    let (end, comment) = comment_after(field);
    let text = str::from_utf8(&field[..end]).ok()?.trim();
    let value = match text {
        "" => return None,
        "T" => Value::Logical(true),
        "F" => Value::Logical(false),
        _ if !text.contains(['.', 'E', 'e', 'D', 'd']) => Value::Integer(text.parse().ok()?),
        _ => Value::Float(parse_float_text(text)?),
    };
    Some((value, comment))
}

/// Serialize a value into a 70-byte field.
///
/// Numbers and logicals are right-justified to column 30 of the card, strings
/// start with a quote at column 11 and are padded to at least 8 characters.
pub fn format_value(value: &Value) -> [u8; VALUE_FIELD_LEN] {
    let mut buf = [b' '; VALUE_FIELD_LEN];
    let fixed = match value {
        Value::Logical(b) => String::from(if *b { "T" } else { "F" }),
        Value::Integer(n) => format!("{n}"),
        Value::Float(f) => format_float(*f),
        Value::String(s) => {
            let escaped = s.replace('\'', "''");
            let quoted = format!("'{escaped:<8}'");
            let len = quoted.len().min(VALUE_FIELD_LEN);
            buf[..len].copy_from_slice(&quoted.as_bytes()[..len]);
            return buf;
        }
    };
    let bytes = fixed.as_bytes();
    let len = bytes.len().min(20);
    buf[20 - len..20].copy_from_slice(&bytes[..len]);
    buf
}

fn format_float(f: f64) -> String {
    if f == 0.0 {
        return String::from("0.0");
    }
    let plain = format!("{f:?}");
    if plain.len() <= 20 {
        return plain;
    }
    let mut precision = 14usize;
    loop {
        let s = format!("{f:.precision$E}");
        if s.len() <= 20 || precision == 0 {
            return s;
        }
        precision -= 1;
    }
}
