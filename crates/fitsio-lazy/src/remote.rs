//! HTTP(S) byte ranges via `Range` requests.
//!
//! S3 objects are served through the same type: `s3://bucket/key` is
//! rewritten to the bucket's HTTPS endpoint before a source is created.

use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::StatusCode;

use crate::error::{Error, Result};
use crate::source::{check_bounds, ByteRangeSource};

/// A remote object read with one ranged GET per [`ByteRangeSource::read`].
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    url: String,
    len: Option<u64>,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("fitsio-lazy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpSource::with_client(client, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        HttpSource {
            client,
            url: url.into(),
            len: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn status_error(&self, status: StatusCode) -> Error {
        Error::HttpStatus {
            status: status.as_u16(),
            url: self.url.clone(),
        }
    }

    fn fetch_len(&self) -> Result<u64> {
        let head = self.client.head(&self.url).send()?;
        if head.status().is_success() {
            if let Some(len) = header_u64(&head, CONTENT_LENGTH.as_str()) {
                return Ok(len);
            }
        }
        // Some servers refuse HEAD; a one-byte range reports the total size.
        let first_byte = self.client.get(&self.url).header(RANGE, "bytes=0-0").send()?;
        match first_byte.status() {
            StatusCode::PARTIAL_CONTENT => first_byte
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range_total)
                .ok_or(Error::InvalidValue),
            StatusCode::OK => header_u64(&first_byte, CONTENT_LENGTH.as_str()).ok_or(Error::InvalidValue),
            other => Err(self.status_error(other)),
        }
    }
}

fn header_u64(resp: &Response, name: &str) -> Option<u64> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Total size from a `Content-Range: bytes a-b/total` header.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}

impl ByteRangeSource for HttpSource {
    fn read(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        if let Some(total) = self.len {
            check_bounds(offset, length, total)?;
        }
        let range = format!("bytes={}-{}", offset, offset + length - 1);
        tracing::debug!(url = %self.url, %range, "ranged GET");
        let resp = self.client.get(&self.url).header(RANGE, &range).send()?;
        let status = resp.status();
        let body = match status {
            StatusCode::PARTIAL_CONTENT => resp.bytes()?.to_vec(),
            // The server ignored the range and sent the whole object.
            StatusCode::OK => {
                let all = resp.bytes()?;
                let start = offset as usize;
                all.get(start..start + length as usize)
                    .map(<[u8]>::to_vec)
                    .ok_or(Error::ShortRead {
                        offset,
                        expected: length,
                        actual: (all.len() as u64).saturating_sub(offset),
                    })?
            }
            other => return Err(self.status_error(other)),
        };
        if body.len() as u64 != length {
            return Err(Error::ShortRead {
                offset,
                expected: length,
                actual: body.len() as u64,
            });
        }
        Ok(body)
    }

    fn len(&mut self) -> Result<u64> {
        match self.len {
            Some(len) => Ok(len),
            None => {
                let len = self.fetch_len()?;
                tracing::debug!(url = %self.url, len, "remote object size");
                self.len = Some(len);
                Ok(len)
            }
        }
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
