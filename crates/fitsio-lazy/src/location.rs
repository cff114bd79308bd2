use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Where a container lives, parsed from the string given to `open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    /// An `http://` or `https://` URL.
    Http(String),
    S3 { bucket: String, key: String },
}

impl Location {
    /// Parses a path or URI.
    ///
    /// Strings without a scheme, and `file://` URIs, are local paths.
    pub fn parse(uri: &str) -> Result<Self> {
        let Some((scheme, rest)) = uri.split_once("://") else {
            return Ok(Location::Local(PathBuf::from(uri)));
        };
        match scheme.to_ascii_lowercase().as_str() {
            "file" => Ok(Location::Local(PathBuf::from(rest))),
            "http" | "https" => Ok(Location::Http(uri.to_string())),
            "s3" => {
                let (bucket, key) = rest
                    .split_once('/')
                    .filter(|(b, k)| !b.is_empty() && !k.is_empty())
                    .ok_or_else(|| Error::UnsupportedScheme(uri.to_string()))?;
                Ok(Location::S3 {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            _ => Err(Error::UnsupportedScheme(uri.to_string())),
        }
    }

    /// Lazy loading is the default only for object storage, where every read
    /// is a round trip and whole-file downloads are expensive.
    pub fn default_lazy(&self) -> bool {
        matches!(self, Location::S3 { .. })
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, Location::Local(_))
    }

    /// The HTTPS URL serving an S3 object.
    ///
    /// With an `endpoint` the URL is path-style (`{endpoint}/{bucket}/{key}`),
    /// otherwise virtual-hosted on the regional AWS endpoint.
    pub fn s3_url(bucket: &str, key: &str, region: &str, endpoint: Option<&str>) -> String {
        match endpoint {
            Some(endpoint) => format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/')),
            None => format!("https://{bucket}.s3.{region}.amazonaws.com/{key}"),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Http(url) => f.write_str(url),
            Location::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
        }
    }
}
