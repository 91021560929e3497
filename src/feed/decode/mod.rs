// src/feed/decode/mod.rs
pub mod binary;
pub mod text;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::feed::error::DecodeError;
use crate::feed::types::DecodedFeed;

/// Wire representation of the upstream feed. Chosen once from configuration,
/// never sniffed from the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    /// GTFS-realtime protocol buffer.
    #[default]
    Binary,
    /// Protobuf text/debug dump (`?format=text`).
    Text,
}

impl FeedFormat {
    /// `Accept` header to send upstream for this format.
    pub fn accept_header(self) -> &'static str {
        match self {
            FeedFormat::Binary => "application/octet-stream",
            FeedFormat::Text => "text/plain",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedFormat::Binary => "binary",
            FeedFormat::Text => "text",
        }
    }
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" | "protobuf" | "pb" => Ok(FeedFormat::Binary),
            "text" | "debug" => Ok(FeedFormat::Text),
            other => Err(anyhow::anyhow!("unknown feed format: {other:?}")),
        }
    }
}

/// Decode raw feed bytes. All-or-nothing: any framing problem fails the whole
/// payload and no partial entity list is returned.
pub fn decode(raw: &[u8], format: FeedFormat) -> Result<DecodedFeed, DecodeError> {
    match format {
        FeedFormat::Binary => binary::decode(raw),
        FeedFormat::Text => text::decode(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("TEXT".parse::<FeedFormat>().unwrap(), FeedFormat::Text);
        assert_eq!(" binary ".parse::<FeedFormat>().unwrap(), FeedFormat::Binary);
        assert!("xml".parse::<FeedFormat>().is_err());
    }

    #[test]
    fn accept_header_follows_format() {
        assert_eq!(FeedFormat::Binary.accept_header(), "application/octet-stream");
        assert_eq!(FeedFormat::Text.accept_header(), "text/plain");
    }
}
