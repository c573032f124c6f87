use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Data block compression. The numeric codes are stored in the trailer's
/// `compression_algorithm` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
    /// Raw Snappy, fast general-purpose compression.
    Snappy = 1,
    /// zlib-wrapped DEFLATE.
    Zlib = 2,
}

impl CompressionType {
    pub const ALL: [CompressionType; 3] = [
        CompressionType::None,
        CompressionType::Snappy,
        CompressionType::Zlib,
    ];

    #[must_use]
    pub fn code(self) -> u64 {
        self as u64
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CompressionType::None => "none",
            CompressionType::Snappy => "snappy",
            CompressionType::Zlib => "zlib",
        }
    }

    /// Compresses a finished block payload.
    pub fn compress(self, raw: &[u8]) -> Result<Vec<u8>> {
        match self {
            CompressionType::None => Ok(raw.to_vec()),
            CompressionType::Snappy => snap::raw::Encoder::new()
                .compress_vec(raw)
                .map_err(|e| Error::Io(io::Error::from(e))),
            CompressionType::Zlib => {
                let mut enc = ZlibEncoder::new(
                    Vec::with_capacity(raw.len() / 2),
                    flate2::Compression::default(),
                );
                enc.write_all(raw)?;
                Ok(enc.finish()?)
            }
        }
    }

    /// Reverses [`compress`](CompressionType::compress). Malformed input is
    /// reported as [`Error::Format`].
    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            CompressionType::None => Ok(data.to_vec()),
            CompressionType::Snappy => snap::raw::Decoder::new()
                .decompress_vec(data)
                .map_err(|e| Error::format(format!("snappy block: {}", e))),
            CompressionType::Zlib => {
                let mut out = Vec::with_capacity(data.len() * 2);
                ZlibDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|e| Error::format(format!("zlib block: {}", e)))?;
                Ok(out)
            }
        }
    }
}

impl TryFrom<u64> for CompressionType {
    type Error = Error;

    fn try_from(code: u64) -> Result<Self> {
        match code {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Snappy),
            2 => Ok(CompressionType::Zlib),
            other => Err(Error::Config(format!("unknown compression code {}", other))),
        }
    }
}

impl FromStr for CompressionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CompressionType::None),
            "snappy" => Ok(CompressionType::Snappy),
            "zlib" | "deflate" => Ok(CompressionType::Zlib),
            other => Err(Error::Config(format!("unknown compression type {:?}", other))),
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
