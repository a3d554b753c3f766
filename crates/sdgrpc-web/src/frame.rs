//! gRPC-Web framing
//!
//! Messages travel as length-prefixed frames: one flag byte, a big-endian
//! `u32` length, then the payload. Data frames use flag `0x00`; the response
//! trailers are sent as one final frame with flag `0x80` whose payload is an
//! HTTP/1 style header block. The text variant base64-encodes the same bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{BufMut, Bytes, BytesMut};
use http::header::{HeaderMap, HeaderName, HeaderValue};

/// Length of the flag byte plus the length prefix
pub const FRAME_HEADER_LEN: usize = 5;

/// Flag of an uncompressed data frame
pub const DATA_FLAG: u8 = 0x00;

/// Flag bit marking a compressed data frame
pub const COMPRESSED_FLAG: u8 = 0x01;

/// Flag marking the trailer frame
pub const TRAILER_FLAG: u8 = 0x80;

/// Error type for framing failures
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    /// Frame header declares more bytes than the body holds
    #[error("Truncated frame: header declares {declared} bytes but {available} remain")]
    Truncated {
        /// Declared payload length
        declared: usize,
        /// Bytes actually left in the body
        available: usize,
    },

    /// Body ends inside a frame header
    #[error("Incomplete frame header: {0} trailing bytes")]
    IncompleteHeader(usize),

    /// Compressed request frames are not supported
    #[error("Compressed messages are not supported")]
    Compressed,

    /// Flag that has no meaning in a request body
    #[error("Unexpected frame flag 0x{0:02x} in request")]
    UnexpectedFlag(u8),

    /// Text body is not valid base64
    #[error("Invalid base64 payload: {0}")]
    Base64(String),

    /// Payload does not fit the `u32` length prefix
    #[error("Frame payload of {0} bytes exceeds the length prefix")]
    TooLarge(usize),
}

/// Wire variant of a gRPC-Web body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Raw frames (`application/grpc-web`)
    Binary,
    /// Base64 frames (`application/grpc-web-text`)
    Text,
}

impl Encoding {
    /// Canonical binary content type
    pub const BINARY_CONTENT_TYPE: &'static str = "application/grpc-web+proto";

    /// Canonical text content type
    pub const TEXT_CONTENT_TYPE: &'static str = "application/grpc-web-text+proto";

    /// Classify a content type or accept value, ignoring parameters
    pub fn from_content_type(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/grpc-web" | "application/grpc-web+proto" => Some(Encoding::Binary),
            "application/grpc-web-text" | "application/grpc-web-text+proto" => {
                Some(Encoding::Text)
            }
            _ => None,
        }
    }

    /// Classify a header value
    pub fn from_header(value: Option<&HeaderValue>) -> Option<Self> {
        value
            .and_then(|v| v.to_str().ok())
            .and_then(Self::from_content_type)
    }

    /// Content type announced for responses in this encoding
    pub fn content_type(self) -> HeaderValue {
        match self {
            Encoding::Binary => HeaderValue::from_static(Self::BINARY_CONTENT_TYPE),
            Encoding::Text => HeaderValue::from_static(Self::TEXT_CONTENT_TYPE),
        }
    }

    /// Turn a request body into raw frames
    pub fn decode(self, body: Bytes) -> Result<Bytes, FrameError> {
        match self {
            Encoding::Binary => Ok(body),
            Encoding::Text => decode_text(&body).map(Bytes::from),
        }
    }

    /// Encode a chunk of raw response frames for the wire
    pub fn encode(self, chunk: Bytes) -> Bytes {
        match self {
            Encoding::Binary => chunk,
            Encoding::Text => Bytes::from(STANDARD.encode(&chunk)),
        }
    }
}

/// Decode a text body, which may be several padded base64 chunks back to back
fn decode_text(body: &[u8]) -> Result<Vec<u8>, FrameError> {
    let cleaned: Vec<u8> = body
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if cleaned.len() % 4 != 0 {
        return Err(FrameError::Base64(format!(
            "length {} is not a multiple of 4",
            cleaned.len()
        )));
    }

    let mut out = Vec::with_capacity(cleaned.len() / 4 * 3);
    let mut start = 0;
    for (i, quad) in cleaned.chunks(4).enumerate() {
        if quad.contains(&b'=') {
            let end = (i + 1) * 4;
            STANDARD
                .decode_vec(&cleaned[start..end], &mut out)
                .map_err(|e| FrameError::Base64(e.to_string()))?;
            start = end;
        }
    }
    if start < cleaned.len() {
        STANDARD
            .decode_vec(&cleaned[start..], &mut out)
            .map_err(|e| FrameError::Base64(e.to_string()))?;
    }

    Ok(out)
}

/// One parsed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Flag byte
    pub flag: u8,
    /// Payload following the length prefix
    pub payload: &'a [u8],
}

impl Frame<'_> {
    /// Whether this is the trailer frame
    pub fn is_trailer(&self) -> bool {
        self.flag & TRAILER_FLAG != 0
    }
}

/// Split a buffer of frames
pub fn parse_frames(mut buf: &[u8]) -> Result<Vec<Frame<'_>>, FrameError> {
    let mut frames = Vec::new();
    while !buf.is_empty() {
        if buf.len() < FRAME_HEADER_LEN {
            return Err(FrameError::IncompleteHeader(buf.len()));
        }
        let flag = buf[0];
        let declared = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        let rest = &buf[FRAME_HEADER_LEN..];
        if rest.len() < declared {
            return Err(FrameError::Truncated {
                declared,
                available: rest.len(),
            });
        }
        frames.push(Frame {
            flag,
            payload: &rest[..declared],
        });
        buf = &rest[declared..];
    }
    Ok(frames)
}

/// Check a request body carries only well-formed, uncompressed data frames
///
/// Returns the number of messages.
pub fn validate_request(buf: &[u8]) -> Result<usize, FrameError> {
    let frames = parse_frames(buf)?;
    for frame in &frames {
        match frame.flag {
            DATA_FLAG => {}
            COMPRESSED_FLAG => return Err(FrameError::Compressed),
            other => return Err(FrameError::UnexpectedFlag(other)),
        }
    }
    Ok(frames.len())
}

fn prefix_len(len: usize) -> Result<u32, FrameError> {
    u32::try_from(len).map_err(|_| FrameError::TooLarge(len))
}

fn frame(flag: u8, payload: &[u8]) -> Result<Bytes, FrameError> {
    let len = prefix_len(payload.len())?;
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    out.put_u8(flag);
    out.put_u32(len);
    out.put_slice(payload);
    Ok(out.freeze())
}

/// Frame one encoded message
pub fn encode_message(payload: &[u8]) -> Result<Bytes, FrameError> {
    frame(DATA_FLAG, payload)
}

/// Frame the response trailers
pub fn encode_trailers(trailers: &HeaderMap) -> Result<Bytes, FrameError> {
    let mut block = Vec::new();
    for (name, value) in trailers {
        block.extend_from_slice(name.as_str().as_bytes());
        block.extend_from_slice(b": ");
        block.extend_from_slice(value.as_bytes());
        block.extend_from_slice(b"\r\n");
    }
    frame(TRAILER_FLAG, &block)
}

/// Parse the header block of a trailer frame
///
/// Lines that are not valid headers are skipped.
pub fn decode_trailers(block: &[u8]) -> HeaderMap {
    let mut trailers = HeaderMap::new();
    for line in block.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        let name = HeaderName::from_bytes(line[..colon].trim_ascii());
        let value = HeaderValue::from_bytes(line[colon + 1..].trim_ascii());
        if let (Ok(name), Ok(value)) = (name, value) {
            trailers.append(name, value);
        }
    }
    trailers
}
