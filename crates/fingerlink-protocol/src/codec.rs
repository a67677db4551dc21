//! Tokio codec for the newline-delimited server link.
//!
//! [`LineCodec`] plugs the line protocol into Tokio's `Framed` streams:
//! - [`Decoder`]: yields one `String` per `\n`-terminated line, with a
//!   trailing `\r` removed
//! - [`Encoder<Outbound>`]: writes every line of a message, each followed
//!   by `\n`
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//! use fingerlink_protocol::{LineCodec, Outbound};
//! use futures::{SinkExt, StreamExt};
//!
//! # async fn example() -> fingerlink_core::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:5050").await?;
//! let mut framed = Framed::new(stream, LineCodec::new());
//!
//! framed.send(Outbound::Greeting).await?;
//! if let Some(Ok(line)) = framed.next().await {
//!     println!("Received: {line}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Line Length Limit
//!
//! A line longer than the configured limit is a decode error. The codec
//! then discards input up to the next terminator, so decoding resumes at
//! the following line.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::Outbound;
use fingerlink_core::{
    Error, Result,
    constants::{LINE_TERMINATOR, MAX_LINE_LENGTH},
};

const NEWLINE: u8 = LINE_TERMINATOR as u8;

/// Tokio codec for newline-delimited UTF-8 text.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Bytes already scanned for a terminator.
    next_index: usize,

    /// Maximum allowed line length in bytes, terminator excluded.
    max_line_length: usize,

    /// Dropping the rest of an over-long line.
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom line limit.
    ///
    /// # Example
    ///
    /// ```
    /// use fingerlink_protocol::LineCodec;
    ///
    /// let codec = LineCodec::with_max_line_length(4096);
    /// assert_eq!(codec.max_line_length(), 4096);
    /// ```
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            next_index: 0,
            max_line_length,
            discarding: false,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    fn take_line(&mut self, src: &mut BytesMut, end: usize) -> Result<String> {
        self.next_index = 0;
        let raw = src.split_to(end + 1);
        let mut line = &raw[..end];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        self.to_text(line)
    }

    fn to_text(&self, line: &[u8]) -> Result<String> {
        if line.len() > self.max_line_length {
            return Err(Error::LineTooLong {
                max: self.max_line_length,
            });
        }
        std::str::from_utf8(line)
            .map(str::to_string)
            .map_err(|_| Error::InvalidUtf8)
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = Error;

    /// Decode one line from the byte stream.
    ///
    /// Returns `Ok(None)` until a full line is buffered.
    ///
    /// # Example
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use tokio_util::codec::Decoder;
    /// use fingerlink_protocol::LineCodec;
    ///
    /// let mut codec = LineCodec::new();
    /// let mut buffer = BytesMut::from(&b"enroll\r\n7\n"[..]);
    ///
    /// assert_eq!(codec.decode(&mut buffer).unwrap(), Some("enroll".to_string()));
    /// assert_eq!(codec.decode(&mut buffer).unwrap(), Some("7".to_string()));
    /// assert_eq!(codec.decode(&mut buffer).unwrap(), None);
    /// ```
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if self.discarding {
            match src.iter().position(|b| *b == NEWLINE) {
                Some(end) => {
                    src.advance(end + 1);
                    self.discarding = false;
                }
                None => {
                    src.clear();
                    return Ok(None);
                }
            }
        }

        let search_from = self.next_index.min(src.len());
        match src[search_from..].iter().position(|b| *b == NEWLINE) {
            Some(offset) => self.take_line(src, search_from + offset).map(Some),
            None if src.len() > self.max_line_length + 1 => {
                src.clear();
                self.next_index = 0;
                self.discarding = true;
                Err(Error::LineTooLong {
                    max: self.max_line_length,
                })
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    /// Decode at end of stream: an unterminated tail is returned as a last line.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() || self.discarding {
            src.clear();
            self.discarding = false;
            return Ok(None);
        }
        self.next_index = 0;
        let tail = src.split();
        let line = tail.strip_suffix(b"\r").unwrap_or(&tail[..]);
        self.to_text(line).map(Some)
    }
}

impl Encoder<Outbound> for LineCodec {
    type Error = Error;

    /// Encode every line of the message, each followed by `\n`.
    ///
    /// # Errors
    ///
    /// A line that itself contains `\n` or `\r` would split on the wire and
    /// is rejected.
    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<()> {
        let lines = item.lines();
        if let Some(bad) = lines.iter().find(|l| l.contains(['\r', LINE_TERMINATOR])) {
            return Err(Error::InvalidMessageFormat {
                message: format!("Line break inside outbound line: {bad:?}"),
            });
        }

        dst.reserve(lines.iter().map(|l| l.len() + 1).sum());
        for line in &lines {
            dst.put_slice(line.as_bytes());
            dst.put_u8(NEWLINE);
        }
        Ok(())
    }
}
