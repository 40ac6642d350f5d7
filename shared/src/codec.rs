//! Line codec for the device command protocol
//!
//! Every command is one ASCII line:
//! ```text
//! [ 5 bytes: '0' | '1' per digit, thumb first ][ delimiter: "\n" or "\r\n" ]
//! ```
//!
//! There are no sequence numbers and no acknowledgement; each frame's line
//! supersedes the previous one.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::gesture::GestureVector;
use crate::link::MAX_LINE_LEN;

/// Number of digit characters in a command line
pub const COMMAND_LEN: usize = 5;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Invalid command length: {0} characters (expected {COMMAND_LEN})")]
    InvalidLength(usize),

    #[error("Invalid command character {0:?} at position {1}")]
    InvalidCharacter(char, usize),

    #[error("Line too long: {0} bytes (max: {MAX_LINE_LEN})")]
    LineTooLong(usize),

    #[error("Unknown line ending: {0}")]
    UnknownLineEnding(String),
}

/// Delimiter appended to every command on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::Lf => b"\n",
            LineEnding::CrLf => b"\r\n",
        }
    }
}

impl FromStr for LineEnding {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lf" => Ok(LineEnding::Lf),
            "crlf" => Ok(LineEnding::CrLf),
            other => Err(CodecError::UnknownLineEnding(other.to_string())),
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineEnding::Lf => write!(f, "lf"),
            LineEnding::CrLf => write!(f, "crlf"),
        }
    }
}

/// Canonical command text for one [`GestureVector`], without delimiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandMessage([u8; COMMAND_LEN]);

impl CommandMessage {
    /// The command text, e.g. `"01100"`
    pub fn as_str(&self) -> &str {
        // Only ever holds b'0' / b'1'
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Bytes to put on the wire, delimiter included
    pub fn to_wire(&self, ending: LineEnding) -> Bytes {
        let mut buf = BytesMut::with_capacity(COMMAND_LEN + 2);
        self.encode_into(ending, &mut buf);
        buf.freeze()
    }

    /// Append the wire form to a buffer
    pub fn encode_into(&self, ending: LineEnding, buf: &mut BytesMut) {
        buf.reserve(COMMAND_LEN + 2);
        buf.put_slice(&self.0);
        buf.put_slice(ending.as_bytes());
    }

    /// Parse a received line; a trailing `\n` or `\r\n` is accepted
    pub fn parse(line: &[u8]) -> Result<Self, CodecError> {
        let line = strip_delimiter(line);
        if line.len() != COMMAND_LEN {
            return Err(CodecError::InvalidLength(line.len()));
        }

        let mut digits = [b'0'; COMMAND_LEN];
        for (i, &b) in line.iter().enumerate() {
            match b {
                b'0' | b'1' => digits[i] = b,
                other => return Err(CodecError::InvalidCharacter(other as char, i)),
            }
        }
        Ok(Self(digits))
    }
}

impl fmt::Display for CommandMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandMessage {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

impl From<GestureVector> for CommandMessage {
    fn from(vector: GestureVector) -> Self {
        encode(vector)
    }
}

impl From<CommandMessage> for GestureVector {
    fn from(message: CommandMessage) -> Self {
        decode(&message)
    }
}

/// Encode a gesture: `'1'` for an extended digit, `'0'` otherwise
pub fn encode(vector: GestureVector) -> CommandMessage {
    let mut digits = [b'0'; COMMAND_LEN];
    for (slot, up) in digits.iter_mut().zip(vector.as_array()) {
        if up {
            *slot = b'1';
        }
    }
    CommandMessage(digits)
}

/// Inverse of [`encode`]
pub fn decode(message: &CommandMessage) -> GestureVector {
    let mut states = [false; COMMAND_LEN];
    for (state, &b) in states.iter_mut().zip(message.0.iter()) {
        *state = b == b'1';
    }
    GestureVector::new(states)
}

fn strip_delimiter(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Splits a byte stream into lines
#[derive(Debug)]
pub struct LineDecoder {
    /// Partial line data being accumulated
    buffer: BytesMut,
    max_line_len: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::with_max_line_len(MAX_LINE_LEN)
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            max_line_len,
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to take the next complete line, delimiter stripped
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete lines.
    /// An over-long line is discarded and reported once as `LineTooLong`.
    pub fn decode_next(&mut self) -> Result<Option<Bytes>, CodecError> {
        let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
            if self.buffer.len() > self.max_line_len {
                let len = self.buffer.len();
                self.buffer.clear();
                return Err(CodecError::LineTooLong(len));
            }
            return Ok(None);
        };

        let mut line = self.buffer.split_to(pos);
        self.buffer.advance(1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        if line.len() > self.max_line_len {
            return Err(CodecError::LineTooLong(line.len()));
        }
        Ok(Some(line.freeze()))
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
