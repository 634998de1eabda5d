use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;
use std::string::FromUtf8Error;

/// How the server ended the response stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfStream {
    /// Orderly shutdown (read returned EOF)
    Closed,
    /// Peer reset the connection mid-read; the body holds what arrived before it
    Reset,
}

/// Raw response from a WHOIS server, byte-for-byte as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoisResponse {
    body: Bytes,
    end: EndOfStream,
}

impl WhoisResponse {
    pub fn new(body: impl Into<Bytes>, end: EndOfStream) -> Self {
        Self {
            body: body.into(),
            end,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Text view of the body; invalid UTF-8 sequences become U+FFFD
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Strict UTF-8 conversion
    pub fn into_string(self) -> Result<String, FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }

    pub fn into_bytes(self) -> Bytes {
        self.body
    }

    pub fn end_of_stream(&self) -> EndOfStream {
        self.end
    }

    pub fn was_reset(&self) -> bool {
        self.end == EndOfStream::Reset
    }
}

impl fmt::Display for WhoisResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl PartialEq<str> for WhoisResponse {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for WhoisResponse {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl AsRef<[u8]> for WhoisResponse {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
