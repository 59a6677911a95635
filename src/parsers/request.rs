//! HTTP request parsing.
//!
//! This module provides the `HttpRequest` type which parses HTTP/1.1 request
//! headers while leaving the body in the stream. Bodies of guarded requests
//! are buffered separately with [`HttpRequest::read_body`] so they can be
//! inspected and then forwarded unchanged.

use std::collections::HashMap;
use std::io::{self, BufRead, Cursor, Read, Write};
use thiserror::Error;
use tracing::{debug, warn};

/// Represents a parsed HTTP request with headers and metadata.
///
/// The raw header bytes are preserved so the request can be forwarded to the
/// backend exactly as the client sent it.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub version: String,
    pub headers: HashMap<String, String>,
    pub raw_headers: Vec<u8>, // Original header bytes for forwarding
    pub content_length: Option<usize>,
}

/// Failure to buffer a request body
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("error reading request body: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpRequest {
    /// Parse HTTP request from a buffered reader
    /// Reads ONLY the headers, leaving the body in the stream
    #[tracing::instrument(skip(reader), level = "debug")]
    pub fn parse<R: BufRead>(reader: &mut R) -> Result<Self, String> {
        let mut raw_headers = Vec::new();
        let mut lines = Vec::new();
        debug!("Starting HTTP request parse");

        // Read lines until we hit the empty line that separates headers from body
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => return Err("Connection closed while reading headers".to_string()),
                Ok(_) => {
                    raw_headers.extend_from_slice(line.as_bytes());

                    if line == "\r\n" || line == "\n" {
                        break;
                    }

                    lines.push(line.trim_end().to_string());
                }
                Err(e) => {
                    warn!(error = ?e, "Error reading headers");
                    return Err(format!("Error reading headers: {}", e));
                }
            }
        }

        if lines.is_empty() {
            return Err("Empty request".to_string());
        }

        // Parse the request line: "POST /api/devices HTTP/1.1"
        let request_line_parts: Vec<&str> = lines[0].split_whitespace().collect();
        if request_line_parts.len() < 3 {
            return Err("Invalid request line".to_string());
        }

        let method = request_line_parts[0].to_string();
        let path = request_line_parts[1].to_string();
        let version = request_line_parts[2].to_string();
        debug!(%method, %path, %version, header_lines = lines.len().saturating_sub(1), "Parsed request line");

        let mut headers = HashMap::new();
        for line in &lines[1..] {
            if let Some(colon_pos) = line.find(':') {
                let key = line[..colon_pos].trim().to_string();
                let value = line[colon_pos + 1..].trim().to_string();
                headers.insert(key.to_lowercase(), value);
            }
        }

        let content_length = match headers.get("content-length") {
            Some(v) => Some(
                v.parse::<usize>()
                    .map_err(|_| format!("Invalid Content-Length: {}", v))?,
            ),
            None => None,
        };

        Ok(HttpRequest {
            method,
            path,
            version,
            headers,
            raw_headers,
            content_length,
        })
    }

    /// Buffer the whole body into a rewindable cursor.
    ///
    /// Reads exactly `Content-Length` bytes; a request without one has an
    /// empty body.
    pub fn read_body<R: Read>(
        &self,
        reader: &mut R,
        limit: usize,
    ) -> Result<Cursor<Vec<u8>>, BodyError> {
        let size = self.content_length.unwrap_or(0);
        if size > limit {
            return Err(BodyError::TooLarge { size, limit });
        }

        let mut body = vec![0u8; size];
        reader.read_exact(&mut body)?;
        debug!(bytes = size, "Buffered request body");
        Ok(Cursor::new(body))
    }

    /// Header block to send upstream.
    ///
    /// Identical to what the client sent except that any `Connection` header
    /// is replaced with `Connection: close`, since the gate serves one request
    /// per connection.
    pub fn head_for_backend(&self) -> Vec<u8> {
        let mut head = Vec::with_capacity(self.raw_headers.len() + 19);
        for line in String::from_utf8_lossy(&self.raw_headers).lines() {
            if line.is_empty() {
                continue;
            }
            let is_connection = line
                .split_once(':')
                .map(|(name, _)| name.trim().eq_ignore_ascii_case("connection"))
                .unwrap_or(false);
            if is_connection {
                continue;
            }
            head.extend_from_slice(line.as_bytes());
            head.extend_from_slice(b"\r\n");
        }
        head.extend_from_slice(b"Connection: close\r\n\r\n");
        head
    }

    /// Get a specific header value
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_lowercase())
    }

    /// Check if request has a body
    pub fn has_body(&self) -> bool {
        self.content_length.map_or(false, |len| len > 0)
    }

    /// Chunked bodies cannot be buffered by length
    pub fn is_chunked(&self) -> bool {
        self.get_header("transfer-encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false)
    }
}

/// Copy a chunked body from `reader` to `writer` with its framing intact.
///
/// Stops after the last chunk and its trailer section, so the rest of the
/// stream is left unread. Returns the number of payload bytes copied.
pub fn relay_chunked<R: BufRead, W: Write>(reader: &mut R, writer: &mut W) -> io::Result<u64> {
    let mut copied = 0u64;

    loop {
        let size_line = read_framing_line(reader)?;
        writer.write_all(size_line.as_bytes())?;

        let size_field = size_line.split(';').next().unwrap_or("").trim();
        let size = u64::from_str_radix(size_field, 16).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid chunk size: {:?}", size_field),
            )
        })?;
        if size == 0 {
            break;
        }

        // Chunk data plus its CRLF
        let expected = size.saturating_add(2);
        if io::copy(&mut (&mut *reader).take(expected), writer)? < expected {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        copied += size;
    }

    loop {
        let trailer = read_framing_line(reader)?;
        writer.write_all(trailer.as_bytes())?;
        if trailer == "\r\n" || trailer == "\n" {
            break;
        }
    }

    debug!(bytes = copied, "Relayed chunked body");
    Ok(copied)
}

fn read_framing_line<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(line)
}
