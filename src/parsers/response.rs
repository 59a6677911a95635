//! HTTP response parsing and relaying.
//!
//! This module provides the `HttpResponse` type which parses HTTP/1.1 response
//! headers from the backend while leaving the body in the stream, then copies
//! headers and body through to the client.

use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};

/// Represents a parsed HTTP response with headers and metadata.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub version: String,
    pub status_code: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub raw_headers: Vec<u8>,  // Original header bytes for forwarding
    pub content_length: Option<usize>,
}

impl HttpResponse {
    /// Parse HTTP response from a buffered reader
    /// Reads ONLY the headers, leaving the body in the stream for streaming
    pub fn parse<R: BufRead>(reader: &mut R) -> Result<Self, String> {
        let mut raw_headers = Vec::new();
        let mut lines = Vec::new();

        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => return Err("Connection closed while reading response headers".to_string()),
                Ok(_) => {
                    raw_headers.extend_from_slice(line.as_bytes());

                    if line == "\r\n" || line == "\n" {
                        break;
                    }

                    lines.push(line.trim_end().to_string());
                }
                Err(e) => return Err(format!("Error reading response headers: {}", e)),
            }
        }

        if lines.is_empty() {
            return Err("Empty response".to_string());
        }

        // Parse the status line: "HTTP/1.1 201 Created"
        let status_line_parts: Vec<&str> = lines[0].splitn(3, ' ').collect();
        if status_line_parts.len() < 2 {
            return Err("Invalid status line".to_string());
        }

        let version = status_line_parts[0].to_string();
        let status_code = status_line_parts[1].parse::<u16>()
            .map_err(|_| "Invalid status code")?;
        let status_text = status_line_parts.get(2).copied().unwrap_or("").to_string();

        let mut headers = HashMap::new();
        for line in &lines[1..] {
            if let Some(colon_pos) = line.find(':') {
                let key = line[..colon_pos].trim().to_string();
                let value = line[colon_pos + 1..].trim().to_string();
                headers.insert(key.to_lowercase(), value);
            }
        }

        let content_length = headers.get("content-length")
            .and_then(|v| v.parse::<usize>().ok());

        Ok(HttpResponse {
            version,
            status_code,
            status_text,
            headers,
            raw_headers,
            content_length,
        })
    }

    /// Check if response can carry a body
    pub fn has_body(&self) -> bool {
        // 1xx, 204, and 304 responses have no body
        if self.status_code < 200 || self.status_code == 204 || self.status_code == 304 {
            return false;
        }

        self.content_length.map_or(true, |len| len > 0)
    }

    /// Write headers and body to the client, returning body bytes copied.
    ///
    /// With a `Content-Length` exactly that many bytes are copied; without
    /// one the body runs until the backend closes the connection.
    pub fn relay<R: Read, W: Write>(&self, body: &mut R, client: &mut W) -> io::Result<u64> {
        client.write_all(&self.raw_headers)?;

        let copied = if !self.has_body() {
            0
        } else if let Some(len) = self.content_length {
            io::copy(&mut body.take(len as u64), client)?
        } else {
            io::copy(body, client)?
        };

        client.flush()?;
        Ok(copied)
    }
}

/// Build a complete plain-text response for errors generated by the gate
pub fn plain_response(status_code: u16, reason: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text(status_code),
        reason.len(),
        reason
    )
    .into_bytes()
}

/// Reason phrase for the status codes the gate produces itself
pub fn status_text(status_code: u16) -> &'static str {
    match status_code {
        400 => "Bad Request",
        411 => "Length Required",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Error",
    }
}
