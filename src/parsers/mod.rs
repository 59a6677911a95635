//! HTTP parsing module for the device gate.
//!
//! This module provides HTTP/1.1 request and response parsers that read only
//! the headers, leaving the body in the stream. Guarded request bodies are
//! buffered for inspection; everything else streams straight through.

mod request;
mod response;

pub use request::{relay_chunked, BodyError, HttpRequest};
pub use response::{plain_response, status_text, HttpResponse};
