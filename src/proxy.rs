//! Thread-per-connection HTTP/1.1 proxy with the validation gate in front.
//!
//! Each accepted connection carries a single request. Guarded requests have
//! their body buffered and run through the [`Interceptor`]; everything else is
//! streamed to the backend as-is. Responses are relayed back unchanged.

use crate::config::ProxySettings;
use crate::interceptor::Interceptor;
use crate::parsers::{plain_response, relay_chunked, BodyError, HttpRequest, HttpResponse};
use crate::validators::GateDecision;
use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Most body bytes discarded after an early rejection
const UNREAD_DRAIN_LIMIT: u64 = 1024 * 1024;

/// Everything a connection handler needs, shared across threads
#[derive(Debug)]
pub struct ProxyContext {
    pub backend_address: String,
    pub timeout: Duration,
    pub max_body_bytes: usize,
    pub interceptor: Interceptor,
}

impl ProxyContext {
    pub fn new(settings: &ProxySettings, interceptor: Interceptor) -> Self {
        Self {
            backend_address: settings.backend_address.clone(),
            timeout: Duration::from_secs(settings.timeout_seconds),
            max_body_bytes: settings.max_body_bytes,
            interceptor,
        }
    }
}

/// Bind `listen_address` and serve forever
pub fn run(listen_address: &str, context: ProxyContext) -> io::Result<()> {
    let listener = TcpListener::bind(listen_address)?;
    info!(
        "🛡️  Device gate active on http://{} → {}",
        listen_address, context.backend_address
    );
    let route = context.interceptor.route();
    info!("   Guarding {} {}", route.methods().join("/"), route.prefix());
    serve(listener, Arc::new(context))
}

/// Accept connections on an already-bound listener
pub fn serve(listener: TcpListener, context: Arc<ProxyContext>) -> io::Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let context = Arc::clone(&context);
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &context) {
                        warn!("⚠️  Error handling connection: {}", e);
                    }
                });
            }
            Err(e) => {
                warn!("⚠️  Failed to accept connection: {}", e);
            }
        }
    }

    Ok(())
}

fn handle_connection(client_stream: TcpStream, context: &ProxyContext) -> io::Result<()> {
    let peer_addr = client_stream.peer_addr()?;
    debug!("✨ New connection from: {}", peer_addr);

    client_stream.set_read_timeout(Some(context.timeout))?;
    client_stream.set_write_timeout(Some(context.timeout))?;

    let mut client_reader = BufReader::new(client_stream.try_clone()?);
    let mut client_writer = client_stream;

    let request = match HttpRequest::parse(&mut client_reader) {
        Ok(req) => {
            info!("📥 {} {} from {}", req.method, req.path, peer_addr);
            req
        }
        Err(e) => {
            warn!("⚠️  Failed to parse request: {}", e);
            return client_writer.write_all(&plain_response(400, "Bad Request"));
        }
    };

    if !context.interceptor.applies_to(&request.method, &request.path) {
        return if request.is_chunked() {
            forward_to_backend(&request, &mut client_writer, context, |backend| {
                relay_chunked(&mut client_reader, backend)
            })
        } else {
            let length = request.content_length.unwrap_or(0) as u64;
            forward_to_backend(&request, &mut client_writer, context, |backend| {
                io::copy(&mut (&mut client_reader).take(length), backend)
            })
        };
    }

    if request.is_chunked() {
        warn!("🚫 Chunked request body not supported: {} {}", request.method, request.path);
        return reject_unread(&mut client_reader, client_writer, 411, "Length Required");
    }

    let mut body = match request.read_body(&mut client_reader, context.max_body_bytes) {
        Ok(body) => body,
        Err(BodyError::TooLarge { size, limit }) => {
            warn!("🚫 Request body too large: {} > {} bytes", size, limit);
            return reject_unread(&mut client_reader, client_writer, 413, "Payload too large.");
        }
        Err(BodyError::Io(e)) => {
            warn!("⚠️  Failed to read request body: {}", e);
            return client_writer.write_all(&plain_response(400, "Bad Request"));
        }
    };

    match context.interceptor.intercept(&request.method, &request.path, &mut body) {
        GateDecision::Forward(reason) => {
            debug!("✅ Request allowed ({})", reason);
            forward_to_backend(&request, &mut client_writer, context, |backend| {
                io::copy(&mut body, backend)
            })
        }
        GateDecision::Reject { status_code, reason } => {
            info!("🚫 Request rejected ({}): {}", status_code, reason);
            client_writer.write_all(&plain_response(status_code, &reason))?;
            client_writer.flush()
        }
    }
}

/// Answer a request whose body was never read.
///
/// The write side is shut down first and a bounded amount of the pending body
/// is discarded, so closing the socket does not reset the connection before
/// the client has read the response.
fn reject_unread<R: Read>(
    client_reader: &mut R,
    mut client_writer: TcpStream,
    status_code: u16,
    reason: &str,
) -> io::Result<()> {
    client_writer.write_all(&plain_response(status_code, reason))?;
    client_writer.flush()?;
    client_writer.shutdown(Shutdown::Write)?;

    if let Err(e) = io::copy(&mut client_reader.take(UNREAD_DRAIN_LIMIT), &mut io::sink()) {
        debug!("Stopped draining rejected request body: {}", e);
    }
    Ok(())
}

fn forward_to_backend<F>(
    request: &HttpRequest,
    client_writer: &mut TcpStream,
    context: &ProxyContext,
    send_body: F,
) -> io::Result<()>
where
    F: FnOnce(&mut TcpStream) -> io::Result<u64>,
{
    debug!("🔗 Connecting to backend at {}", context.backend_address);

    let backend_stream = match TcpStream::connect(&context.backend_address) {
        Ok(stream) => stream,
        Err(e) => {
            error!("❌ Failed to connect to backend: {}", e);
            return client_writer.write_all(&plain_response(502, "Bad Gateway"));
        }
    };

    backend_stream.set_read_timeout(Some(context.timeout))?;
    backend_stream.set_write_timeout(Some(context.timeout))?;

    let mut backend_writer = backend_stream.try_clone()?;
    let mut backend_reader = BufReader::new(backend_stream);

    backend_writer.write_all(&request.head_for_backend())?;
    let sent = send_body(&mut backend_writer)?;
    backend_writer.flush()?;
    debug!("➡️  Forwarded {} {} ({} body bytes)", request.method, request.path, sent);

    let response = match HttpResponse::parse(&mut backend_reader) {
        Ok(resp) => resp,
        Err(e) => {
            error!("❌ Failed to parse backend response: {}", e);
            return client_writer.write_all(&plain_response(502, "Bad Gateway"));
        }
    };

    let copied = response.relay(&mut backend_reader, client_writer)?;
    info!(
        "📤 {} {} → {} {} ({} bytes)",
        request.method, request.path, response.status_code, response.status_text, copied
    );

    Ok(())
}
