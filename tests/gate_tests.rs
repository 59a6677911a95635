//! End-to-end tests: client → gate → throw-away backend, over real sockets.

use device_gate::config::{ProxySettings, SubtypeEntry, ValidationSettings};
use device_gate::interceptor::Interceptor;
use device_gate::parsers::{relay_chunked, HttpRequest};
use device_gate::proxy::{self, ProxyContext};
use device_gate::validators::{RuleCatalog, StaticSubtypeResolver};
use std::io::{BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const RULES: &str = r#"{ "validations": [
    { "type": "Smartwatch", "preRequestName": "isEnabled", "preRequestValue": "true",
      "rules": [ { "paramName": "batteryLevel", "regex": "^[0-9]{1,3}$" } ] },
    { "type": "PC", "preRequestName": "isEnabled", "preRequestValue": "true",
      "rules": [ { "paramName": "grade", "regex": ["A", "B", "C"] } ] }
] }"#;

/// What the backend saw: request line target and raw body bytes
type Seen = (String, Vec<u8>);

fn spawn_backend() -> (String, Receiver<Seen>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let request = HttpRequest::parse(&mut reader).unwrap();
            let body = if request.is_chunked() {
                let mut body = Vec::new();
                relay_chunked(&mut reader, &mut body).unwrap();
                body
            } else {
                request.read_body(&mut reader, usize::MAX).unwrap().into_inner()
            };
            let mut writer = stream;
            writer
                .write_all(b"HTTP/1.1 201 Created\r\nContent-Length: 7\r\n\r\ncreated")
                .unwrap();
            let _ = tx.send((format!("{} {}", request.method, request.path), body));
        }
    });

    (addr, rx)
}

fn spawn_gate(backend_address: &str) -> String {
    let catalog = RuleCatalog::from_json_str(RULES).unwrap();
    let resolver = StaticSubtypeResolver::from_entries(&[
        SubtypeEntry { id: 1, name: "Smartwatch".into() },
        SubtypeEntry { id: 2, name: "PC".into() },
        SubtypeEntry { id: 3, name: "Unknown Gadget".into() },
    ]);
    let interceptor =
        Interceptor::from_settings(&ValidationSettings::default(), catalog, Arc::new(resolver));

    let settings = ProxySettings {
        listen_address: "127.0.0.1:0".into(),
        backend_address: backend_address.into(),
        timeout_seconds: 5,
        max_body_bytes: 64 * 1024,
    };
    let context = Arc::new(ProxyContext::new(&settings, interceptor));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    thread::spawn(move || proxy::serve(listener, context));
    addr
}

fn send(gate: &str, method: &str, path: &str, body: &str) -> String {
    send_raw(
        gate,
        &format!(
            "{} {} HTTP/1.1\r\nHost: test\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            method,
            path,
            body.len(),
            body
        ),
    )
}

fn send_raw(gate: &str, raw: &str) -> String {
    let mut stream = TcpStream::connect(gate).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(raw.as_bytes()).unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or("")
}

fn body_of(response: &str) -> &str {
    response.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
}

fn nothing_forwarded(rx: &Receiver<Seen>) -> bool {
    rx.recv_timeout(Duration::from_millis(300)).is_err()
}

#[test]
fn valid_request_reaches_backend_byte_identical() {
    let (backend, rx) = spawn_backend();
    let gate = spawn_gate(&backend);

    // Odd spacing and non-ASCII must survive untouched
    let body = "{ \"name\":  \"Montre connectée\", \"typeId\": 1,\n \"isEnabled\": true, \"additionalProperties\": {\"batteryLevel\": \"150\"} }";
    let response = send(&gate, "POST", "/api/devices", body);

    assert_eq!(status_line(&response), "HTTP/1.1 201 Created");
    assert_eq!(body_of(&response), "created");

    let (target, seen) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(target, "POST /api/devices");
    assert_eq!(seen, body.as_bytes());
}

#[test]
fn pattern_violation_is_rejected_before_backend() {
    let (backend, rx) = spawn_backend();
    let gate = spawn_gate(&backend);

    let response = send(
        &gate,
        "POST",
        "/api/devices",
        r#"{"typeId":1,"isEnabled":true,"additionalProperties":{"batteryLevel":"abc"}}"#,
    );

    assert_eq!(status_line(&response), "HTTP/1.1 400 Bad Request");
    assert_eq!(
        body_of(&response),
        "Invalid value for batteryLevel (regex: ^[0-9]{1,3}$)"
    );
    assert!(nothing_forwarded(&rx));
}

#[test]
fn missing_attribute_is_rejected() {
    let (backend, rx) = spawn_backend();
    let gate = spawn_gate(&backend);

    let response = send(
        &gate,
        "PUT",
        "/api/devices/5",
        r#"{"typeId":1,"isEnabled":true,"additionalProperties":{}}"#,
    );

    assert_eq!(status_line(&response), "HTTP/1.1 400 Bad Request");
    assert_eq!(body_of(&response), "Missing required additional property: batteryLevel");
    assert!(nothing_forwarded(&rx));
}

#[test]
fn disallowed_value_is_rejected() {
    let (backend, rx) = spawn_backend();
    let gate = spawn_gate(&backend);

    let response = send(
        &gate,
        "POST",
        "/api/devices",
        r#"{"typeId":2,"isEnabled":true,"additionalProperties":{"grade":"D"}}"#,
    );

    assert_eq!(body_of(&response), "Invalid value for grade. Allowed: A, B, C");
    assert!(nothing_forwarded(&rx));
}

#[test]
fn unresolved_and_unruled_subtypes_pass_through() {
    let (backend, rx) = spawn_backend();
    let gate = spawn_gate(&backend);

    for body in [
        r#"{"typeId":3,"isEnabled":true,"additionalProperties":{"whatever":[1,2]}}"#,
        r#"{"typeId":777,"isEnabled":true,"additionalProperties":{}}"#,
        r#"{"typeId":1,"isEnabled":false,"additionalProperties":{}}"#,
    ] {
        let response = send(&gate, "POST", "/api/devices", body);
        assert_eq!(status_line(&response), "HTTP/1.1 201 Created");

        let (_, seen) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(seen, body.as_bytes());
    }
}

#[test]
fn malformed_and_incomplete_payloads() {
    let (backend, rx) = spawn_backend();
    let gate = spawn_gate(&backend);

    let response = send(&gate, "POST", "/api/devices", "{ nope");
    assert_eq!(status_line(&response), "HTTP/1.1 400 Bad Request");
    assert_eq!(body_of(&response), "Invalid device data.");

    let response = send(&gate, "POST", "/api/devices", r#"{"typeId":1}"#);
    assert_eq!(
        body_of(&response),
        "Missing required fields (typeId, isEnabled, additionalProperties)."
    );

    assert!(nothing_forwarded(&rx));
}

#[test]
fn unguarded_requests_are_streamed_unvalidated() {
    let (backend, rx) = spawn_backend();
    let gate = spawn_gate(&backend);

    let response = send(&gate, "GET", "/api/devices", "");
    assert_eq!(status_line(&response), "HTTP/1.1 201 Created");
    let (target, seen) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(target, "GET /api/devices");
    assert!(seen.is_empty());

    // Not JSON, but not a guarded path either
    let response = send(&gate, "POST", "/api/employees", "plain text");
    assert_eq!(status_line(&response), "HTTP/1.1 201 Created");
    let (_, seen) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(seen, b"plain text");
}

#[test]
fn unreachable_backend_is_bad_gateway() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let gate = spawn_gate(&port);

    let response = send(
        &gate,
        "POST",
        "/api/devices",
        r#"{"typeId":1,"isEnabled":true,"additionalProperties":{"batteryLevel":"9"}}"#,
    );
    assert_eq!(status_line(&response), "HTTP/1.1 502 Bad Gateway");
}

const CHUNKED_BODY: &str = "5\r\nhello\r\n0\r\n\r\n";

#[test]
fn unguarded_chunked_request_is_relayed() {
    let (backend, rx) = spawn_backend();
    let gate = spawn_gate(&backend);

    let response = send_raw(
        &gate,
        &format!(
            "POST /api/employees HTTP/1.1\r\nHost: test\r\nTransfer-Encoding: chunked\r\n\r\n{}",
            CHUNKED_BODY
        ),
    );
    assert_eq!(status_line(&response), "HTTP/1.1 201 Created");

    let (target, seen) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(target, "POST /api/employees");
    assert_eq!(seen, CHUNKED_BODY.as_bytes());
}

#[test]
fn guarded_chunked_request_needs_length() {
    let (backend, rx) = spawn_backend();
    let gate = spawn_gate(&backend);

    let response = send_raw(
        &gate,
        &format!(
            "POST /api/devices HTTP/1.1\r\nHost: test\r\nTransfer-Encoding: chunked\r\n\r\n{}",
            CHUNKED_BODY
        ),
    );
    assert_eq!(status_line(&response), "HTTP/1.1 411 Length Required");
    assert!(nothing_forwarded(&rx));
}

#[test]
fn oversized_guarded_body_is_rejected() {
    let (backend, rx) = spawn_backend();
    let gate = spawn_gate(&backend);

    let body = format!(
        r#"{{"typeId":1,"isEnabled":true,"additionalProperties":{{"batteryLevel":"9","pad":"{}"}}}}"#,
        "x".repeat(70_000)
    );
    let response = send(&gate, "POST", "/api/devices", &body);

    assert_eq!(status_line(&response), "HTTP/1.1 413 Payload Too Large");
    assert_eq!(body_of(&response), "Payload too large.");
    assert!(nothing_forwarded(&rx));
}
