//! Minimal HTTP/1.1 request parsing and response writing.
//!
//! Covers exactly what the service needs: request line, headers, a
//! `Content-Length` body, and `Connection: close` responses.

use percent_encoding::percent_decode;
use std::collections::HashMap;
use std::fmt;

/// Upper bound on request head + body size.
pub const MAX_REQUEST_BYTES: usize = 1 << 20;

/// A parsed HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Outcome of trying to parse a buffered request.
#[derive(Debug, PartialEq)]
pub enum ParseStatus {
    Complete(HttpRequest),
    /// More bytes are needed.
    Partial,
    Invalid(&'static str),
    /// The declared body would push the request past [`MAX_REQUEST_BYTES`].
    TooLarge,
}

impl HttpRequest {
    /// Parse a request from the bytes received so far.
    pub fn parse(raw: &[u8]) -> ParseStatus {
        let Some(head_end) = find_subslice(raw, b"\r\n\r\n") else {
            return ParseStatus::Partial;
        };
        let Ok(head) = std::str::from_utf8(&raw[..head_end]) else {
            return ParseStatus::Invalid("request head is not UTF-8");
        };

        let mut lines = head.split("\r\n");

        // "GET /path?query HTTP/1.1"
        let Some(request_line) = lines.next() else {
            return ParseStatus::Invalid("missing request line");
        };
        let mut parts = request_line.splitn(3, ' ');
        let (Some(method), Some(target), Some(_version)) = (parts.next(), parts.next(), parts.next())
        else {
            return ParseStatus::Invalid("malformed request line");
        };

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((key, value)) = line.split_once(':') {
                headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let content_length = match headers.get("content-length") {
            Some(value) => match value.parse::<usize>() {
                Ok(length) => length,
                Err(_) => return ParseStatus::Invalid("invalid Content-Length"),
            },
            None => 0,
        };

        let body_start = head_end + 4;
        let body_end = match body_start.checked_add(content_length) {
            Some(end) if end <= MAX_REQUEST_BYTES => end,
            _ => return ParseStatus::TooLarge,
        };
        if raw.len() < body_end {
            return ParseStatus::Partial;
        }

        ParseStatus::Complete(HttpRequest {
            method: method.to_ascii_uppercase(),
            path,
            query,
            headers,
            body: raw[body_start..body_end].to_vec(),
        })
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Look up a form value by key, first in the query string, then in a
    /// url-encoded body.
    pub fn form_value(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(value) = self.query.as_deref().and_then(|q| form_lookup(q.as_bytes(), key)) {
            return Some(value);
        }
        let is_form = self
            .headers
            .get("content-type")
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        if is_form {
            form_lookup(&self.body, key)
        } else {
            None
        }
    }
}

/// Decode a url-encoded component, treating `+` as a space.
pub fn decode_component(raw: &[u8]) -> Vec<u8> {
    let spaced: Vec<u8> = raw
        .iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();
    percent_decode(&spaced).collect()
}

fn form_lookup(encoded: &[u8], key: &str) -> Option<Vec<u8>> {
    encoded
        .split(|&b| b == b'&')
        .filter_map(|pair| {
            let mut kv = pair.splitn(2, |&b| b == b'=');
            Some((kv.next()?, kv.next().unwrap_or_default()))
        })
        .find(|(k, _)| decode_component(k) == key.as_bytes())
        .map(|(_, v)| decode_component(v))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// HTTP status codes the service emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok = 200,
    BadRequest = 400,
    NotFound = 404,
    PayloadTooLarge = 413,
    InternalServerError = 500,
}

impl StatusCode {
    pub fn reason_phrase(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", *self as u16, self.reason_phrase())
    }
}

/// A response ready to be written to the socket.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "text/plain; charset=utf-8".into())],
            body: body.into(),
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Ok,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::text(StatusCode::NotFound, "404 Not Found")
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut resp = format!("HTTP/1.1 {}\r\n", self.status);
        resp.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        resp.push_str("Connection: close\r\n");
        for (k, v) in &self.headers {
            resp.push_str(&format!("{k}: {v}\r\n"));
        }
        resp.push_str("\r\n");
        resp.push_str(&self.body);
        resp.into_bytes()
    }
}
