//! HTTP/1.1 request parsing using the [`httparse`] crate.

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

/// Errors that can occur while parsing an HTTP/1.1 request head.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request head is incomplete")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),
}

/// The body could not be read in full.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BodyError {
    #[error("body truncated: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },
}

/// A parsed HTTP/1.1 request.
///
/// The body never extends past the declared `Content-Length`, so pipelined
/// bytes belonging to the next request stay in the caller's buffer.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::request::Request;
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.target(), "/hello?name=world");
/// assert_eq!(request.query_param("name"), Some("world"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    // Path plus query, exactly as sent on the request line.
    target: String,
    // Minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: HashMap<String, String>,
    body: Bytes,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// Parses a request from `buf`, returning it with the offset at which its
    /// body starts.
    ///
    /// # Errors
    ///
    /// [`RequestError::Incomplete`] until the whole head has arrived, and
    /// [`RequestError::Parse`] for malformed input.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut slots = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut head = httparse::Request::new(&mut slots);
        let httparse::Status::Complete(body_offset) = head.parse(buf)? else {
            return Err(RequestError::Incomplete);
        };

        // A complete parse always fills method, path, and version.
        let method = match head.method.unwrap_or_default().parse::<Method>() {
            Ok(method) => method,
            Err(never) => match never {},
        };
        let target = head.path.unwrap_or("/").to_owned();
        let version = head.version.unwrap_or(1);

        let mut headers = Headers::with_capacity(head.headers.len());
        for field in head.headers.iter() {
            if let Ok(value) = std::str::from_utf8(field.value) {
                headers.insert(field.name, value);
            }
        }

        let mut request = Self {
            method,
            query: HashMap::new(),
            target,
            version,
            headers,
            body: Bytes::new(),
        };
        request.query = request.query_string().map(parse_query).unwrap_or_default();

        let received = &buf[body_offset..];
        let take = request
            .content_length()
            .map_or(received.len(), |declared| declared.min(received.len()));
        request.body = Bytes::copy_from_slice(&received[..take]);

        Ok((request, body_offset))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path plus query string, as sent.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The target without its query string.
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(path, _)| path)
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn query_string(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the complete body without consuming it.
    ///
    /// The returned [`Bytes`] shares the request's buffer, so the handler still
    /// sees the same bytes afterwards.
    ///
    /// # Errors
    ///
    /// [`BodyError::Truncated`] when fewer bytes arrived than `Content-Length`
    /// declared.
    pub fn read_body(&self) -> Result<Bytes, BodyError> {
        match self.content_length() {
            Some(expected) if self.body.len() < expected => Err(BodyError::Truncated {
                expected,
                received: self.body.len(),
            }),
            _ => Ok(self.body.clone()),
        }
    }

    /// HTTP/1.1 keeps the connection open unless told otherwise; HTTP/1.0 closes
    /// it unless asked to keep it.
    pub fn is_keep_alive(&self) -> bool {
        self.headers
            .get("connection")
            .map_or(self.version == 1, |value| value.eq_ignore_ascii_case("keep-alive"))
    }

    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }
}

// `a=1&b=two+words`; `+` becomes a space, no percent-decoding.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.replace('+', " "), value.replace('+', " "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &[u8]) -> Request {
        Request::parse(raw).unwrap().0
    }

    #[test]
    fn splits_target_into_path_and_query() {
        let req = parse(b"GET /search?q=rust+lang&page=2&flag HTTP/1.1\r\nHost: example.com\r\n\r\n");
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.target(), "/search?q=rust+lang&page=2&flag");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query_string(), Some("q=rust+lang&page=2&flag"));
        assert_eq!(req.query_param("q"), Some("rust lang"));
        assert_eq!(req.query_param("flag"), Some(""));
        assert_eq!(req.headers().get("host"), Some("example.com"));
    }

    #[test]
    fn bare_path_has_no_query() {
        let raw = b"GET / HTTP/1.1\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/");
        assert_eq!(req.query_string(), None);
        assert_eq!(offset, raw.len());
    }

    #[test]
    fn partial_head_is_incomplete() {
        assert!(matches!(
            Request::parse(b"GET / HTTP/1.1\r\nHost:"),
            Err(RequestError::Incomplete)
        ));
        assert!(matches!(Request::parse(b"\x01\x02 / HTTP/1.1\r\n\r\n"), Err(RequestError::Parse(_))));
    }

    #[test]
    fn keep_alive_follows_version_and_header() {
        assert!(parse(b"GET / HTTP/1.1\r\n\r\n").is_keep_alive());
        assert!(!parse(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").is_keep_alive());
        assert!(!parse(b"GET / HTTP/1.0\r\n\r\n").is_keep_alive());
        assert!(parse(b"GET / HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\n").is_keep_alive());
    }

    #[test]
    fn body_stops_at_content_length() {
        let req = parse(b"POST /a HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET /b HTTP/1.1\r\n\r\n");
        assert_eq!(req.content_length(), Some(3));
        assert_eq!(req.body().as_ref(), b"abc");
    }

    #[test]
    fn read_body_leaves_body_in_place() {
        let req = parse(b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nping");
        assert_eq!(req.read_body().unwrap().as_ref(), b"ping");
        assert_eq!(req.read_body().unwrap().as_ref(), b"ping");
        assert_eq!(req.body().as_ref(), b"ping");
    }

    #[test]
    fn read_body_reports_truncation() {
        let req = parse(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort");
        assert_eq!(
            req.read_body(),
            Err(BodyError::Truncated {
                expected: 10,
                received: 5
            })
        );
    }
}
