//! HTTP/1.1 protocol types and parsing.
//!
//! This module provides the core HTTP primitives:
//! [`Method`], [`StatusCode`], [`Headers`], [`Request`], [`Response`], and the
//! [`ResponseWriter`] capability that handlers write through.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

pub mod headers;
pub mod request;
pub mod response;
pub mod writer;

pub use headers::Headers;
pub use request::{BodyError, Request};
pub use response::Response;
pub use writer::{ResponseBuffer, ResponseWriter, WriteError};

// Declares `StatusCode` together with its numeric lookup and reason phrases so
// the three can never drift apart.
macro_rules! status_codes {
    ($($variant:ident = $code:literal, $reason:literal;)+) => {
        /// An HTTP response status code.
        ///
        /// Only the codes this crate produces or replays are modelled; a cached
        /// snapshot with any other code fails to decode and is treated as a miss.
        ///
        /// # Examples
        ///
        /// ```
        /// use rttp_cache::http::StatusCode;
        ///
        /// assert_eq!(StatusCode::Ok.as_u16(), 200);
        /// assert_eq!(StatusCode::NotFound.to_string(), "404 Not Found");
        /// ```
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum StatusCode {
            $($variant = $code,)+
        }

        impl StatusCode {
            /// Looks up the variant for a numeric code.
            ///
            /// ```
            /// use rttp_cache::http::StatusCode;
            ///
            /// assert_eq!(StatusCode::from_u16(404), Some(StatusCode::NotFound));
            /// assert_eq!(StatusCode::from_u16(299), None);
            /// ```
            pub fn from_u16(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Reason phrase written on the status line.
            pub fn canonical_reason(self) -> &'static str {
                match self {
                    $(Self::$variant => $reason,)+
                }
            }
        }
    };
}

status_codes! {
    Ok = 200, "OK";
    Created = 201, "Created";
    Accepted = 202, "Accepted";
    NoContent = 204, "No Content";
    NotModified = 304, "Not Modified";
    BadRequest = 400, "Bad Request";
    Forbidden = 403, "Forbidden";
    NotFound = 404, "Not Found";
    PayloadTooLarge = 413, "Payload Too Large";
    InternalServerError = 500, "Internal Server Error";
    ServiceUnavailable = 503, "Service Unavailable";
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

// Snapshots store the status as a bare integer.
impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.as_u16())
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u16::deserialize(deserializer)?;
        Self::from_u16(code).ok_or_else(|| de::Error::custom(format!("unsupported status code {code}")))
    }
}

/// An HTTP request method. Anything outside the common verbs is kept verbatim
/// in [`Method::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Custom(String),
}

impl Method {
    const KNOWN: [(&'static str, Method); 7] = [
        ("GET", Method::Get),
        ("HEAD", Method::Head),
        ("POST", Method::Post),
        ("PUT", Method::Put),
        ("PATCH", Method::Patch),
        ("DELETE", Method::Delete),
        ("OPTIONS", Method::Options),
    ];

    pub fn as_str(&self) -> &str {
        if let Self::Custom(token) = self {
            return token;
        }
        Self::KNOWN
            .iter()
            .find(|(_, method)| method == self)
            .map_or("", |(token, _)| token)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    /// Method tokens are case-sensitive; `get` is a custom method.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let known = Self::KNOWN.iter().find(|(name, _)| *name == token);
        Ok(known.map_or_else(|| Self::Custom(token.to_owned()), |(_, method)| method.clone()))
    }
}
