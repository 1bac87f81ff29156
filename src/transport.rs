// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Transport Boundary
 * Request/response primitives consumed by the probe engine
 *
 * The engine never follows redirects itself and never talks to sockets
 * directly: everything goes through the `Transport` trait.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::errors::TransportError;

/// HTTP protocol version of a probe request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

/// A single probe request. Every request carries its own id, which alerts
/// reference as their source message.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub id: Uuid,
    pub method: String,
    pub url: Url,
    pub version: HttpVersion,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ProbeRequest {
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.to_uppercase(),
            url,
            version: HttpVersion::Http11,
            headers: Vec::new(),
            cookies: Vec::new(),
            body: None,
        }
    }

    /// GET request for a target URL, used as a scan's base message
    pub fn get(url: &str) -> Result<Self, TransportError> {
        let url = Url::parse(url).map_err(|_| TransportError::InvalidUrl {
            url: url.to_string(),
        })?;
        Ok(Self::new("GET", url))
    }

    /// Copy of this request with a new id and a different method
    pub fn derive(&self, method: &str) -> Self {
        let mut request = self.clone();
        request.id = Uuid::new_v4();
        request.method = method.to_uppercase();
        request.body = None;
        request
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    pub fn with_version(mut self, version: HttpVersion) -> Self {
        self.version = version;
        self
    }

    /// Set a header, replacing any existing value of the same name
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value for the `Cookie` header, if any cookies are set
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "https"
    }
}

/// Response to a probe. Header names are stored lower-cased and may repeat.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub duration_ms: u64,
}

impl HttpResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_lowercase(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.body.contains(pattern)
    }

    /// First value of a header
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header, in response order
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .filter(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Header section rendered as `Name: value` lines
    pub fn header_block(&self) -> String {
        self.headers
            .iter()
            .map(|(k, v)| format!("{}: {}\r\n", k, v))
            .collect()
    }

    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").map(|ct| ct.to_lowercase())
    }

    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.contains("json"))
            .unwrap_or(false)
    }

    pub fn is_xml(&self) -> bool {
        self.content_type()
            .map(|ct| ct.contains("xml"))
            .unwrap_or(false)
    }
}

/// Outcome of a CONNECT attempt through the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelResponse {
    pub status_code: u16,
    /// Raw response to the payload sent through the tunnel; only present
    /// when the CONNECT was answered with 200
    pub payload_response: Option<String>,
}

/// The request/response primitive the engine runs on
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request. Implementations must honour `follow_redirects`.
    async fn send(
        &self,
        request: &ProbeRequest,
        follow_redirects: bool,
    ) -> Result<HttpResponse, TransportError>;

    /// Ask the target to CONNECT to `host:port`; when it answers 200, write
    /// `payload` through the tunnel and read the reply. `Ok(None)` means no
    /// socket could be obtained.
    async fn open_tunnel(
        &self,
        _target: &Url,
        _host: &str,
        _port: u16,
        _payload: &str,
    ) -> Result<Option<TunnelResponse>, TransportError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_assigns_new_id() {
        let base = ProbeRequest::get("https://example.com/app").unwrap();
        let derived = base.derive("options");
        assert_ne!(base.id, derived.id);
        assert_eq!(derived.method, "OPTIONS");
        assert!(derived.is_secure());
    }

    #[test]
    fn test_header_replacement_and_cookies() {
        let request = ProbeRequest::get("http://example.com/")
            .unwrap()
            .with_header("Max-Forwards", "3")
            .with_header("max-forwards", "0")
            .with_cookie("a", "1")
            .with_cookie("b", "2");
        assert_eq!(request.header("MAX-FORWARDS"), Some("0"));
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.cookie_header().unwrap(), "a=1; b=2");
    }

    #[test]
    fn test_response_headers() {
        let response = HttpResponse::new(200)
            .with_header("X-Powered-By", "PHP")
            .with_header("X-Powered-By", "Express")
            .with_header("Content-Type", "application/problem+json");
        assert_eq!(response.header_values("x-powered-by"), vec!["PHP", "Express"]);
        assert!(response.is_json());
        assert!(!response.is_xml());
        assert!(response.header_block().contains("x-powered-by: PHP\r\n"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ProbeRequest::get("not a url"),
            Err(TransportError::InvalidUrl { .. })
        ));
    }
}
