use bytes::Bytes;

use crate::header::HeaderMap;

/// An outbound HTTP request as seen by the response pipeline.
///
/// The pipeline only reads it: filters receive it as `Arc<Request>` so
/// that every stage of one response observes the same descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    /// Create a request with a buffered body.
    pub fn new(
        method: impl Into<String>,
        uri: impl Into<String>,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers,
            body: body.into(),
        }
    }

    /// Create a request with an empty body.
    pub fn empty(method: impl Into<String>, uri: impl Into<String>, headers: HeaderMap) -> Self {
        Self::new(method, uri, headers, Bytes::new())
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::empty("GET", uri, HeaderMap::new())
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
