use bytes::Bytes;

use crate::head::{ResponseHead, Version};
use crate::header::HeaderMap;

/// A fully received HTTP response: the value a successful response
/// outcome resolves to.
///
/// The body is whatever the pipeline aggregated; when aggregation is
/// disabled the application consumed the chunks through its data hook
/// and the body here is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    head: ResponseHead,
    body: Bytes,
    trailers: HeaderMap,
}

impl Response {
    pub fn new(head: ResponseHead, body: impl Into<Bytes>, trailers: HeaderMap) -> Self {
        Self {
            head,
            body: body.into(),
            trailers,
        }
    }

    pub fn status(&self) -> u16 {
        self.head.status
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn trailers(&self) -> &HeaderMap {
        &self.trailers
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}
