//! WarpGrid HTTP client message types.
//!
//! Shared vocabulary of the client's receiving side: the outbound
//! [`Request`] descriptor, the [`ResponseHead`] delivered when the status
//! line and headers arrive, [`HeaderMap`] for headers and trailers, the
//! assembled [`Response`], and the failure cause [`Error`].
//!
//! Body chunks travel as `bytes::Bytes`. [`BodyBuffer`] joins them in
//! arrival order when a response is aggregated.

mod body;
mod error;
mod head;
mod header;
mod request;
mod response;

pub use body::BodyBuffer;
pub use error::{Error, Result};
pub use head::{ResponseHead, Version};
pub use header::{Header, HeaderMap};
pub use request::Request;
pub use response::Response;
