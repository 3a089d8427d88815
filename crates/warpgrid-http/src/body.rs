//! Response body aggregation.
//!
//! Provides [`BodyBuffer`], which collects body chunks in arrival order
//! into one contiguous buffer, optionally bounded by a byte limit.

use bytes::{Bytes, BytesMut};

use crate::Error;

/// Accumulates response body chunks, enforcing an optional size limit.
///
/// A chunk that would push the total past the limit is rejected whole;
/// the buffer keeps what it had before the call.
#[derive(Debug, Default)]
pub struct BodyBuffer {
    buf: BytesMut,
    limit: Option<usize>,
}

impl BodyBuffer {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
        }
    }

    /// Check whether `chunk` fits without appending it.
    pub fn check(&self, chunk: &Bytes) -> Result<(), Error> {
        match self.limit {
            Some(limit) if self.buf.len() + chunk.len() > limit => {
                Err(Error::BodyTooLarge { limit })
            }
            _ => Ok(()),
        }
    }

    pub fn push(&mut self, chunk: &Bytes) -> Result<(), Error> {
        self.check(chunk)?;
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the collected body, leaving the buffer empty.
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}
