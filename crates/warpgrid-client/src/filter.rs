//! Response filter contract.
//!
//! A [`ResponseFilter`] is an asynchronous post-processing stage that runs
//! after the response head arrives and before any body event reaches the
//! application. Filters of one response run one at a time, in configured
//! order.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use warpgrid_http::{Error, Request, ResponseHead};

use crate::context::FilterContext;

/// Boxed future returned by a filter invocation.
pub type FilterFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'static>>;

/// An asynchronous response post-processor.
///
/// `filter` returning `Err` means the stage failed before producing a
/// future; the returned future resolving to `Err` means it failed later.
/// The head is shared read-only: it has already been delivered to the
/// application when filters run.
pub trait ResponseFilter: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn filter(
        &self,
        request: Arc<Request>,
        head: Arc<ResponseHead>,
        ctx: FilterContext,
    ) -> Result<FilterFuture, Error>;
}

impl<F> ResponseFilter for F
where
    F: Fn(Arc<Request>, Arc<ResponseHead>, FilterContext) -> Result<FilterFuture, Error>
        + Send
        + Sync,
{
    fn filter(
        &self,
        request: Arc<Request>,
        head: Arc<ResponseHead>,
        ctx: FilterContext,
    ) -> Result<FilterFuture, Error> {
        self(request, head, ctx)
    }
}

/// Wrap an async block as a [`FilterFuture`].
pub fn boxed<Fut>(fut: Fut) -> Result<FilterFuture, Error>
where
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    Ok(Box::pin(fut))
}
