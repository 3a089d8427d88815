//! Single-assignment response outcome.
//!
//! [`channel`] splits an outcome into a [`Completion`], owned by the
//! terminal sink, and a [`ResponseFuture`], handed to the request
//! initiator. Assigning the outcome consumes the `Completion`, so a
//! response can be completed at most once by construction.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::trace;
use warpgrid_http::{Error, Response};

/// Observable state of a response outcome.
#[derive(Debug, Clone)]
pub enum Outcome {
    Pending,
    Succeeded(Response),
    Failed(Error),
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }
}

/// Create a linked completion / future pair for one response.
pub fn channel() -> (Completion, ResponseFuture) {
    let (tx, rx) = oneshot::channel();
    (Completion { tx }, ResponseFuture { rx })
}

/// Producer half of a response outcome. Consumed by the first assignment.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<Result<Response, Error>>,
}

impl Completion {
    pub fn succeed(self, response: Response) {
        self.complete(Ok(response));
    }

    pub fn fail(self, cause: Error) {
        self.complete(Err(cause));
    }

    fn complete(self, result: Result<Response, Error>) {
        if self.tx.send(result).is_err() {
            trace!("response outcome assigned after the future was dropped");
        }
    }
}

/// Resolves once to the assembled [`Response`] or the failure cause.
///
/// Yields [`Error::Dropped`] if the pipeline was torn down without
/// completing the response.
#[derive(Debug)]
pub struct ResponseFuture {
    rx: oneshot::Receiver<Result<Response, Error>>,
}

impl ResponseFuture {
    /// Check the outcome without waiting.
    ///
    /// Once this has returned a terminal [`Outcome`], the value has been
    /// moved out and the future must not be polled or checked again.
    pub fn try_outcome(&mut self) -> Outcome {
        match self.rx.try_recv() {
            Ok(Ok(response)) => Outcome::Succeeded(response),
            Ok(Err(cause)) => Outcome::Failed(cause),
            Err(oneshot::error::TryRecvError::Empty) => Outcome::Pending,
            Err(oneshot::error::TryRecvError::Closed) => Outcome::Failed(Error::Dropped),
        }
    }
}

impl Future for ResponseFuture {
    type Output = Result<Response, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::Dropped)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpgrid_http::{HeaderMap, ResponseHead};

    fn ok_response() -> Response {
        Response::new(ResponseHead::default(), "", HeaderMap::new())
    }

    #[test]
    fn pending_until_assigned() {
        let (completion, mut future) = channel();
        assert!(!future.try_outcome().is_done());

        completion.succeed(ok_response());
        assert!(matches!(future.try_outcome(), Outcome::Succeeded(_)));
    }

    #[test]
    fn failure_carries_cause() {
        let (completion, mut future) = channel();
        completion.fail(Error::other("boom"));

        match future.try_outcome() {
            Outcome::Failed(Error::Other(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn dropped_completion_fails_with_dropped() {
        let (completion, mut future) = channel();
        drop(completion);
        assert!(matches!(future.try_outcome(), Outcome::Failed(Error::Dropped)));
    }

    #[test]
    fn completing_after_future_dropped_is_harmless() {
        let (completion, future) = channel();
        drop(future);
        completion.fail(Error::other("nobody listening"));
    }

    #[tokio::test]
    async fn future_resolves_to_response() {
        let (completion, future) = channel();
        tokio::spawn(async move { completion.succeed(ok_response()) });

        let response = future.await.unwrap();
        assert_eq!(response.status(), 0);
    }
}
