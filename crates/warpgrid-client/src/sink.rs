//! Terminal sink: the end of the response pipeline.
//!
//! [`TerminalSink`] turns transport events into application hook calls
//! and owns the response's [`Completion`]. It is the only component that
//! completes a response: `on_end` succeeds it, every failure funnels
//! through `on_error`, and whichever gets there first wins. Once the
//! completion is taken, every later event is dropped.
//!
//! # Concurrency
//!
//! All per-response state sits behind one `std::sync::Mutex`. The
//! transport's own calls for a response are sequential, but with filters
//! configured the filter driver task forwards events while the transport
//! may still report an error directly, so the lock keeps a single writer
//! at a time. Hooks run while the lock is held, so they must not call
//! back into the same response.
//!
//! A hook that panics is treated like one that returned `Err`: the panic
//! stays inside the sink and the response fails with `Error::Panicked`.
//! A panicking error hook is ignored like any other error hook failure.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::{debug, trace, warn};
use warpgrid_http::{BodyBuffer, Error, HeaderMap, Request, Response, ResponseHead};

use crate::config::PipelineConfig;
use crate::hooks::{HookResult, Hooks};
use crate::outcome::Completion;

/// The set of events a transport pushes for one in-flight response.
///
/// Expected order: at most one head, any number of data chunks, at most
/// one trailers, then exactly one of end or error. Implementations
/// silently ignore anything that arrives after the terminal call.
pub trait ResponseSink: Send + Sync {
    fn on_head(&self, head: ResponseHead);

    fn on_data(&self, chunk: Bytes);

    fn on_trailers(&self, trailers: HeaderMap);

    fn on_end(&self);

    fn on_error(&self, cause: Error);
}

impl<S: ResponseSink + ?Sized> ResponseSink for Arc<S> {
    fn on_head(&self, head: ResponseHead) {
        (**self).on_head(head)
    }

    fn on_data(&self, chunk: Bytes) {
        (**self).on_data(chunk)
    }

    fn on_trailers(&self, trailers: HeaderMap) {
        (**self).on_trailers(trailers)
    }

    fn on_end(&self) {
        (**self).on_end()
    }

    fn on_error(&self, cause: Error) {
        (**self).on_error(cause)
    }
}

/// Forwards events to application [`Hooks`] and completes the response
/// exactly once.
#[derive(Debug)]
pub struct TerminalSink {
    request: Arc<Request>,
    state: Mutex<SinkState>,
}

#[derive(Debug)]
struct SinkState {
    hooks: Hooks,
    /// `None` once the response is completed.
    completion: Option<Completion>,
    head: Option<ResponseHead>,
    body: Option<BodyBuffer>,
    trailers: HeaderMap,
}

impl TerminalSink {
    pub fn new(
        request: Arc<Request>,
        hooks: Hooks,
        completion: Completion,
        config: &PipelineConfig,
    ) -> Self {
        let body = config
            .aggregate_body
            .then(|| BodyBuffer::new(config.max_body_bytes));
        Self {
            request,
            state: Mutex::new(SinkState {
                hooks,
                completion: Some(completion),
                head: None,
                body,
                trailers: HeaderMap::new(),
            }),
        }
    }

    /// Whether the response outcome has been assigned.
    pub fn is_completed(&self) -> bool {
        self.lock().completion.is_none()
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        // A panicking hook must not wedge the response: the completion is
        // still in place and a later `on_error` can assign it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a non-terminal hook, failing the response if it returns `Err`.
    fn deliver(
        &self,
        event: &'static str,
        hook: impl FnOnce(&mut SinkState) -> HookResult,
    ) {
        let mut state = self.lock();
        if state.completion.is_none() {
            trace!(event, uri = %self.request.uri(), "dropping event for completed response");
            return;
        }
        if let Err(cause) = hook(&mut *state) {
            debug!(event, uri = %self.request.uri(), error = %cause, "response hook failed");
            self.fail(&mut *state, cause);
        }
    }

    fn fail(&self, state: &mut SinkState, cause: Error) {
        let Some(completion) = state.completion.take() else {
            trace!(uri = %self.request.uri(), error = %cause, "dropping error for completed response");
            return;
        };
        if let Err(hook_err) = state.hooks.error(&cause) {
            warn!(
                uri = %self.request.uri(),
                error = %cause,
                hook_error = %hook_err,
                "error hook failed; ignoring"
            );
        }
        debug!(
            method = %self.request.method(),
            uri = %self.request.uri(),
            error = %cause,
            "response failed"
        );
        completion.fail(cause);
    }
}

impl ResponseSink for TerminalSink {
    fn on_head(&self, head: ResponseHead) {
        self.deliver("head", |state| {
            state.hooks.start(&head)?;
            state.head = Some(head);
            Ok(())
        });
    }

    fn on_data(&self, chunk: Bytes) {
        self.deliver("data", |state| {
            if let Some(body) = &state.body {
                body.check(&chunk)?;
            }
            state.hooks.data(&chunk)?;
            match &mut state.body {
                Some(body) => body.push(&chunk),
                None => Ok(()),
            }
        });
    }

    fn on_trailers(&self, trailers: HeaderMap) {
        self.deliver("trailers", |state| {
            state.hooks.trailer(&trailers)?;
            state.trailers = trailers;
            Ok(())
        });
    }

    fn on_end(&self) {
        let mut state = self.lock();
        if state.completion.is_none() {
            trace!(uri = %self.request.uri(), "dropping end for completed response");
            return;
        }
        if let Err(cause) = state.hooks.end() {
            debug!(uri = %self.request.uri(), error = %cause, "end hook failed");
            self.fail(&mut *state, cause);
            return;
        }

        let head = state.head.take().unwrap_or_default();
        let body = state.body.as_mut().map(BodyBuffer::take).unwrap_or_default();
        let trailers = std::mem::take(&mut state.trailers);
        let status = head.status;
        if let Some(completion) = state.completion.take() {
            debug!(
                method = %self.request.method(),
                uri = %self.request.uri(),
                status,
                body_len = body.len(),
                "response completed"
            );
            completion.succeed(Response::new(head, body, trailers));
        }
    }

    fn on_error(&self, cause: Error) {
        let mut state = self.lock();
        self.fail(&mut *state, cause);
    }
}
