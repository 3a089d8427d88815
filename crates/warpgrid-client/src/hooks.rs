//! Application hook bundle.
//!
//! [`Hooks`] holds the callbacks the terminal sink drives for one
//! response. Every hook is optional; a missing hook behaves like one that
//! returns `Ok(())`. Returning `Err` from a start, data, trailer or end
//! hook fails the response with that error as the cause; a hook that
//! panics fails it with [`Error::Panicked`].

use std::any::Any;
use std::panic::AssertUnwindSafe;

use bytes::Bytes;
use warpgrid_http::{Error, HeaderMap, ResponseHead};

/// Result returned by application hooks.
pub type HookResult = Result<(), Error>;

type StartHook = Box<dyn FnMut(&ResponseHead) -> HookResult + Send>;
type DataHook = Box<dyn FnMut(&Bytes) -> HookResult + Send>;
type TrailerHook = Box<dyn FnMut(&HeaderMap) -> HookResult + Send>;
type EndHook = Box<dyn FnMut() -> HookResult + Send>;
type ErrorHook = Box<dyn FnMut(&Error) -> HookResult + Send>;

/// Callbacks invoked as response events reach the terminal sink.
///
/// Start, trailer, end and error hooks run at most once per response;
/// the data hook runs once per body chunk, in transport order.
///
/// Hooks run while the response's state lock is held. A hook must not
/// call back into the handle of its own response (for example `on_error`
/// from a data hook): the lock is not reentrant and the call deadlocks.
/// Return `Err` from the hook instead.
#[derive(Default)]
pub struct Hooks {
    start: Option<StartHook>,
    data: Option<DataHook>,
    trailer: Option<TrailerHook>,
    end: Option<EndHook>,
    error: Option<ErrorHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, hook: impl FnMut(&ResponseHead) -> HookResult + Send + 'static) -> Self {
        self.start = Some(Box::new(hook));
        self
    }

    pub fn on_data(mut self, hook: impl FnMut(&Bytes) -> HookResult + Send + 'static) -> Self {
        self.data = Some(Box::new(hook));
        self
    }

    pub fn on_trailer(mut self, hook: impl FnMut(&HeaderMap) -> HookResult + Send + 'static) -> Self {
        self.trailer = Some(Box::new(hook));
        self
    }

    pub fn on_end(mut self, hook: impl FnMut() -> HookResult + Send + 'static) -> Self {
        self.end = Some(Box::new(hook));
        self
    }

    /// The error hook. An `Err` it returns is logged and otherwise ignored.
    pub fn on_error(mut self, hook: impl FnMut(&Error) -> HookResult + Send + 'static) -> Self {
        self.error = Some(Box::new(hook));
        self
    }

    pub(crate) fn start(&mut self, head: &ResponseHead) -> HookResult {
        match self.start.as_mut() {
            Some(hook) => contain(|| hook(head)),
            None => Ok(()),
        }
    }

    pub(crate) fn data(&mut self, chunk: &Bytes) -> HookResult {
        match self.data.as_mut() {
            Some(hook) => contain(|| hook(chunk)),
            None => Ok(()),
        }
    }

    pub(crate) fn trailer(&mut self, trailers: &HeaderMap) -> HookResult {
        match self.trailer.as_mut() {
            Some(hook) => contain(|| hook(trailers)),
            None => Ok(()),
        }
    }

    pub(crate) fn end(&mut self) -> HookResult {
        match self.end.as_mut() {
            Some(hook) => contain(|| hook()),
            None => Ok(()),
        }
    }

    pub(crate) fn error(&mut self, cause: &Error) -> HookResult {
        match self.error.as_mut() {
            Some(hook) => contain(|| hook(cause)),
            None => Ok(()),
        }
    }
}

/// Run application code, turning a panic into [`Error::Panicked`].
fn contain(call: impl FnOnce() -> HookResult) -> HookResult {
    std::panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|panic| Err(Error::Panicked(panic_message(panic.as_ref()))))
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("start", &self.start.is_some())
            .field("data", &self.data.is_some())
            .field("trailer", &self.trailer.is_some())
            .field("end", &self.end.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}
