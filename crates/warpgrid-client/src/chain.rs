//! Filter-chain decorator.
//!
//! [`FilteringSink`] sits between the transport and a [`ResponseSink`]
//! and runs the configured [`ResponseFilter`]s once the response head
//! arrives. The head itself is forwarded immediately; every later event
//! is queued behind the filters and forwarded in arrival order.
//!
//! # Ordering
//!
//! The chain tail is a per-response driver task fed by an unbounded,
//! ordered step queue. The driver first awaits the filters one after
//! another, then drains the queue, forwarding one step at a time. A step
//! therefore only runs once everything queued before it has settled,
//! whatever thread the filters resolve on, and the transport thread never
//! waits for a filter.
//!
//! # Failure
//!
//! A failed chain is reported to the sink once when it settles, and again
//! by every queued step. The sink's `on_error` is idempotent, so only the
//! first report has any effect.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use warpgrid_http::{Error, HeaderMap, Request, ResponseHead};

use crate::context::FilterContext;
use crate::filter::{FilterFuture, ResponseFilter};
use crate::hooks::panic_message;
use crate::sink::ResponseSink;

/// Ordered, shared filter configuration.
pub type FilterList = Arc<[Arc<dyn ResponseFilter>]>;

/// Wraps a sink with an ordered chain of asynchronous response filters.
pub struct FilteringSink<S> {
    sink: Arc<S>,
    request: Arc<Request>,
    filters: FilterList,
    ctx: FilterContext,
    runtime: Handle,
    chain: Mutex<Chain>,
}

enum Chain {
    /// No head seen yet.
    Unstarted,
    /// The first filter failed synchronously; later events are dropped.
    Broken,
    Running(ChainTail),
}

/// Handle to the work scheduled so far for one response. Extending it
/// appends a step behind everything already queued.
struct ChainTail {
    steps: mpsc::UnboundedSender<Step>,
}

#[derive(Debug)]
enum Step {
    Data(Bytes),
    Trailers(HeaderMap),
    End,
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Data(_) => "data",
            Step::Trailers(_) => "trailers",
            Step::End => "end",
        }
    }

    fn forward<S: ResponseSink>(self, sink: &S) {
        match self {
            Step::Data(chunk) => sink.on_data(chunk),
            Step::Trailers(trailers) => sink.on_trailers(trailers),
            Step::End => sink.on_end(),
        }
    }
}

impl<S: ResponseSink + 'static> FilteringSink<S> {
    /// Decorate `sink` with `filters`, running filter work on `runtime`.
    ///
    /// Fails with [`Error::InvalidArgument`] if `filters` is empty.
    pub fn new(
        sink: Arc<S>,
        request: Arc<Request>,
        filters: FilterList,
        ctx: FilterContext,
        runtime: Handle,
    ) -> Result<Self, Error> {
        if filters.is_empty() {
            return Err(Error::invalid_argument("response filters must not be empty"));
        }
        Ok(Self {
            sink,
            request,
            filters,
            ctx,
            runtime,
            chain: Mutex::new(Chain::Unstarted),
        })
    }

    fn chain(&self) -> MutexGuard<'_, Chain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a step behind the chain tail, or drop it if there is none.
    fn enqueue(&self, step: Step) {
        match &*self.chain() {
            Chain::Running(tail) => {
                if let Err(mpsc::error::SendError(step)) = tail.steps.send(step) {
                    // The driver stops after `end`, or went down with its
                    // runtime.
                    trace!(event = step.name(), uri = %self.request.uri(), "filter chain finished; dropping event");
                }
            }
            Chain::Unstarted | Chain::Broken => {
                trace!(event = step.name(), uri = %self.request.uri(), "no filter chain; dropping event");
            }
        }
    }

    fn start_chain(&self, head: Arc<ResponseHead>) -> Chain {
        let (first, rest) = match self.filters.split_first() {
            Some(split) => split,
            None => return Chain::Broken,
        };

        let first_run = match first.filter(self.request.clone(), head.clone(), self.ctx.clone()) {
            Ok(fut) => fut,
            Err(cause) => {
                debug!(
                    filter = first.name(),
                    uri = %self.request.uri(),
                    error = %cause,
                    "response filter failed to start"
                );
                self.sink.on_error(cause);
                return Chain::Broken;
            }
        };

        let (steps, queue) = mpsc::unbounded_channel();
        let driver = Driver {
            sink: self.sink.clone(),
            request: self.request.clone(),
            head,
            ctx: self.ctx.clone(),
            rest: rest.to_vec(),
        };
        self.runtime.spawn(driver.run(first.name().to_string(), first_run, queue));
        Chain::Running(ChainTail { steps })
    }
}

impl<S: ResponseSink + 'static> ResponseSink for FilteringSink<S> {
    fn on_head(&self, head: ResponseHead) {
        let mut chain = self.chain();
        if !matches!(*chain, Chain::Unstarted) {
            debug!(uri = %self.request.uri(), "duplicate response head; dropping");
            return;
        }

        self.sink.on_head(head.clone());
        *chain = self.start_chain(Arc::new(head));
    }

    fn on_data(&self, chunk: Bytes) {
        self.enqueue(Step::Data(chunk));
    }

    fn on_trailers(&self, trailers: HeaderMap) {
        self.enqueue(Step::Trailers(trailers));
    }

    fn on_end(&self) {
        self.enqueue(Step::End);
    }

    fn on_error(&self, cause: Error) {
        self.sink.on_error(cause);
    }
}

/// Drives one response's filters and then its queued steps.
struct Driver<S> {
    sink: Arc<S>,
    request: Arc<Request>,
    head: Arc<ResponseHead>,
    ctx: FilterContext,
    rest: Vec<Arc<dyn ResponseFilter>>,
}

impl<S: ResponseSink + 'static> Driver<S> {
    async fn run(
        self,
        first_name: String,
        first_run: FilterFuture,
        mut queue: mpsc::UnboundedReceiver<Step>,
    ) {
        let mut settled = settle(&first_name, first_run).await;
        for filter in &self.rest {
            if settled.is_err() {
                break;
            }
            settled = match filter.filter(self.request.clone(), self.head.clone(), self.ctx.clone()) {
                Ok(fut) => settle(filter.name(), fut).await,
                Err(cause) => Err(cause),
            };
        }

        if let Err(cause) = &settled {
            debug!(uri = %self.request.uri(), error = %cause, "response filter chain failed");
            self.sink.on_error(cause.clone());
        }

        while let Some(step) = queue.recv().await {
            let is_end = matches!(step, Step::End);
            settled = match settled {
                Err(cause) => {
                    self.sink.on_error(cause.clone());
                    Err(cause)
                }
                Ok(()) => self.forward(step),
            };
            if is_end {
                if let Err(cause) = &settled {
                    self.sink.on_error(cause.clone());
                }
                break;
            }
        }
    }

    /// Forward a step, failing the tail if delivery panics.
    fn forward(&self, step: Step) -> Result<(), Error> {
        let event = step.name();
        std::panic::catch_unwind(AssertUnwindSafe(|| step.forward(&*self.sink))).map_err(|panic| {
            let message = panic_message(panic.as_ref());
            debug!(event, uri = %self.request.uri(), panic = %message, "response event delivery panicked");
            Error::Panicked(message)
        })
    }
}

/// Await a filter future, turning a panic inside it into a failure.
async fn settle(name: &str, fut: FilterFuture) -> Result<(), Error> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(Error::filter(name, panic_message(panic.as_ref()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::boxed;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every event it receives.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: impl Into<String>) {
            self.events.lock().unwrap().push(event.into());
        }
    }

    impl ResponseSink for Recorder {
        fn on_head(&self, head: ResponseHead) {
            self.push(format!("head:{}", head.status));
        }

        fn on_data(&self, chunk: Bytes) {
            self.push(format!("data:{}", String::from_utf8_lossy(&chunk)));
        }

        fn on_trailers(&self, _trailers: HeaderMap) {
            self.push("trailers");
        }

        fn on_end(&self) {
            self.push("end");
        }

        fn on_error(&self, cause: Error) {
            self.push(format!("error:{cause}"));
        }
    }

    fn decorate(recorder: &Arc<Recorder>, filters: Vec<Arc<dyn ResponseFilter>>) -> FilteringSink<Recorder> {
        FilteringSink::new(
            recorder.clone(),
            Arc::new(Request::get("/abc")),
            filters.into(),
            FilterContext::new(),
            Handle::current(),
        )
        .unwrap()
    }

    fn passing() -> Arc<dyn ResponseFilter> {
        Arc::new(|_: Arc<Request>, _: Arc<ResponseHead>, _: FilterContext| boxed(async { Ok(()) }))
    }

    async fn wait_for(recorder: &Recorder, count: usize) {
        for _ in 0..200 {
            if recorder.events().len() >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {count} events: {:?}", recorder.events());
    }

    #[tokio::test]
    async fn empty_filter_list_is_rejected() {
        let result = FilteringSink::new(
            Arc::new(Recorder::default()),
            Arc::new(Request::get("/")),
            Vec::<Arc<dyn ResponseFilter>>::new().into(),
            FilterContext::new(),
            Handle::current(),
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn events_before_head_are_dropped() {
        let recorder = Arc::new(Recorder::default());
        let sink = decorate(&recorder, vec![passing()]);

        sink.on_data(Bytes::from("early"));
        sink.on_end();
        tokio::task::yield_now().await;

        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn forwards_in_order_after_filters() {
        let recorder = Arc::new(Recorder::default());
        let sink = decorate(&recorder, vec![passing(), passing()]);

        sink.on_head(ResponseHead::new(200, Default::default(), HeaderMap::new()));
        sink.on_data(Bytes::from("a"));
        sink.on_data(Bytes::from("b"));
        sink.on_trailers(HeaderMap::new());
        sink.on_end();

        wait_for(&recorder, 5).await;
        assert_eq!(
            recorder.events(),
            ["head:200", "data:a", "data:b", "trailers", "end"]
        );
    }

    #[tokio::test]
    async fn duplicate_head_does_not_restart_filters() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let counting: Arc<dyn ResponseFilter> =
            Arc::new(move |_: Arc<Request>, _: Arc<ResponseHead>, _: FilterContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                boxed(async { Ok(()) })
            });
        let recorder = Arc::new(Recorder::default());
        let sink = decorate(&recorder, vec![counting]);

        sink.on_head(ResponseHead::default());
        sink.on_head(ResponseHead::default());
        sink.on_end();

        wait_for(&recorder, 2).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.events(), ["head:0", "end"]);
    }

    #[tokio::test]
    async fn failed_chain_turns_queued_steps_into_errors() {
        let failing: Arc<dyn ResponseFilter> =
            Arc::new(|_: Arc<Request>, _: Arc<ResponseHead>, _: FilterContext| {
                boxed(async { Err(Error::other("denied")) })
            });
        let recorder = Arc::new(Recorder::default());
        let sink = decorate(&recorder, vec![failing]);

        sink.on_head(ResponseHead::default());
        sink.on_data(Bytes::from("x"));
        sink.on_end();

        // Chain failure, the data step, then the end step and its observer.
        wait_for(&recorder, 5).await;
        let events = recorder.events();
        assert_eq!(events[0], "head:0");
        assert!(events[1..].iter().all(|e| e == "error:denied"));
    }

    #[tokio::test]
    async fn panicking_filter_fails_the_chain() {
        async fn explode() -> Result<(), Error> {
            panic!("filter bug")
        }
        let panicking: Arc<dyn ResponseFilter> =
            Arc::new(|_: Arc<Request>, _: Arc<ResponseHead>, _: FilterContext| boxed(explode()));
        let recorder = Arc::new(Recorder::default());
        let sink = decorate(&recorder, vec![panicking]);

        sink.on_head(ResponseHead::default());

        wait_for(&recorder, 2).await;
        assert!(recorder.events()[1].contains("filter bug"));
    }

    /// Sink whose data delivery panics; records everything else.
    #[derive(Default)]
    struct PanicsOnData {
        recorder: Recorder,
    }

    impl ResponseSink for PanicsOnData {
        fn on_head(&self, head: ResponseHead) {
            self.recorder.on_head(head);
        }

        fn on_data(&self, _chunk: Bytes) {
            panic!("sink broke on data");
        }

        fn on_trailers(&self, trailers: HeaderMap) {
            self.recorder.on_trailers(trailers);
        }

        fn on_end(&self) {
            self.recorder.on_end();
        }

        fn on_error(&self, cause: Error) {
            self.recorder.on_error(cause);
        }
    }

    #[tokio::test]
    async fn panicking_forward_fails_later_steps_and_end() {
        let inner = Arc::new(PanicsOnData::default());
        let sink = FilteringSink::new(
            inner.clone(),
            Arc::new(Request::get("/abc")),
            vec![passing()].into(),
            FilterContext::new(),
            Handle::current(),
        )
        .unwrap();

        sink.on_head(ResponseHead::default());
        sink.on_data(Bytes::from("boom"));
        sink.on_trailers(HeaderMap::new());
        sink.on_end();

        // Head, then the trailers and end steps, then the observer after end.
        wait_for(&inner.recorder, 4).await;
        let events = inner.recorder.events();
        assert_eq!(events[0], "head:0");
        assert_eq!(events.len(), 4);
        for event in &events[1..] {
            assert!(event.starts_with("error:panicked"), "{event}");
            assert!(event.contains("sink broke on data"), "{event}");
        }
    }

    #[tokio::test]
    async fn driver_finishes_after_end_while_handle_lives() {
        let recorder = Arc::new(Recorder::default());
        let sink = decorate(&recorder, vec![passing()]);

        sink.on_head(ResponseHead::default());
        sink.on_end();
        wait_for(&recorder, 2).await;

        // Test and decorator hold the recorder; the driver's clone is gone.
        for _ in 0..200 {
            if Arc::strong_count(&recorder) == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(Arc::strong_count(&recorder), 2);

        sink.on_data(Bytes::from("after end"));
        tokio::task::yield_now().await;
        assert_eq!(recorder.events(), ["head:0", "end"]);
    }
}
