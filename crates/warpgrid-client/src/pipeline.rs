//! Per-client pipeline factory.
//!
//! [`ResponsePipeline`] holds the configuration shared by every response
//! of a client: the [`PipelineConfig`] and the ordered filter list.
//! [`ResponsePipeline::open`] builds the per-response state and hands the
//! transport a [`ResponseHandle`] to push events into.

use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;
use warpgrid_http::{Error, HeaderMap, Request, ResponseHead};

use crate::chain::{FilterList, FilteringSink};
use crate::config::PipelineConfig;
use crate::context::FilterContext;
use crate::filter::ResponseFilter;
use crate::hooks::Hooks;
use crate::outcome::{self, ResponseFuture};
use crate::sink::{ResponseSink, TerminalSink};

#[derive(Clone)]
pub struct ResponsePipeline {
    config: PipelineConfig,
    filters: Vec<Arc<dyn ResponseFilter>>,
    runtime: Option<Handle>,
}

impl ResponsePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            filters: Vec::new(),
            runtime: None,
        }
    }

    /// Append a filter. Filters run in the order they were added.
    pub fn with_filter(mut self, filter: impl ResponseFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Run filter work on `runtime` instead of the runtime current at
    /// [`open`](ResponsePipeline::open) time.
    pub fn with_runtime(self, runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            ..self
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Create the pipeline for one response.
    ///
    /// Without filters the handle feeds the terminal sink directly. With
    /// filters it needs a tokio runtime, either configured or current.
    pub fn open(
        &self,
        request: Request,
        hooks: Hooks,
        ctx: FilterContext,
    ) -> Result<(ResponseHandle, ResponseFuture), Error> {
        let request = Arc::new(request);
        let (completion, future) = outcome::channel();
        let sink = TerminalSink::new(request.clone(), hooks, completion, &self.config);

        if self.filters.is_empty() {
            return Ok((ResponseHandle::Direct(sink), future));
        }

        let runtime = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| {
                Error::invalid_argument("response filters require a tokio runtime")
            })?,
        };
        let filters: FilterList = self.filters.clone().into();
        let filtering = FilteringSink::new(Arc::new(sink), request, filters, ctx, runtime)?;
        Ok((ResponseHandle::Filtered(filtering), future))
    }
}

impl Default for ResponsePipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl std::fmt::Debug for ResponsePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsePipeline")
            .field("config", &self.config)
            .field("filters", &self.filter_names())
            .finish()
    }
}

/// Transport-facing entry point for one response.
pub enum ResponseHandle {
    Direct(TerminalSink),
    Filtered(FilteringSink<TerminalSink>),
}

impl ResponseHandle {
    pub fn is_filtered(&self) -> bool {
        matches!(self, ResponseHandle::Filtered(_))
    }

    fn sink(&self) -> &dyn ResponseSink {
        match self {
            ResponseHandle::Direct(sink) => sink,
            ResponseHandle::Filtered(sink) => sink,
        }
    }
}

impl std::fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseHandle::Direct(_) => f.write_str("ResponseHandle::Direct"),
            ResponseHandle::Filtered(_) => f.write_str("ResponseHandle::Filtered"),
        }
    }
}

impl ResponseSink for ResponseHandle {
    fn on_head(&self, head: ResponseHead) {
        self.sink().on_head(head)
    }

    fn on_data(&self, chunk: Bytes) {
        self.sink().on_data(chunk)
    }

    fn on_trailers(&self, trailers: HeaderMap) {
        self.sink().on_trailers(trailers)
    }

    fn on_end(&self) {
        self.sink().on_end()
    }

    fn on_error(&self, cause: Error) {
        self.sink().on_error(cause)
    }
}
