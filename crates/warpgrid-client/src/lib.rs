//! Receiving side of the WarpGrid HTTP client.
//!
//! Accepts response events from a transport and delivers them to
//! application hooks, optionally running a chain of asynchronous response
//! filters first.
//!
//! # Architecture
//!
//! ```text
//! transport (head, data*, trailers?, end | error)
//!   │
//!   ▼
//! FilteringSink        only when filters are configured
//!   │  head forwarded at once; filters run one at a time;
//!   │  data / trailers / end queued behind them, in order
//!   ▼
//! TerminalSink
//!   ├── application Hooks
//!   └── Completion ──► ResponseFuture (resolves exactly once)
//! ```
//!
//! [`ResponsePipeline::open`] wires this up for one response and returns
//! the transport-facing [`ResponseHandle`] together with the
//! [`ResponseFuture`] the request initiator awaits.

pub mod chain;
pub mod config;
pub mod context;
pub mod filter;
pub mod hooks;
pub mod outcome;
pub mod pipeline;
pub mod sink;

pub use chain::{FilterList, FilteringSink};
pub use config::PipelineConfig;
pub use context::FilterContext;
pub use filter::{FilterFuture, ResponseFilter};
pub use hooks::{HookResult, Hooks};
pub use outcome::{Completion, Outcome, ResponseFuture};
pub use pipeline::{ResponseHandle, ResponsePipeline};
pub use sink::{ResponseSink, TerminalSink};
pub use warpgrid_http::{Error, HeaderMap, Request, Response, ResponseHead, Version};
