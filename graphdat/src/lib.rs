//! # graphdat
//!
//! A lightweight instrumentation agent for request-processing services.
//!
//! Each request gets a [`SpanTree`]: a tree of nested, named timers opened
//! and closed by the instrumented code. When the request ends the tree is
//! compiled into a [`Sample`] (route, host, process id, timings of every
//! span) and handed to a background [`DeliveryPipeline`], which encodes it
//! as MessagePack and ships it to a collector running on the same machine.
//!
//! Delivery never blocks a request. Samples are dropped when the queue is
//! full or the collector is unreachable; every such failure is logged
//! through `tracing` (feature `internal-logs`) and otherwise swallowed.
//!
//! ## Getting started
//!
//! ```no_run
//! use graphdat::{Config, Graphdat, RequestInfo};
//!
//! # fn main() -> Result<(), graphdat::Error> {
//! let agent = Graphdat::new(
//!     Config::builder()
//!         .with_route(r"users/(?P<id>\d+)")
//!         .build(),
//! )?;
//!
//! // in a request handler
//! let mut tree = agent.on_request_start(RequestInfo::new("GET", "example.com", "/users/42"));
//! tree.begin("db");
//! tree.end("db");
//! tree.begin("render");
//! tree.end("render");
//! agent.on_request_end(tree); // shipped as route "GET /users/:id"
//!
//! agent.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Transports
//!
//! On Unix the collector is reached through the stream socket
//! `/tmp/gd.agent.sock` by default. Each sample is written as a 4-byte
//! big-endian length followed by the encoded body, and a zero-length frame is
//! sent as a heartbeat when the connection has been idle. Configuring a UDP
//! host or port switches to the datagram transport, which sends one sample
//! per datagram. See [`Config`] for every option and its environment
//! variable.
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![allow(clippy::needless_doctest_main)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

#[macro_use]
mod internal_logging;

mod agent;
pub mod config;
mod error;
pub mod pipeline;
mod request;
pub mod route;
pub mod sample;
pub mod span;
pub mod transport;

pub use agent::Graphdat;
pub use config::{Config, ConfigBuilder, Target};
pub use error::{EncodeError, Error};
pub use pipeline::DeliveryPipeline;
pub use request::RequestInfo;
pub use route::RouteTokenizer;
pub use sample::{Sample, SpanSummary};
pub use span::{SpanTree, MAXIMUM_DEPTH};
pub use transport::Transport;

#[cfg(feature = "internal-logs")]
#[doc(hidden)]
pub mod _private {
    pub use tracing::{debug, error, info, warn};
}
