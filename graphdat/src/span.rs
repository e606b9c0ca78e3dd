//! # Per-request span tree
//!
//! A [`SpanTree`] records nested, named timers for one request. The root span
//! `/` is entered when the tree is created; handler code enters and leaves
//! nested spans with [`SpanTree::begin`] and [`SpanTree::end`]:
//!
//! ```
//! use graphdat::{RequestInfo, SpanTree};
//!
//! let mut tree = SpanTree::new(RequestInfo::new("GET", "example.com", "/users/42"));
//! tree.begin("db");
//! tree.begin("query");
//! tree.end("query");
//! tree.end("db");
//!
//! let sample = tree.compile();
//! let names: Vec<_> = sample.context().iter().map(|span| span.name.as_str()).collect();
//! assert_eq!(names, ["/", "/db", "/db/query"]);
//! ```
//!
//! Every span is identified by its path, so entering the same path twice
//! counts a second call on the existing span instead of creating a new one.
//! Each span accumulates only its own active time; nothing is added to its
//! ancestors.
use crate::request::RequestInfo;
use crate::route::RouteTokenizer;
use crate::sample::{Sample, SpanSummary};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Deepest nesting allowed, counted as `/` separators in a span's path.
/// Deeper spans are most likely runaway recursion and are not recorded.
pub const MAXIMUM_DEPTH: usize = 50;

/// Name of the span entered when a tree is created.
pub const ROOT_SPAN: &str = "/";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SpanId(usize);

#[derive(Debug)]
struct Span {
    name: String,
    path: String,
    offset_ms: f64,
    call_count: u64,
    response_time_ms: f64,
    last_active_start: Instant,
    parent: Option<SpanId>,
    children: Vec<SpanId>,
}

impl Span {
    fn summary(&self) -> SpanSummary {
        SpanSummary {
            name: self.path.clone(),
            call_count: self.call_count,
            first_timestamp_offset_ms: self.offset_ms,
            response_time_ms: self.response_time_ms,
        }
    }
}

/// The timing tree of a single request.
///
/// Spans live in an arena owned by the tree; parents and children refer to
/// each other by index, so the whole tree is freed at once when it is
/// compiled.
#[derive(Debug)]
pub struct SpanTree {
    spans: Vec<Span>,
    index: HashMap<String, SpanId>,
    current: Option<SpanId>,
    request: RequestInfo,
    routes: Arc<RouteTokenizer>,
    request_start: Instant,
    timestamp: SystemTime,
    debug: bool,
}

impl SpanTree {
    /// Starts timing `request` with no route patterns.
    pub fn new(request: RequestInfo) -> Self {
        Self::with_routes(request, Arc::new(RouteTokenizer::default()), false)
    }

    pub(crate) fn with_routes(
        request: RequestInfo,
        routes: Arc<RouteTokenizer>,
        debug: bool,
    ) -> Self {
        let mut tree = SpanTree {
            spans: Vec::new(),
            index: HashMap::new(),
            current: None,
            request,
            routes,
            request_start: Instant::now(),
            timestamp: SystemTime::now(),
            debug,
        };
        tree.begin(ROOT_SPAN);
        tree
    }

    /// Enters the span `name` under the currently active span.
    ///
    /// Empty names, spans nested deeper than [`MAXIMUM_DEPTH`], and spans
    /// begun after the root was closed are ignored.
    pub fn begin(&mut self, name: &str) {
        if name.is_empty() {
            self.log_debug("SpanTree.Begin.MissingName", String::new());
            return;
        }

        let path = match self.current {
            Some(current) => {
                let parent_path = &self.spans[current.0].path;
                if parent_path.ends_with('/') {
                    format!("{}{}", parent_path, name)
                } else {
                    format!("{}/{}", parent_path, name)
                }
            }
            None if self.spans.is_empty() => name.to_string(),
            None => {
                self.log_debug("SpanTree.Begin.RequestClosed", name.to_string());
                return;
            }
        };

        let depth = path.matches('/').count();
        if depth > MAXIMUM_DEPTH {
            graphdat_error!(
                name: "SpanTree.Begin.MaximumDepthExceeded",
                path = path,
                depth = depth,
                maximum_depth = MAXIMUM_DEPTH
            );
            return;
        }

        let now = Instant::now();
        let id = match self.index.get(&path) {
            Some(id) => *id,
            None => {
                let id = SpanId(self.spans.len());
                self.spans.push(Span {
                    name: name.to_string(),
                    path: path.clone(),
                    offset_ms: millis(now.duration_since(self.request_start)),
                    call_count: 0,
                    response_time_ms: 0.0,
                    last_active_start: now,
                    parent: self.current,
                    children: Vec::new(),
                });
                if let Some(parent) = self.current {
                    self.spans[parent.0].children.push(id);
                }
                self.index.insert(path.clone(), id);
                id
            }
        };

        let span = &mut self.spans[id.0];
        span.call_count += 1;
        span.last_active_start = now;
        self.current = Some(id);

        self.log_debug("SpanTree.Begin", path);
    }

    /// Leaves the span `name`, which must be the active span.
    ///
    /// Returns `false` and leaves the tree untouched when no span is active
    /// or `name` is not the active span's name.
    pub fn end(&mut self, name: &str) -> bool {
        if name.is_empty() {
            self.log_debug("SpanTree.End.MissingName", String::new());
            return false;
        }
        if self.spans.is_empty() {
            self.log_debug("SpanTree.End.NoSpans", name.to_string());
            return false;
        }
        let Some(current) = self.current else {
            self.log_debug("SpanTree.End.NoActiveSpan", name.to_string());
            return false;
        };

        let span = &mut self.spans[current.0];
        if span.name != name {
            let detail = format!("{} while {} is active", name, span.path);
            self.log_debug("SpanTree.End.NotActiveSpan", detail);
            return false;
        }

        span.response_time_ms += millis(span.last_active_start.elapsed());
        self.current = span.parent;

        let path = span.path.clone();
        self.log_debug("SpanTree.End", path);
        true
    }

    /// Closes every open span and builds the request's [`Sample`].
    pub fn compile(mut self) -> Sample {
        while let Some(current) = self.current {
            let name = self.spans[current.0].name.clone();
            if !self.end(&name) {
                self.current = None;
            }
        }

        let mut context = Vec::with_capacity(self.spans.len());
        if !self.spans.is_empty() {
            let mut stack = vec![SpanId(0)];
            while let Some(id) = stack.pop() {
                let span = &self.spans[id.0];
                context.push(span.summary());
                stack.extend(span.children.iter().rev().copied());
            }
        }

        let route = format!(
            "{} {}",
            self.request.method(),
            self.routes.render(self.request.path(), self.request.query())
        );
        let timestamp = self
            .timestamp
            .duration_since(UNIX_EPOCH)
            .map(millis)
            .unwrap_or_default();
        let sample = Sample::new(
            route,
            self.request.host_name().into_owned(),
            std::process::id(),
            timestamp,
            context,
        );

        if self.debug {
            graphdat_debug!(
                name: "SpanTree.Compiled",
                route = sample.route(),
                response_time_ms = sample.response_time_ms()
            );
        }
        sample
    }

    /// The request being timed.
    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    /// Path of the active span, if any.
    pub fn current_path(&self) -> Option<&str> {
        self.current.map(|id| self.spans[id.0].path.as_str())
    }

    /// Nesting depth of the active span; the root is at depth 1.
    pub fn depth(&self) -> usize {
        self.current_path()
            .map(|path| path.matches('/').count())
            .unwrap_or_default()
    }

    /// Number of distinct spans recorded so far.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether no span has been recorded.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    fn log_debug(&self, name: &'static str, detail: String) {
        if self.debug {
            graphdat_debug!(name: "SpanTree", event = name, detail = detail);
        }
    }
}

fn millis(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
