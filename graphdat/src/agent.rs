//! The handle a web framework adapter talks to.
use crate::config::Config;
use crate::error::Error;
use crate::pipeline::DeliveryPipeline;
use crate::request::RequestInfo;
use crate::route::RouteTokenizer;
use crate::span::SpanTree;
use crate::transport::{self, Transport};
use std::sync::Arc;

/// An instrumentation agent.
///
/// Build one per process with [`Graphdat::new`] and clone it into every
/// request handler; clones share the same delivery pipeline. A framework
/// adapter calls [`on_request_start`](Graphdat::on_request_start) when a
/// request arrives and [`on_request_end`](Graphdat::on_request_end) once the
/// response is written.
///
/// ```no_run
/// use graphdat::{Config, Graphdat, RequestInfo};
///
/// # fn main() -> Result<(), graphdat::Error> {
/// let agent = Graphdat::new(Config::builder().with_route(r"users/(?P<id>\d+)").build())?;
///
/// let mut tree = agent.on_request_start(RequestInfo::new("GET", "example.com", "/users/42"));
/// tree.begin("render");
/// tree.end("render");
/// agent.on_request_end(tree);
///
/// agent.shutdown()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Graphdat {
    config: Arc<Config>,
    routes: Arc<RouteTokenizer>,
    pipeline: Option<Arc<DeliveryPipeline>>,
}

impl Graphdat {
    /// Compiles the route patterns and, when enabled, starts delivering to
    /// the configured target.
    pub fn new(config: Config) -> Result<Self, Error> {
        let transport = transport::build_transport(&config);
        Self::with_transport(config, transport)
    }

    /// Like [`Graphdat::new`] but delivers through `transport` instead of the
    /// configured target.
    pub fn with_transport(config: Config, transport: Box<dyn Transport>) -> Result<Self, Error> {
        let routes = Arc::new(RouteTokenizer::new(&config.routes)?);

        if !config.enabled {
            graphdat_info!(name: "Graphdat.Disabled");
            return Ok(Graphdat {
                config: Arc::new(config),
                routes,
                pipeline: None,
            });
        }

        let pipeline = DeliveryPipeline::new(&config, transport)?;
        graphdat_info!(
            name: "Graphdat.Started",
            collector = config.target.to_string(),
            transport = pipeline.transport_name(),
            routes = routes.len(),
            debug = config.debug,
            message_dump = config.message_dump
        );

        Ok(Graphdat {
            config: Arc::new(config),
            routes,
            pipeline: Some(Arc::new(pipeline)),
        })
    }

    /// The configuration the agent was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether samples are recorded and shipped.
    pub fn is_enabled(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Starts timing a request. The returned tree has its root span open.
    pub fn on_request_start(&self, request: RequestInfo) -> SpanTree {
        SpanTree::with_routes(request, Arc::clone(&self.routes), self.config.debug)
    }

    /// Compiles `tree` and queues the sample for delivery.
    ///
    /// The tree is discarded when the agent is disabled or the request lacks
    /// a method or path.
    pub fn on_request_end(&self, tree: SpanTree) {
        let Some(pipeline) = &self.pipeline else {
            return;
        };
        if !tree.request().has_route() {
            if self.config.debug {
                graphdat_debug!(
                    name: "Graphdat.RequestWithoutRoute",
                    method = tree.request().method(),
                    path = tree.request().path()
                );
            }
            return;
        }

        pipeline.enqueue(tree.compile());
    }

    /// Number of samples dropped because the delivery queue was full or its
    /// sender thread was gone.
    pub fn dropped_samples(&self) -> usize {
        self.pipeline
            .as_ref()
            .map(|pipeline| pipeline.dropped_samples())
            .unwrap_or_default()
    }

    /// Delivers what is queued and stops the background threads.
    ///
    /// Shutting down affects every clone. A disabled agent has nothing to
    /// stop and returns `Ok(())`.
    pub fn shutdown(&self) -> Result<(), Error> {
        match &self.pipeline {
            Some(pipeline) => pipeline.shutdown(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;
    use std::sync::{Barrier, Mutex};
    use std::thread;

    #[derive(Debug, Clone, Default)]
    struct CapturingTransport {
        payloads: Arc<Mutex<Vec<Vec<u8>>>>,
        // sends block while a test holds this
        gate: Arc<Mutex<()>>,
    }

    impl Transport for CapturingTransport {
        fn name(&self) -> &'static str {
            "capturing"
        }

        fn send(&mut self, payload: &[u8]) -> bool {
            let _open = self.gate.lock().unwrap();
            self.payloads.lock().unwrap().push(payload.to_vec());
            true
        }
    }

    fn agent(config: Config) -> (Graphdat, CapturingTransport) {
        let transport = CapturingTransport::default();
        let agent = Graphdat::with_transport(config, Box::new(transport.clone())).unwrap();
        (agent, transport)
    }

    fn expected(route: &str) -> Sample {
        let mut tree = SpanTree::new(RequestInfo::new("GET", "example.com", route));
        tree.begin("render");
        tree.compile()
    }

    #[test]
    fn test_request_is_delivered() {
        let (agent, transport) = agent(Config::builder().with_enabled(true).build());
        assert!(agent.is_enabled());

        let mut tree = agent.on_request_start(RequestInfo::new("GET", "example.com:80", "/render"));
        tree.begin("render");
        tree.end("render");
        agent.on_request_end(tree);
        agent.shutdown().unwrap();

        let payloads = transport.payloads.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        // timings differ, so compare the shape through the encoded length
        assert_eq!(payloads[0].len(), expected("/render").encode().unwrap().len());
    }

    #[test]
    fn test_clones_share_the_pipeline() {
        let (agent, transport) = agent(Config::builder().with_enabled(true).build());
        let clone = agent.clone();

        agent.on_request_end(agent.on_request_start(RequestInfo::new("GET", "h", "/a")));
        clone.on_request_end(clone.on_request_start(RequestInfo::new("GET", "h", "/b")));
        clone.shutdown().unwrap();

        assert_eq!(transport.payloads.lock().unwrap().len(), 2);
        assert!(matches!(agent.shutdown(), Err(Error::AlreadyShutdown)));
    }

    #[test]
    fn test_request_without_route_is_discarded() {
        let (agent, transport) = agent(Config::builder().with_enabled(true).build());

        agent.on_request_end(agent.on_request_start(RequestInfo::new("", "h", "/a")));
        agent.on_request_end(agent.on_request_start(RequestInfo::new("GET", "h", "")));
        agent.shutdown().unwrap();

        assert!(transport.payloads.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disabled_agent_discards_requests() {
        let (agent, transport) = agent(Config::builder().with_enabled(false).build());
        assert!(!agent.is_enabled());

        let mut tree = agent.on_request_start(RequestInfo::new("GET", "h", "/a"));
        tree.begin("work");
        assert!(tree.end("work"));
        agent.on_request_end(tree);

        assert_eq!(agent.dropped_samples(), 0);
        agent.shutdown().unwrap();
        agent.shutdown().unwrap();
        assert!(transport.payloads.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_route_fails_construction() {
        let config = Config::builder().with_route("users/(").build();
        let err = Graphdat::with_transport(config, Box::new(CapturingTransport::default()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRoute { .. }));
    }

    #[test]
    fn test_agent_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Graphdat>();
    }

    #[test]
    fn test_concurrent_requests_are_delivered_or_counted_as_dropped() {
        let (agent, transport) = agent(
            Config::builder()
                .with_enabled(true)
                .with_max_queue_size(4)
                .build(),
        );

        let gate = transport.gate.lock().unwrap();
        let start = Arc::new(Barrier::new(6));
        let workers: Vec<_> = (0..6)
            .map(|worker| {
                let agent = agent.clone();
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    for i in 0..25 {
                        let request = RequestInfo::new("GET", "h", format!("/{}/{}", worker, i));
                        agent.on_request_end(agent.on_request_start(request));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        // at most one sample in flight plus a full queue got through
        assert!(agent.dropped_samples() >= 6 * 25 - 5);

        drop(gate);
        agent.shutdown().unwrap();
        let delivered = transport.payloads.lock().unwrap().len();
        assert!(delivered <= 5, "delivered {} samples", delivered);
        assert_eq!(delivered + agent.dropped_samples(), 6 * 25);
    }
}
