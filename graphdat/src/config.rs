//! Agent configuration.
//!
//! [`ConfigBuilder::default`] starts from the built-in defaults, overrides
//! them with any `GRAPHDAT_*` environment variables that are set, and the
//! `with_*` setters take precedence over both.
use std::fmt;
#[cfg(unix)]
use std::path::PathBuf;
use std::{env, str::FromStr, time::Duration};

/// Enable or disable the agent entirely.
pub(crate) const GRAPHDAT_ENABLED: &str = "GRAPHDAT_ENABLED";
/// Emit span bookkeeping debug logs.
pub(crate) const GRAPHDAT_DEBUG: &str = "GRAPHDAT_DEBUG";
/// Log every sample handed to the transport.
pub(crate) const GRAPHDAT_MESSAGE_DUMP: &str = "GRAPHDAT_MESSAGE_DUMP";
/// Unix domain socket the collector listens on.
pub(crate) const GRAPHDAT_SOCKET_FILE: &str = "GRAPHDAT_SOCKET_FILE";
/// Host of the UDP collector. Setting it selects the datagram transport.
pub(crate) const GRAPHDAT_SOCKET_HOST: &str = "GRAPHDAT_SOCKET_HOST";
/// Port of the UDP collector. Setting it selects the datagram transport.
pub(crate) const GRAPHDAT_SOCKET_PORT: &str = "GRAPHDAT_SOCKET_PORT";
/// Maximum queue size
pub(crate) const GRAPHDAT_MAX_QUEUE_SIZE: &str = "GRAPHDAT_MAX_QUEUE_SIZE";
/// Default maximum queue size
pub(crate) const GRAPHDAT_MAX_QUEUE_SIZE_DEFAULT: usize = 100;
/// Idle time in seconds before the stream transport sends a heartbeat.
pub(crate) const GRAPHDAT_HEARTBEAT_INTERVAL: &str = "GRAPHDAT_HEARTBEAT_INTERVAL";
/// Default heartbeat interval in seconds.
pub(crate) const GRAPHDAT_HEARTBEAT_INTERVAL_DEFAULT: u64 = 30;
/// Number of tries per send before a sample is dropped.
pub(crate) const GRAPHDAT_SEND_ATTEMPTS: &str = "GRAPHDAT_SEND_ATTEMPTS";
/// Default send attempts.
pub(crate) const GRAPHDAT_SEND_ATTEMPTS_DEFAULT: u32 = 3;
/// Default socket write timeout in milliseconds.
pub(crate) const GRAPHDAT_WRITE_TIMEOUT_DEFAULT: u64 = 5_000;

/// Socket file the collector listens on by default.
pub const DEFAULT_SOCKET_FILE: &str = "/tmp/gd.agent.sock";
/// Host of the UDP collector by default.
pub const DEFAULT_SOCKET_HOST: &str = "localhost";
/// Port of the UDP collector by default.
pub const DEFAULT_SOCKET_PORT: u16 = 26873;

/// Where samples are delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// A Unix domain stream socket, framed and kept alive with heartbeats.
    #[cfg(unix)]
    SocketFile(PathBuf),
    /// A UDP endpoint, one datagram per sample.
    Udp {
        /// Collector host name or address.
        host: String,
        /// Collector port.
        port: u16,
    },
}

impl Default for Target {
    #[cfg(unix)]
    fn default() -> Self {
        Target::SocketFile(PathBuf::from(DEFAULT_SOCKET_FILE))
    }

    #[cfg(not(unix))]
    fn default() -> Self {
        Target::Udp {
            host: DEFAULT_SOCKET_HOST.to_string(),
            port: DEFAULT_SOCKET_PORT,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            Target::SocketFile(path) => write!(f, "{}", path.display()),
            Target::Udp { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}

/// Agent configuration.
/// Use [`ConfigBuilder`] to configure your own instance of [`Config`].
#[derive(Clone, Debug)]
pub struct Config {
    /// When false the agent creates no threads or sockets and discards every
    /// request.
    pub(crate) enabled: bool,

    /// Emit debug logs for span bookkeeping.
    pub(crate) debug: bool,

    /// Log route and encoded size of every sample sent.
    pub(crate) message_dump: bool,

    /// Collector location.
    pub(crate) target: Target,

    /// Route patterns used to tokenize request paths, in priority order.
    pub(crate) routes: Vec<String>,

    /// The maximum number of samples waiting for the sender. If the queue is
    /// full new samples are dropped. The default value is 100.
    pub(crate) max_queue_size: usize,

    /// Idle time after which the stream transport sends a heartbeat frame.
    /// The default value is 30 seconds.
    pub(crate) heartbeat_interval: Duration,

    /// Tries per send, reconnecting in between. The default value is 3.
    pub(crate) send_attempts: u32,

    /// Socket-level write timeout of the stream transport.
    pub(crate) write_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::default().build()
    }
}

impl Config {
    /// Returns a builder seeded with defaults and environment overrides.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Whether the agent records and ships samples.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Where samples are delivered.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Capacity of the delivery queue.
    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }
}

/// A builder for creating [`Config`] instances.
#[derive(Debug)]
pub struct ConfigBuilder {
    enabled: bool,
    debug: bool,
    message_dump: bool,
    target: Target,
    routes: Vec<String>,
    max_queue_size: usize,
    heartbeat_interval: Duration,
    send_attempts: u32,
    write_timeout: Duration,
}

impl Default for ConfigBuilder {
    /// Create a new [`ConfigBuilder`] initialized with the default values.
    /// The values are overridden by environment variables if set.
    /// The supported environment variables are:
    /// * `GRAPHDAT_ENABLED`
    /// * `GRAPHDAT_DEBUG`
    /// * `GRAPHDAT_MESSAGE_DUMP`
    /// * `GRAPHDAT_SOCKET_FILE`
    /// * `GRAPHDAT_SOCKET_HOST`
    /// * `GRAPHDAT_SOCKET_PORT`
    /// * `GRAPHDAT_MAX_QUEUE_SIZE`
    /// * `GRAPHDAT_HEARTBEAT_INTERVAL`
    /// * `GRAPHDAT_SEND_ATTEMPTS`
    fn default() -> Self {
        ConfigBuilder {
            enabled: true,
            debug: false,
            message_dump: false,
            target: Target::default(),
            routes: Vec::new(),
            max_queue_size: GRAPHDAT_MAX_QUEUE_SIZE_DEFAULT,
            heartbeat_interval: Duration::from_secs(GRAPHDAT_HEARTBEAT_INTERVAL_DEFAULT),
            send_attempts: GRAPHDAT_SEND_ATTEMPTS_DEFAULT,
            write_timeout: Duration::from_millis(GRAPHDAT_WRITE_TIMEOUT_DEFAULT),
        }
        .init_from_env_vars()
    }
}

impl ConfigBuilder {
    /// Turn the agent on or off.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Emit debug logs for every span begin and end.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Log the route and encoded size of every sample sent to the collector.
    pub fn with_message_dump(mut self, message_dump: bool) -> Self {
        self.message_dump = message_dump;
        self
    }

    /// Deliver over the Unix domain socket at `path`.
    #[cfg(unix)]
    pub fn with_socket_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.target = Target::SocketFile(path.into());
        self
    }

    /// Deliver over UDP to `host:port`.
    pub fn with_udp_target(mut self, host: impl Into<String>, port: u16) -> Self {
        self.target = Target::Udp {
            host: host.into(),
            port,
        };
        self
    }

    /// Add a route pattern. Patterns are tried in the order they were added.
    pub fn with_route(mut self, pattern: impl Into<String>) -> Self {
        self.routes.push(pattern.into());
        self
    }

    /// Replace the route patterns.
    pub fn with_routes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the delivery queue capacity. Values below 1 are raised to 1.
    /// The default value is 100.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the idle time after which a heartbeat is sent.
    /// The default value is 30 seconds.
    pub fn with_heartbeat_interval(mut self, heartbeat_interval: Duration) -> Self {
        self.heartbeat_interval = heartbeat_interval;
        self
    }

    /// Set how many times a send is tried before the sample is dropped.
    /// Values below 1 are raised to 1. The default value is 3.
    pub fn with_send_attempts(mut self, send_attempts: u32) -> Self {
        self.send_attempts = send_attempts;
        self
    }

    /// Set the socket-level write timeout of the stream transport.
    /// The default value is 5 seconds.
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Builds a `Config` enforcing the following invariants:
    /// * `max_queue_size` is at least 1.
    /// * `send_attempts` is at least 1.
    pub fn build(self) -> Config {
        Config {
            enabled: self.enabled,
            debug: self.debug,
            message_dump: self.message_dump,
            target: self.target,
            routes: self.routes,
            max_queue_size: self.max_queue_size.max(1),
            heartbeat_interval: self.heartbeat_interval,
            send_attempts: self.send_attempts.max(1),
            write_timeout: self.write_timeout,
        }
    }

    fn init_from_env_vars(mut self) -> Self {
        if let Some(enabled) = env_bool(GRAPHDAT_ENABLED) {
            self.enabled = enabled;
        }

        if let Some(debug) = env_bool(GRAPHDAT_DEBUG) {
            self.debug = debug;
        }

        if let Some(message_dump) = env_bool(GRAPHDAT_MESSAGE_DUMP) {
            self.message_dump = message_dump;
        }

        #[cfg(unix)]
        if let Some(socket_file) = env::var(GRAPHDAT_SOCKET_FILE)
            .ok()
            .filter(|file| !file.trim().is_empty())
        {
            self.target = Target::SocketFile(PathBuf::from(socket_file.trim()));
        }

        let host = env::var(GRAPHDAT_SOCKET_HOST)
            .ok()
            .map(|host| host.trim().to_string())
            .filter(|host| !host.is_empty());
        let port = env::var(GRAPHDAT_SOCKET_PORT)
            .ok()
            .and_then(|port| u16::from_str(port.trim()).ok());
        if host.is_some() || port.is_some() {
            self.target = Target::Udp {
                host: host.unwrap_or_else(|| DEFAULT_SOCKET_HOST.to_string()),
                port: port.unwrap_or(DEFAULT_SOCKET_PORT),
            };
        }

        if let Some(max_queue_size) = env::var(GRAPHDAT_MAX_QUEUE_SIZE)
            .ok()
            .and_then(|queue_size| usize::from_str(queue_size.trim()).ok())
        {
            self.max_queue_size = max_queue_size;
        }

        if let Some(heartbeat_interval) = env::var(GRAPHDAT_HEARTBEAT_INTERVAL)
            .ok()
            .and_then(|interval| u64::from_str(interval.trim()).ok())
        {
            self.heartbeat_interval = Duration::from_secs(heartbeat_interval);
        }

        if let Some(send_attempts) = env::var(GRAPHDAT_SEND_ATTEMPTS)
            .ok()
            .and_then(|attempts| u32::from_str(attempts.trim()).ok())
        {
            self.send_attempts = send_attempts;
        }

        self
    }
}

fn env_bool(key: &str) -> Option<bool> {
    match env::var(key).ok()?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
