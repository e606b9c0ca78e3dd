use std::borrow::Cow;

/// The request metadata a framework adapter hands to the agent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestInfo {
    method: String,
    host: String,
    path: String,
    query: Option<String>,
}

impl RequestInfo {
    /// Creates request metadata from the HTTP method, the `Host` header value
    /// and the request path.
    pub fn new(
        method: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        RequestInfo {
            method: method.into(),
            host: host.into(),
            path: path.into(),
            query: None,
        }
    }

    /// Attaches the raw query string, without the leading `?`.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// HTTP method, e.g. `GET`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Host as received, possibly including a port.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Whether the method and path needed to name a route are present.
    pub fn has_route(&self) -> bool {
        !self.method.is_empty() && !self.path.is_empty()
    }

    /// Host without the port.
    pub(crate) fn host_name(&self) -> Cow<'_, str> {
        let host = self.host.trim();
        if let Some(bracketed) = host.strip_prefix('[') {
            // [::1]:8080
            return match bracketed.find(']') {
                Some(end) => Cow::Owned(format!("[{}]", &bracketed[..end])),
                None => Cow::Borrowed(host),
            };
        }
        match host.split_once(':') {
            Some((name, _port)) => Cow::Borrowed(name),
            None => Cow::Borrowed(host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_name_strips_port() {
        assert_eq!(RequestInfo::new("GET", "example.com:8080", "/").host_name(), "example.com");
        assert_eq!(RequestInfo::new("GET", "example.com", "/").host_name(), "example.com");
        assert_eq!(RequestInfo::new("GET", "[::1]:8080", "/").host_name(), "[::1]");
    }

    #[test]
    fn test_has_route() {
        assert!(RequestInfo::new("GET", "h", "/").has_route());
        assert!(!RequestInfo::new("", "h", "/").has_route());
        assert!(!RequestInfo::new("GET", "h", "").has_route());
    }

    #[test]
    fn test_with_query() {
        let request = RequestInfo::new("GET", "h", "/search").with_query("q=1");
        assert_eq!(request.query(), Some("q=1"));
        assert_eq!(request.method(), "GET");
        assert_eq!(request.path(), "/search");
    }
}
