//! Route tokenization.
//!
//! Concrete request paths such as `/users/42` are rewritten to parameterized
//! routes such as `/users/:id` so that requests for different ids aggregate
//! under one route on the dashboard.
use crate::error::Error;
use regex::Regex;

/// An ordered list of route patterns.
///
/// Each pattern is a regular expression matched against the request path with
/// its leading `/` removed. The first pattern that matches the whole path
/// wins; every capture group that took part in the match is replaced by
/// `:name` for named groups or `?` for unnamed ones.
#[derive(Clone, Debug, Default)]
pub struct RouteTokenizer {
    patterns: Vec<Regex>,
}

impl RouteTokenizer {
    /// Compiles `patterns`, failing on the first invalid one.
    pub fn new<I, S>(patterns: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                // anchoring with a non-capturing group keeps group indices intact
                Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| Error::InvalidRoute {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RouteTokenizer { patterns })
    }

    /// Number of configured patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether no patterns are configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Renders the path part of a route.
    ///
    /// A tokenized path is returned without the query string. Otherwise the
    /// path is returned as-is with `?query` appended when the query is not
    /// empty.
    pub fn render(&self, path: &str, query: Option<&str>) -> String {
        if let Some(tokenized) = self.tokenize(path) {
            return tokenized;
        }

        match query.filter(|query| !query.is_empty()) {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        }
    }

    /// Tokenizes `path` with the first matching pattern, if any.
    pub fn tokenize(&self, path: &str) -> Option<String> {
        let stripped = path.trim_start_matches('/');

        self.patterns.iter().find_map(|regex| {
            let captures = regex.captures(stripped)?;
            let names: Vec<Option<&str>> = regex.capture_names().collect();

            let mut tokenized = String::with_capacity(stripped.len() + 1);
            tokenized.push('/');
            let mut cursor = 0;
            for (index, name) in names.iter().enumerate().skip(1) {
                let Some(group) = captures.get(index) else {
                    continue;
                };
                // nested groups were already replaced by their enclosing group
                if group.start() < cursor {
                    continue;
                }
                tokenized.push_str(&stripped[cursor..group.start()]);
                match name {
                    Some(name) => {
                        tokenized.push(':');
                        tokenized.push_str(name);
                    }
                    None => tokenized.push('?'),
                }
                cursor = group.end();
            }
            tokenized.push_str(&stripped[cursor..]);

            Some(tokenized)
        })
    }
}
