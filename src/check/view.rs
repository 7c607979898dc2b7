//! Normalized, read-only view of the request being authorized.

use std::collections::BTreeMap;

use crate::protocol::ProtocolVersion;

/// Error raised while projecting a wire request into a [`RequestView`].
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    /// The request carried no HTTP attributes at all.
    #[error("check request carries no http attributes")]
    MissingHttpAttributes,

    /// The request body could not be read.
    #[error("failed to read request body: {0}")]
    Body(String),
}

/// The parts of an inbound request the policy may look at.
///
/// Built once per check call. Header names are lower-cased on insertion and
/// a later value for the same name replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestView {
    pub version: ProtocolVersion,
    pub request_id: Option<String>,
    pub method: String,
    pub scheme: String,
    pub host: String,
    /// Raw request target as reported by the proxy, query included.
    pub path: String,
    pub query: String,
    /// e.g. `HTTP/1.1`
    pub protocol: String,
    pub body: Option<Vec<u8>>,
    headers: BTreeMap<String, String>,
}

impl RequestView {
    pub fn new(version: ProtocolVersion, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            version,
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Insert a header, replacing any value already stored under the same name.
    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Builder-style variant of [`RequestView::insert_header`].
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert_header(name, value);
        self
    }

    /// Insert every header of an unordered map.
    ///
    /// Entries are applied in byte order of their names, so when names differ
    /// only in case the all-lowercase spelling (the one proxies send) wins.
    pub fn extend_headers<'a, I>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut entries: Vec<_> = headers.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in entries {
            self.insert_header(name, value.as_str());
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// All headers, ordered by name.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn header_count(&self) -> usize {
        self.headers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_names_are_case_insensitive() {
        let view = RequestView::new(ProtocolVersion::V3, "GET", "/")
            .with_header("Deny-Me", "1")
            .with_header("X-Trace", "abc");

        assert_eq!(view.header("deny-me"), Some("1"));
        assert_eq!(view.header("DENY-ME"), Some("1"));
        assert_eq!(view.header("x-trace"), Some("abc"));
        assert_eq!(view.header("missing"), None);
    }

    #[test]
    fn duplicate_headers_last_write_wins() {
        let view = RequestView::new(ProtocolVersion::V3, "GET", "/")
            .with_header("SleepFor", "1")
            .with_header("sleepfor", "3");

        assert_eq!(view.header_count(), 1);
        assert_eq!(view.header("sleepfor"), Some("3"));
    }

    #[test]
    fn map_headers_resolve_case_clashes_deterministically() {
        // Each map gets fresh hash keys, so iteration order varies.
        for _ in 0..8 {
            let mut headers = std::collections::HashMap::new();
            headers.insert("sleepfor".to_string(), "3".to_string());
            headers.insert("SleepFor".to_string(), "1".to_string());
            headers.insert("SLEEPFOR".to_string(), "2".to_string());

            let mut view = RequestView::new(ProtocolVersion::V3, "GET", "/");
            view.extend_headers(&headers);
            assert_eq!(view.header_count(), 1);
            assert_eq!(view.header("sleepfor"), Some("3"));
        }
    }
}
