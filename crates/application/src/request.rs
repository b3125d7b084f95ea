use restify_core::UserIdentity;
use serde_json::Value;

/// Incoming repository request: viewer, query-string pairs and JSON payload.
#[derive(Debug, Clone, Default)]
pub struct RestifyRequest {
    viewer: Option<UserIdentity>,
    query: Vec<(String, String)>,
    payload: Value,
}

impl RestifyRequest {
    /// Creates a request for the provided viewer; `None` is a guest.
    #[must_use]
    pub fn new(viewer: Option<UserIdentity>) -> Self {
        Self {
            viewer,
            query: Vec::new(),
            payload: Value::Null,
        }
    }

    /// Replaces the query-string pairs.
    #[must_use]
    pub fn with_query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    /// Replaces the JSON payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Returns the viewing principal.
    #[must_use]
    pub fn viewer(&self) -> Option<&UserIdentity> {
        self.viewer.as_ref()
    }

    /// Returns the JSON payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the first query-string value for a key.
    #[must_use]
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    /// Returns whether the query string carries a key.
    #[must_use]
    pub fn has_query(&self, key: &str) -> bool {
        self.query.iter().any(|(candidate, _)| candidate == key)
    }

    /// Reads an input from the query string, falling back to the payload.
    #[must_use]
    pub fn input(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.query_param(key) {
            return Some(Value::String(value.to_owned()));
        }

        self.payload
            .as_object()
            .and_then(|payload| payload.get(key))
            .cloned()
    }

    /// Returns a non-empty trimmed query value.
    #[must_use]
    pub fn filled(&self, key: &str) -> Option<&str> {
        self.query_param(key)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Returns the match value for a field, accepting `key` and `match[key]`.
    #[must_use]
    pub fn match_value(&self, key: &str) -> Option<&str> {
        self.query_param(key)
            .or_else(|| self.query_param(format!("match[{key}]").as_str()))
    }

    /// Returns the negated match value for a field, accepting `-key` and `-match[key]`.
    #[must_use]
    pub fn negated_match_value(&self, key: &str) -> Option<&str> {
        self.query_param(format!("-{key}").as_str())
            .or_else(|| self.query_param(format!("-match[{key}]").as_str()))
    }

    /// Returns the trimmed search term.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.filled("search")
    }

    /// Returns the raw sort directive.
    #[must_use]
    pub fn sort(&self) -> Option<&str> {
        self.filled("sort")
    }

    /// Returns the raw base64 advanced filter payload.
    #[must_use]
    pub fn advanced_filters(&self) -> Option<&str> {
        self.filled("filters")
    }

    /// Returns requested eager relations from `related` or `include`.
    #[must_use]
    pub fn related(&self) -> Vec<String> {
        self.filled("related")
            .or_else(|| self.filled("include"))
            .map(split_list)
            .unwrap_or_default()
    }

    /// Returns the requested page, starting at 1.
    #[must_use]
    pub fn page(&self) -> usize {
        self.filled("page")
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|page| *page > 0)
            .unwrap_or(1)
    }

    /// Returns the requested page size, if any.
    #[must_use]
    pub fn per_page(&self) -> Option<usize> {
        self.filled("perPage")
            .or_else(|| self.filled("per_page"))
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|per_page| *per_page > 0)
    }
}

/// Splits a comma separated list, dropping empty items.
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
