//! Query parameter assembly

use super::filter::{self, FilterClause};

/// Field selection, filter and limit for one collection request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceQuery {
    pub fields: Vec<String>,
    pub filter: Option<String>,
    /// Maximum number of records; 0 means unlimited
    pub limit: u32,
    /// True when `limit` came from the session default rather than the caller
    pub used_default: bool,
}

impl ResourceQuery {
    pub fn new(fields: Vec<String>, filter: Option<String>, limit: u32) -> Self {
        Self {
            fields,
            filter,
            limit,
            used_default: false,
        }
    }

    /// Outgoing parameters in `fields`, `filter`, `limit` order.
    ///
    /// Empty field lists, absent filters and a zero limit are omitted.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(3);

        if !self.fields.is_empty() {
            params.push(("fields", self.fields.join(",")));
        }
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.is_empty()) {
            params.push(("filter", filter.to_string()));
        }
        if self.limit > 0 {
            params.push(("limit", self.limit.to_string()));
        }

        params
    }

    /// URL-encoded query string, including the leading `?` (empty if no params)
    pub fn query_string(&self) -> String {
        encode_params(&self.params())
    }

    /// The limit as a client-side cap, `None` when unlimited
    pub fn cap(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit as usize)
    }
}

/// Encode `key=value` pairs into a query string with a leading `?`
pub fn encode_params(params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();

    format!("?{}", parts.join("&"))
}

/// Combine fields, filter clauses and limit into a query.
///
/// Without an explicit limit the session default applies and a warning is
/// logged, so silent truncation is always visible.
pub fn assemble<S: AsRef<str>>(
    fields: &[S],
    clauses: &[FilterClause],
    limit: Option<u32>,
    session_default: u32,
) -> ResourceQuery {
    let fields: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();
    let filter = filter::build(clauses);

    let (limit, used_default) = match limit {
        Some(limit) => (limit, false),
        None => {
            tracing::warn!(
                "No limit given, using default limit of {} (0 = unlimited); results may be truncated",
                session_default
            );
            (session_default, true)
        }
    };

    ResourceQuery {
        fields,
        filter,
        limit,
        used_default,
    }
}
