//! Resource Fetcher
//!
//! Fetches resources from the REST API. Collection endpoints answer in one of two
//! shapes: an array of full objects, or an array of hrefs that each need a
//! follow-up GET. The shape is decided once per response, from the data itself.

use super::filter::FilterClause;
use super::query::{assemble, encode_params, ResourceQuery};
use crate::error::{ItemError, Result, XoError};
use crate::xo::decode;
use crate::xo::href::ResourceRef;
use crate::xo::session::Session;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};

/// One resource as decoded from the wire, keyed by the server's field names
pub type RawResourceRecord = Map<String, Value>;

/// Lazy sequence of records; per-item failures do not end the stream
pub type RecordStream<'a> = BoxStream<'a, std::result::Result<RawResourceRecord, ItemError>>;

/// One element of a collection response, `Err` when it fits neither shape
pub type Entry<T> = std::result::Result<T, ItemError>;

/// Shape of a collection response.
///
/// Entries keep the position they had in the server's array, including the
/// ones rejected during classification.
#[derive(Debug)]
pub enum CollectionShape {
    Inline(Vec<Entry<RawResourceRecord>>),
    References(Vec<Entry<String>>),
}

impl CollectionShape {
    /// Decide the shape of a decoded collection body.
    ///
    /// The first element picks the shape; elements of another kind are rejected
    /// individually, in place.
    pub fn classify(value: Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(XoError::Decode(format!(
                "expected an array of resources, got {}",
                kind(&value)
            )));
        };

        let by_reference = matches!(items.first(), Some(Value::String(_)));
        if by_reference {
            let entries = items
                .into_iter()
                .map(|item| match item {
                    Value::String(href) => Ok(href),
                    other => Err(misplaced(other)),
                })
                .collect();
            Ok(Self::References(entries))
        } else {
            let entries = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record),
                    other => Err(misplaced(other)),
                })
                .collect();
            Ok(Self::Inline(entries))
        }
    }

    /// Number of entries, rejected ones included
    pub fn len(&self) -> usize {
        match self {
            Self::Inline(entries) => entries.len(),
            Self::References(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries that fit neither shape
    pub fn rejected(&self) -> usize {
        match self {
            Self::Inline(entries) => entries.iter().filter(|e| e.is_err()).count(),
            Self::References(entries) => entries.iter().filter(|e| e.is_err()).count(),
        }
    }

    fn truncate(&mut self, cap: usize) {
        match self {
            Self::Inline(entries) => entries.truncate(cap),
            Self::References(entries) => entries.truncate(cap),
        }
    }
}

fn misplaced(item: Value) -> ItemError {
    ItemError {
        source: XoError::Decode(format!("unexpected {} in collection", kind(&item))),
        reference: item.to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn fields_params<S: AsRef<str>>(fields: &[S]) -> Vec<(&'static str, String)> {
    if fields.is_empty() {
        return Vec::new();
    }
    let joined: Vec<&str> = fields.iter().map(|f| f.as_ref()).collect();
    vec![("fields", joined.join(","))]
}

/// Fetch a single resource by identifier
pub async fn fetch_one<S: AsRef<str>>(
    session: &Session,
    collection: &str,
    id: &str,
    fields: &[S],
) -> Result<RawResourceRecord> {
    let connection = session.connection()?;

    let url = format!(
        "{}{}",
        connection.api_url(&format!("{}/{}", collection, urlencoding::encode(id))),
        encode_params(&fields_params(fields))
    );

    let body = connection.http().get(&url, connection.credential()).await?;
    let not_found = || XoError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    };

    if body.trim().is_empty() {
        return Err(not_found());
    }

    match decode::decode(&body)? {
        Value::Object(record) => Ok(record),
        Value::Null => Err(not_found()),
        other => Err(XoError::Decode(format!(
            "expected an object for {}/{}, got {}",
            collection,
            id,
            kind(&other)
        ))),
    }
}

/// Fetch a collection.
///
/// The initial request fails as a whole; afterwards each element is delivered
/// or reported on its own. The query limit is re-applied client-side because
/// not every endpoint honours it.
pub async fn fetch_many<'a>(
    session: &'a Session,
    collection: &'a str,
    query: &ResourceQuery,
) -> Result<RecordStream<'a>> {
    let connection = session.connection()?;

    let url = format!("{}{}", connection.api_url(collection), query.query_string());
    let body = connection.http().get(&url, connection.credential()).await?;
    let mut shape = CollectionShape::classify(decode::decode(&body)?)?;

    if let Some(cap) = query.cap() {
        if shape.len() > cap {
            tracing::debug!(
                "{} returned {} items for limit {}, truncating",
                collection,
                shape.len(),
                cap
            );
        }
        shape.truncate(cap);
    }

    let records: RecordStream<'a> = match shape {
        CollectionShape::Inline(entries) => {
            tracing::debug!("{}: {} inline records", collection, entries.len());
            stream::iter(entries.into_iter().map(move |entry| {
                if let Err(failure) = &entry {
                    tracing::warn!("Skipping malformed item in {}: {}", collection, failure);
                }
                entry
            }))
            .boxed()
        }
        CollectionShape::References(entries) => {
            tracing::debug!("{}: {} references to resolve", collection, entries.len());
            let fields = query.fields.clone();
            stream::iter(entries)
                .then(move |entry| {
                    let fields = fields.clone();
                    async move {
                        let reference = match entry {
                            Ok(reference) => reference,
                            Err(failure) => {
                                tracing::warn!("Skipping malformed item in {}: {}", collection, failure);
                                return Err(failure);
                            }
                        };
                        let fetched = fetch_referenced(session, collection, &reference, &fields).await;
                        fetched.map_err(|source| {
                            tracing::warn!("Failed to fetch {}: {}", reference, source);
                            ItemError { reference, source }
                        })
                    }
                })
                .boxed()
        }
    };

    Ok(records)
}

/// Fetch the resource an href points at, from the collection named in the href
async fn fetch_referenced(
    session: &Session,
    collection: &str,
    reference: &str,
    fields: &[String],
) -> Result<RawResourceRecord> {
    let target = ResourceRef::parse(reference)?;
    if target.collection != collection {
        tracing::debug!("{} listed {} from {}", collection, target.id, target.collection);
    }
    fetch_one(session, &target.collection, &target.id, fields).await
}

/// Assemble a query against the session defaults and fetch it
pub async fn query<'a, S: AsRef<str>>(
    session: &'a Session,
    collection: &'a str,
    fields: &[S],
    clauses: &[FilterClause],
    limit: Option<u32>,
) -> Result<RecordStream<'a>> {
    session.connection()?;
    let query = assemble(fields, clauses, limit, session.default_limit());
    fetch_many(session, collection, &query).await
}

/// Records and per-item failures of a drained collection fetch
#[derive(Debug, Default)]
pub struct FetchReport {
    pub records: Vec<RawResourceRecord>,
    pub failures: Vec<ItemError>,
}

impl FetchReport {
    /// Drain a record stream, keeping successes and failures apart
    pub async fn collect(mut stream: RecordStream<'_>) -> Self {
        let mut report = Self::default();
        while let Some(item) = stream.next().await {
            match item {
                Ok(record) => report.records.push(record),
                Err(failure) => report.failures.push(failure),
            }
        }
        report
    }
}

/// Fetch a collection and collect the whole result
pub async fn fetch_report(
    session: &Session,
    collection: &str,
    query: &ResourceQuery,
) -> Result<FetchReport> {
    let stream = fetch_many(session, collection, query).await?;
    Ok(FetchReport::collect(stream).await)
}

/// Extract a value from a record using a dot-notation path
pub fn extract_json_value(record: &RawResourceRecord, path: &str) -> Option<Value> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;

    for part in parts {
        current = match part.parse::<usize>() {
            Ok(idx) => current.get(idx)?,
            Err(_) => current.get(part)?,
        };
    }

    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_inline() {
        let shape = CollectionShape::classify(json!([{"uuid": "a"}, {"uuid": "b"}])).unwrap();
        assert_eq!(shape.rejected(), 0);
        match shape {
            CollectionShape::Inline(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[1].as_ref().unwrap()["uuid"], "b");
            }
            other => panic!("expected inline, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_references() {
        let shape = CollectionShape::classify(json!(["/rest/v0/vms/a", "/rest/v0/vms/b"])).unwrap();
        let CollectionShape::References(entries) = shape else {
            panic!("expected references");
        };
        let hrefs: Vec<&str> = entries.iter().map(|e| e.as_ref().unwrap().as_str()).collect();
        assert_eq!(hrefs, ["/rest/v0/vms/a", "/rest/v0/vms/b"]);
    }

    #[test]
    fn test_classify_empty_is_inline() {
        let shape = CollectionShape::classify(json!([])).unwrap();
        assert!(shape.is_empty());
        assert!(matches!(shape, CollectionShape::Inline(_)));
    }

    #[test]
    fn test_classify_rejects_mixed_items_in_place() {
        let shape = CollectionShape::classify(json!(["/rest/v0/vms/a", {"uuid": "b"}, 3])).unwrap();
        assert_eq!(shape.len(), 3);
        assert_eq!(shape.rejected(), 2);

        let CollectionShape::References(entries) = shape else {
            panic!("expected references");
        };
        assert!(entries[0].is_ok());
        match &entries[1] {
            Err(failure) => assert!(matches!(failure.source, XoError::Decode(_))),
            Ok(href) => panic!("object accepted as href {}", href),
        }
        assert_eq!(entries[2].as_ref().unwrap_err().reference, "3");
    }

    #[test]
    fn test_classify_non_array_fails() {
        assert!(matches!(
            CollectionShape::classify(json!({"uuid": "a"})),
            Err(XoError::Decode(_))
        ));
    }

    #[test]
    fn test_truncate_counts_rejected_entries() {
        let mut shape = CollectionShape::classify(json!(["/rest/v0/vms/a", 7, "/rest/v0/vms/b"])).unwrap();
        shape.truncate(2);
        assert_eq!(shape.len(), 2);
        assert_eq!(shape.rejected(), 1);
    }

    #[test]
    fn test_extract_json_value() {
        let record = json!({"uuid": "a", "CPUs": {"max": 4}, "VIFs": ["v1", "v2"]});
        let Value::Object(record) = record else {
            unreachable!()
        };
        assert_eq!(extract_json_value(&record, "CPUs.max"), Some(json!(4)));
        assert_eq!(extract_json_value(&record, "VIFs.1"), Some(json!("v2")));
        assert_eq!(extract_json_value(&record, "missing.path"), None);
    }

    #[tokio::test]
    async fn test_fetch_without_session_is_not_connected() {
        let session = Session::new();
        let result = fetch_one(&session, "vms", "x", &["uuid"]).await;
        assert!(matches!(result, Err(XoError::NotConnected)));

        let empty: [&str; 0] = [];
        let result = query(&session, "vms", &empty, &[], None).await;
        assert!(matches!(result, Err(XoError::NotConnected)));
    }
}
