//! Resource references
//!
//! The server identifies resources with hrefs of the form
//! `.../rest/v0/<collection>/<id>`. Anything before the `/rest/v0/` marker is
//! ignored, so absolute URLs and relative paths resolve the same way.

use crate::error::{Result, XoError};
use std::fmt;

/// Path prefix shared by every REST resource
pub const API_PREFIX: &str = "/rest/v0";

const MARKER: &str = "/rest/v0/";

/// A parsed resource reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub collection: String,
    pub id: String,
}

impl ResourceRef {
    /// Parse an href into its collection and identifier
    pub fn parse(href: &str) -> Result<Self> {
        let malformed = || XoError::HrefFormat(href.to_string());

        let start = href.rfind(MARKER).ok_or_else(malformed)?;
        let rest = &href[start + MARKER.len()..];

        let mut segments = rest.split('/');
        let (Some(collection), Some(id), None) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(malformed());
        };

        if collection.is_empty() || id.is_empty() || id.contains(['?', '#']) {
            return Err(malformed());
        }

        Ok(Self {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    /// Relative path of this resource, e.g. `/rest/v0/vms/<id>`
    pub fn path(&self) -> String {
        format!("{}/{}/{}", API_PREFIX, self.collection, self.id)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Extract the resource identifier from an href
pub fn resolve(href: &str) -> Result<String> {
    ResourceRef::parse(href).map(|r| r.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve("/rest/v0/tasks/abc123").unwrap(), "abc123");
    }

    #[test]
    fn test_resolve_absolute() {
        let id = resolve("https://xo.example/rest/v0/vms/0b7a3c1e-2f1d-4d8e-9a57-6c2b1f9e0d11").unwrap();
        assert_eq!(id, "0b7a3c1e-2f1d-4d8e-9a57-6c2b1f9e0d11");
    }

    #[test]
    fn test_parse_keeps_collection() {
        let r = ResourceRef::parse("/rest/v0/vm-snapshots/s1").unwrap();
        assert_eq!(r.collection, "vm-snapshots");
        assert_eq!(r.id, "s1");
        assert_eq!(r.to_string(), "/rest/v0/vm-snapshots/s1");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "abc123",
            "/rest/v0/tasks",
            "/rest/v0/tasks/",
            "/rest/v0//abc",
            "/rest/v0/vms/abc/actions",
            "/rest/v1/vms/abc",
            "/rest/v0/tasks/abc?wait=result",
        ] {
            match resolve(bad) {
                Err(XoError::HrefFormat(s)) => assert_eq!(s, bad),
                other => panic!("expected HrefFormat for {:?}, got {:?}", bad, other),
            }
        }
    }
}
