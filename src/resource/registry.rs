//! Resource Registry - Load collection definitions from JSON
//!
//! Collection metadata (default fields, filter separators, scopes, actions) is
//! embedded at compile time so new collections need no code changes.

use super::fetcher::{extract_json_value, RawResourceRecord};
use super::filter::Separator;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[include_str!("../resources/xo.json")];

/// Action definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ActionDef {
    /// Verb as it appears in `/actions/<verb>`
    pub verb: String,
    pub display_name: String,
    /// Action cannot be undone or interrupts running workloads
    #[serde(default)]
    pub destructive: bool,
}

/// Collection definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    pub id_field: String,
    /// Dot-notation path of the human-readable name
    pub name_field: String,
    #[serde(default)]
    pub default_fields: Vec<String>,
    /// Disjunction separator per field, as confirmed against the live API
    #[serde(default)]
    pub separators: HashMap<String, Separator>,
    /// Parent fields usable in `$field:<uuid>` clauses
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
}

impl ResourceDef {
    /// Separator for a disjunction on `field` (pipe unless configured otherwise)
    pub fn separator_for(&self, field: &str) -> Separator {
        self.separators.get(field).copied().unwrap_or_default()
    }

    pub fn action(&self, verb: &str) -> Option<&ActionDef> {
        self.actions.iter().find(|a| a.verb == verb)
    }

    /// Fields to request for an id-and-name listing
    pub fn summary_fields(&self) -> Vec<String> {
        let name_root = self.name_field.split('.').next().unwrap_or(&self.name_field);
        let mut fields = vec![self.id_field.clone()];
        if name_root != self.id_field {
            fields.push(name_root.to_string());
        }
        fields
    }

    /// Reduce a record to `{"id", "name"}`, `null` where a field is missing
    pub fn summarize(&self, record: &RawResourceRecord) -> Value {
        json!({
            "id": extract_json_value(record, &self.id_field),
            "name": extract_json_value(record, &self.name_field),
        })
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a collection definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get all collection keys, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    keys.sort_unstable();
    keys
}

/// Separator for a disjunction on `field` of `collection`
pub fn separator_for(collection: &str, field: &str) -> Separator {
    get_resource(collection)
        .map(|r| r.separator_for(field))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = get_registry();
        assert!(
            !registry.resources.is_empty(),
            "Registry should have resources"
        );
    }

    #[test]
    fn test_vms_resource_exists() {
        let resource = get_resource("vms").expect("vms should be registered");
        assert_eq!(resource.display_name, "VMs");
        assert_eq!(resource.id_field, "uuid");
        assert!(resource.default_fields.iter().any(|f| f == "power_state"));
        assert!(resource.action("start").is_some());
        assert!(resource.action("hard_shutdown").unwrap().destructive);
    }

    #[test]
    fn test_separators_are_per_field() {
        assert_eq!(separator_for("vms", "tags"), Separator::Pipe);
        assert_eq!(separator_for("vms", "power_state"), Separator::Space);
        assert_eq!(separator_for("vms", "name_label"), Separator::Pipe);
        assert_eq!(separator_for("unknown", "tags"), Separator::Pipe);
    }

    #[test]
    fn test_task_summary_reads_nested_name() {
        let tasks = get_resource("tasks").expect("tasks should be registered");
        assert_eq!(tasks.summary_fields(), ["id", "properties"]);

        let record = match json!({"id": "t1", "properties": {"name": "VM start"}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(tasks.summarize(&record), json!({"id": "t1", "name": "VM start"}));
    }

    #[test]
    fn test_summary_of_incomplete_record() {
        let vms = get_resource("vms").expect("vms should be registered");
        assert_eq!(vms.summary_fields(), ["uuid", "name_label"]);

        let record = match json!({"uuid": "v1"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(vms.summarize(&record), json!({"id": "v1", "name": null}));
    }

    #[test]
    fn test_get_all_resource_keys() {
        let keys = get_all_resource_keys();
        assert!(keys.contains(&"tasks"));
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
    }
}
