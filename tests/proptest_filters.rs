//! Property-based tests using proptest
//!
//! These tests verify filter rendering, query assembly, href resolution and
//! body decoding using randomized inputs.

use proptest::prelude::*;
use serde_json::{json, Value};
use xoctl::resource::{
    build_filter, extract_json_value, CollectionShape, FilterClause, ResourceQuery, Separator,
};
use xoctl::xo::{decode, href};
use xoctl::XoError;

/// Non-empty filter-safe word
fn arb_word() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}"
}

fn arb_separator() -> impl Strategy<Value = Separator> {
    prop_oneof![Just(Separator::Pipe), Just(Separator::Space)]
}

/// Clauses that carry nothing: empty values or an empty field
fn arb_empty_clause() -> impl Strategy<Value = FilterClause> {
    (arb_word(), arb_separator()).prop_flat_map(|(field, separator)| {
        prop_oneof![
            Just(FilterClause::equals(&field, "")),
            Just(FilterClause::contains(&field, "")),
            Just(FilterClause::any_of::<&str>(&field, &[], separator)),
            Just(FilterClause::any_of(&field, &["", ""], separator)),
            Just(FilterClause::all_of::<&str>(&field, &[])),
            Just(FilterClause::equals("", "value")),
        ]
    })
}

mod filter_tests {
    use super::*;

    proptest! {
        /// Clauses without values never produce a filter
        #[test]
        fn empty_clauses_build_nothing(clauses in prop::collection::vec(arb_empty_clause(), 0..8)) {
            let filter = build_filter(&clauses);
            prop_assert!(filter.is_none());

            let query = ResourceQuery::new(vec!["uuid".into()], filter, 10);
            prop_assert!(query.params().iter().all(|(name, _)| *name != "filter"));
        }

        /// Disjunction keeps every value, in order, with the chosen separator
        #[test]
        fn any_of_joins_values(
            field in arb_word(),
            values in prop::collection::vec(arb_word(), 1..6),
            separator in arb_separator(),
        ) {
            let rendered = FilterClause::any_of(&field, &values, separator).render().unwrap();
            let expected = format!("{}:({})", field, values.join(separator.as_str()));
            prop_assert_eq!(rendered, expected);
        }

        /// Empty clauses mixed in do not change the rendered filter
        #[test]
        fn empty_clauses_are_ignored(
            field in arb_word(),
            value in arb_word(),
            noise in prop::collection::vec(arb_empty_clause(), 0..4),
        ) {
            let clause = FilterClause::equals(&field, &value);
            let mut clauses = noise.clone();
            clauses.push(clause.clone());
            clauses.extend(noise);

            prop_assert_eq!(build_filter(&clauses), build_filter(&[clause]));
        }

        /// Scoped clauses always carry the `$` prefix
        #[test]
        fn scoped_clause_prefix(parent in arb_word(), uuid in "[0-9a-f]{8}-[0-9a-f]{4}") {
            let rendered = FilterClause::scoped(&parent, &uuid).render().unwrap();
            prop_assert_eq!(rendered, format!("${}:{}", parent, uuid));
        }
    }
}

mod query_tests {
    use super::*;

    proptest! {
        /// Limit 0 is never sent; any other limit is sent verbatim
        #[test]
        fn limit_parameter(limit in 0u32..10_000) {
            let query = ResourceQuery::new(vec!["uuid".into()], None, limit);
            let sent = query
                .params()
                .into_iter()
                .find(|(name, _)| *name == "limit")
                .map(|(_, v)| v);

            if limit == 0 {
                prop_assert!(sent.is_none());
                prop_assert!(query.cap().is_none());
            } else {
                prop_assert_eq!(sent, Some(limit.to_string()));
                prop_assert_eq!(query.cap(), Some(limit as usize));
            }
        }

        /// The query string is either empty or starts with `?`
        #[test]
        fn query_string_shape(
            fields in prop::collection::vec(arb_word(), 0..4),
            limit in 0u32..100,
        ) {
            let qs = ResourceQuery::new(fields.clone(), None, limit).query_string();
            if fields.is_empty() && limit == 0 {
                prop_assert!(qs.is_empty());
            } else {
                prop_assert!(qs.starts_with('?'));
            }
        }
    }
}

mod href_tests {
    use super::*;

    proptest! {
        /// Well-formed hrefs resolve to their last segment
        #[test]
        fn resolve_extracts_id(
            host in prop_oneof![Just(String::new()), Just("https://xo.example".to_string())],
            collection in "[a-z][a-z-]{0,15}",
            id in "[A-Za-z0-9-]{1,36}",
        ) {
            let href = format!("{}/rest/v0/{}/{}", host, collection, id);
            prop_assert_eq!(href::resolve(&href).unwrap(), id);
        }

        /// Strings without the reference shape are rejected
        #[test]
        fn resolve_rejects_other_strings(s in "[a-z0-9 ./]{0,40}") {
            prop_assume!(!s.contains("/rest/v0/"));
            prop_assert!(matches!(href::resolve(&s), Err(XoError::HrefFormat(_))));
        }

        /// Extra path segments are rejected
        #[test]
        fn resolve_rejects_nested_paths(
            collection in "[a-z]{1,10}",
            id in "[a-z0-9]{1,10}",
            tail in "[a-z]{1,10}",
        ) {
            let href = format!("/rest/v0/{}/{}/{}", collection, id, tail);
            prop_assert!(href::resolve(&href).is_err());
        }
    }
}

mod decode_tests {
    use super::*;

    proptest! {
        /// Duplicate keys collapse to the last occurrence
        #[test]
        fn duplicate_keys_last_write_wins(
            key in arb_word(),
            values in prop::collection::vec(any::<i64>(), 2..5),
        ) {
            let members: Vec<String> = values
                .iter()
                .map(|v| format!("\"{}\":{}", key, v))
                .collect();
            let body = format!("{{{}}}", members.join(","));

            let decoded = decode::decode(&body).unwrap();
            let last = *values.last().unwrap();
            prop_assert_eq!(&decoded[key.as_str()], &json!(last));
        }

        /// Bodies without duplicates decode exactly like serde_json
        #[test]
        fn unique_keys_match_serde_json(
            entries in prop::collection::btree_map(arb_word(), any::<i32>(), 0..8),
        ) {
            let body = serde_json::to_string(&entries).unwrap();
            let expected: Value = serde_json::from_str(&body).unwrap();
            prop_assert_eq!(decode::decode(&body).unwrap(), expected);
        }

        /// Every element of a collection keeps its slot, accepted or rejected
        #[test]
        fn classify_accounts_for_every_element(
            items in prop::collection::vec(
                prop_oneof![
                    arb_word().prop_map(|id| json!(format!("/rest/v0/vms/{}", id))),
                    arb_word().prop_map(|id| json!({"uuid": id})),
                    any::<i32>().prop_map(|n| json!(n)),
                ],
                0..20,
            ),
        ) {
            let total = items.len();
            let shape = CollectionShape::classify(Value::Array(items)).unwrap();
            prop_assert_eq!(shape.len(), total);
            prop_assert!(shape.rejected() <= total);
        }

        /// Top-level paths read back the stored value
        #[test]
        fn extract_top_level(key in arb_word(), value in any::<i64>()) {
            prop_assume!(key != "missing");
            let mut record = serde_json::Map::new();
            record.insert(key.clone(), json!({"inner": value}));

            prop_assert_eq!(
                extract_json_value(&record, &format!("{}.inner", key)),
                Some(json!(value))
            );
            prop_assert_eq!(extract_json_value(&record, "missing"), None);
        }
    }
}
