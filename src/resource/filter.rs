//! Filter expression builder
//!
//! Renders clauses into the server's filter grammar: whitespace-separated
//! clauses are ANDed, `field:(a|b)` is an OR over values, `field:(a&b)` an AND.
//! Values containing whitespace are wrapped in double quotes. Embedded quotes
//! are not escaped; callers must not pass them.

use serde::Deserialize;

/// Value separator inside a disjunction.
///
/// The remote grammar is not uniform across fields, so the separator is chosen
/// per field (see the resource registry) rather than inferred here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Separator {
    #[default]
    Pipe,
    Space,
}

impl Separator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pipe => "|",
            Self::Space => " ",
        }
    }
}

/// How a clause matches its field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `field:value`
    Equals(String),
    /// `field:/value/`
    Contains(String),
    /// `field:(a|b)` or `field:(a b)`
    AnyOf {
        values: Vec<String>,
        separator: Separator,
    },
    /// `field:(a&b)`
    AllOf(Vec<String>),
}

/// One predicate contributed to the combined filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub field: String,
    pub predicate: Predicate,
    pub scope_prefix: Option<String>,
}

impl FilterClause {
    pub fn new(field: &str, predicate: Predicate) -> Self {
        Self {
            field: field.to_string(),
            predicate,
            scope_prefix: None,
        }
    }

    pub fn equals(field: &str, value: &str) -> Self {
        Self::new(field, Predicate::Equals(value.to_string()))
    }

    pub fn contains(field: &str, value: &str) -> Self {
        Self::new(field, Predicate::Contains(value.to_string()))
    }

    pub fn any_of<S: AsRef<str>>(field: &str, values: &[S], separator: Separator) -> Self {
        Self::new(
            field,
            Predicate::AnyOf {
                values: values.iter().map(|v| v.as_ref().to_string()).collect(),
                separator,
            },
        )
    }

    pub fn all_of<S: AsRef<str>>(field: &str, values: &[S]) -> Self {
        Self::new(
            field,
            Predicate::AllOf(values.iter().map(|v| v.as_ref().to_string()).collect()),
        )
    }

    /// Restrict to resources belonging to a parent, e.g. `$pool:<uuid>`
    pub fn scoped(parent_field: &str, uuid: &str) -> Self {
        Self {
            scope_prefix: Some("$".to_string()),
            ..Self::equals(parent_field, uuid)
        }
    }

    /// Render this clause, or `None` if it has nothing to contribute
    pub fn render(&self) -> Option<String> {
        if self.field.is_empty() {
            return None;
        }

        let value = match &self.predicate {
            Predicate::Equals(v) if !v.is_empty() => quote(v),
            Predicate::Contains(v) if !v.is_empty() => format!("/{}/", v),
            Predicate::AnyOf { values, separator } => {
                group(values, separator.as_str())?
            }
            Predicate::AllOf(values) => group(values, "&")?,
            _ => return None,
        };

        let prefix = self.scope_prefix.as_deref().unwrap_or("");
        Some(format!("{}{}:{}", prefix, self.field, value))
    }
}

fn quote(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

fn group(values: &[String], separator: &str) -> Option<String> {
    let parts: Vec<String> = values
        .iter()
        .filter(|v| !v.is_empty())
        .map(|v| quote(v))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(format!("({})", parts.join(separator)))
    }
}

/// Combine clauses in order; `None` when no clause contributes anything
pub fn build(clauses: &[FilterClause]) -> Option<String> {
    let rendered: Vec<String> = clauses.iter().filter_map(FilterClause::render).collect();

    if rendered.is_empty() {
        None
    } else {
        Some(rendered.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_disjunction_with_pipe() {
        let clause = FilterClause::any_of("tags", &["prod", "db"], Separator::Pipe);
        assert_eq!(clause.render().as_deref(), Some("tags:(prod|db)"));
    }

    #[test]
    fn test_power_state_disjunction_with_space() {
        let clause = FilterClause::any_of("power_state", &["Running", "Paused"], Separator::Space);
        assert_eq!(clause.render().as_deref(), Some("power_state:(Running Paused)"));
    }

    #[test]
    fn test_conjunction_of_tags() {
        let clause = FilterClause::all_of("tags", &["prod", "web"]);
        assert_eq!(clause.render().as_deref(), Some("tags:(prod&web)"));
    }

    #[test]
    fn test_scoped_clause() {
        let clause = FilterClause::scoped("pool", "355ee47d-ff4c-4924-3db2-fd86ae629676");
        assert_eq!(
            clause.render().as_deref(),
            Some("$pool:355ee47d-ff4c-4924-3db2-fd86ae629676")
        );
    }

    #[test]
    fn test_values_with_spaces_are_quoted() {
        assert_eq!(
            FilterClause::equals("name_label", "web server").render().as_deref(),
            Some("name_label:\"web server\"")
        );
        assert_eq!(
            FilterClause::any_of("tags", &["a b", "c"], Separator::Pipe).render().as_deref(),
            Some("tags:(\"a b\"|c)")
        );
    }

    #[test]
    fn test_substring_clause() {
        assert_eq!(
            FilterClause::contains("name_label", "web").render().as_deref(),
            Some("name_label:/web/")
        );
    }

    #[test]
    fn test_clauses_are_joined_in_order() {
        let filter = build(&[
            FilterClause::equals("power_state", "Running"),
            FilterClause::scoped("pool", "p1"),
            FilterClause::any_of("tags", &["prod"], Separator::Pipe),
        ]);
        assert_eq!(filter.as_deref(), Some("power_state:Running $pool:p1 tags:(prod)"));
    }

    #[test]
    fn test_empty_clauses_contribute_nothing() {
        let empty: [&str; 0] = [];
        assert_eq!(build(&[]), None);
        assert_eq!(
            build(&[
                FilterClause::equals("name_label", ""),
                FilterClause::any_of("tags", &empty, Separator::Pipe),
                FilterClause::all_of("tags", &[""]),
                FilterClause::equals("", "x"),
            ]),
            None
        );
        assert_eq!(
            build(&[
                FilterClause::equals("name_label", ""),
                FilterClause::equals("power_state", "Halted"),
            ])
            .as_deref(),
            Some("power_state:Halted")
        );
    }
}
