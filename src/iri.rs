//! Namespaced identifiers for store individuals, classes and properties.
//!
//! Every identifier is a full IRI string. Short names supplied by callers
//! (`"region-7"`) are resolved against the engine prefix; identifiers that
//! are already absolute pass through unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    pub fn new(prefix: &str, local: &str) -> Self {
        Iri(format!("{prefix}{local}"))
    }

    pub fn from_absolute<T: Into<String>>(iri: T) -> Self {
        Iri(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local name after the last `#` or `/`, or the whole string if neither occurs.
    pub fn local_name(&self) -> &str {
        let s = self.0.as_str();
        match s.rfind('#').or_else(|| s.rfind('/')) {
            Some(idx) => &s[idx + 1..],
            None => s,
        }
    }

    /// Local name relative to `prefix`, or `None` for identifiers outside
    /// that namespace.
    pub fn local_name_in<'a>(&'a self, prefix: &str) -> Option<&'a str> {
        match self.0.strip_prefix(prefix) {
            Some(local) if !prefix.is_empty() && !local.is_empty() => Some(local),
            _ => None,
        }
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Iri> for String {
    fn from(iri: Iri) -> Self {
        iri.0
    }
}

impl AsRef<str> for Iri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolves a caller-supplied identifier against `prefix`.
pub fn parse_string_to_iri(prefix: &str, id: &str) -> Iri {
    if id.contains("://") || id.starts_with(prefix) {
        Iri::from_absolute(id)
    } else {
        Iri::new(prefix, id)
    }
}

/// Deterministic identifier of the relation linking `individual` to `collection`.
///
/// Produces `{prefix}relation:{collection}:{individual}`. Identifiers inside
/// `prefix` contribute their local name; identifiers outside it contribute
/// their full text behind a `~` marker. `%`, `:` and `~` are percent-escaped
/// in both forms, so distinct pairs never share a relation identifier and the
/// same pair always yields the same one.
pub fn relation_iri(prefix: &str, collection: &Iri, individual: &Iri) -> Iri {
    Iri::new(
        prefix,
        &format!(
            "relation:{}:{}",
            relation_component(prefix, collection),
            relation_component(prefix, individual),
        ),
    )
}

fn relation_component(prefix: &str, iri: &Iri) -> String {
    match iri.local_name_in(prefix) {
        Some(local) => escape_component(local),
        None => format!("~{}", escape_component(iri.as_str())),
    }
}

fn escape_component(text: &str) -> String {
    text.replace('%', "%25")
        .replace(':', "%3A")
        .replace('~', "%7E")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "http://spatiograph.dev/ontology#";

    #[test]
    fn short_names_resolve_against_prefix() {
        let iri = parse_string_to_iri(PREFIX, "region-7");
        assert_eq!(iri.as_str(), "http://spatiograph.dev/ontology#region-7");
        assert_eq!(iri.local_name(), "region-7");
    }

    #[test]
    fn absolute_identifiers_pass_through() {
        let iri = parse_string_to_iri(PREFIX, "http://other.org/things/geo-42");
        assert_eq!(iri.as_str(), "http://other.org/things/geo-42");
        assert_eq!(iri.local_name(), "geo-42");

        let prefixed = parse_string_to_iri(PREFIX, "http://spatiograph.dev/ontology#geo-42");
        assert_eq!(prefixed, parse_string_to_iri(PREFIX, "geo-42"));
    }

    #[test]
    fn relation_iri_is_stable() {
        let collection = parse_string_to_iri(PREFIX, "region-7");
        let individual = parse_string_to_iri(PREFIX, "geo-42");
        let first = relation_iri(PREFIX, &collection, &individual);
        let second = relation_iri(PREFIX, &collection, &individual);
        assert_eq!(first, second);
        assert_eq!(
            first.as_str(),
            "http://spatiograph.dev/ontology#relation:region-7:geo-42"
        );
    }

    #[test]
    fn relation_iri_separates_colon_bearing_names() {
        let a = relation_iri(
            PREFIX,
            &parse_string_to_iri(PREFIX, "a:b"),
            &parse_string_to_iri(PREFIX, "c"),
        );
        let b = relation_iri(
            PREFIX,
            &parse_string_to_iri(PREFIX, "a"),
            &parse_string_to_iri(PREFIX, "b:c"),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn relation_iri_keeps_foreign_namespaces_apart() {
        let collection = parse_string_to_iri(PREFIX, "c");
        let a = relation_iri(PREFIX, &collection, &Iri::from_absolute("http://a.org/x#geo"));
        let b = relation_iri(PREFIX, &collection, &Iri::from_absolute("http://b.org/y#geo"));
        let local = relation_iri(PREFIX, &collection, &parse_string_to_iri(PREFIX, "geo"));
        assert_ne!(a, b);
        assert_ne!(a, local);
        assert_eq!(
            a.as_str(),
            "http://spatiograph.dev/ontology#relation:c:~http%3A//a.org/x#geo"
        );
    }
}
