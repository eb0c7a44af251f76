//! SQL compiler for collection queries over the triple schema.
//!
//! Every builder is a pure function of its arguments: it performs no I/O and
//! reports predicates the store cannot evaluate (spatial intersection on a
//! store without the spatial functions) as
//! [`SpatioGraphError::UnsupportedFeature`]. Identifiers and literals are
//! embedded as quoted SQL strings.
//!
//! Result bindings:
//! - collection retrieval: `collection`, `individual`
//! - temporal-spatial intersection: `collection`
//! - collection object retrieval: `individual`
//! - adjacency: `collection`

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::{
    errors::{Result, SpatioGraphError},
    iri::Iri,
    spatial::BufferedGeometry,
    store::{StoreCapabilities, functions::BUFFER_INTERSECTS},
    temporal::format_date_time,
    vocabulary::{
        ADJACENCY_PROPERTIES, AS_WKT, DB_FROM, DB_TO, RELATED_TO, RELATION_OF, RELATION_STRENGTH,
        VALID_FROM, VALID_TO,
    },
};

#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    capabilities: StoreCapabilities,
}

impl QueryBuilder {
    pub fn new(capabilities: StoreCapabilities) -> Self {
        Self { capabilities }
    }

    /// Collections `individual` belongs to (optionally only `collection`),
    /// with every member of those collections. Both the anchoring relation and
    /// each member relation must reach `strength`.
    pub fn build_collection_retrieval_query(
        &self,
        individual: &Iri,
        collection: Option<&Iri>,
        strength: f64,
    ) -> Result<String> {
        let strength = number(strength)?;
        let mut sql = format!(
            "SELECT member_to.object AS collection, member_of.object AS individual
FROM object_properties AS anchor_of
JOIN object_properties AS anchor_to
  ON anchor_to.subject = anchor_of.subject AND anchor_to.property = {related_to}
JOIN data_properties AS anchor_strength
  ON anchor_strength.subject = anchor_of.subject AND anchor_strength.property = {strength_property}
JOIN object_properties AS member_to
  ON member_to.object = anchor_to.object AND member_to.property = {related_to}
JOIN object_properties AS member_of
  ON member_of.subject = member_to.subject AND member_of.property = {relation_of}
JOIN data_properties AS member_strength
  ON member_strength.subject = member_to.subject AND member_strength.property = {strength_property}
WHERE anchor_of.property = {relation_of}
  AND anchor_of.object = {individual}
  AND CAST(anchor_strength.value AS REAL) >= {strength}
  AND CAST(member_strength.value AS REAL) >= {strength}",
            related_to = quote(RELATED_TO),
            relation_of = quote(RELATION_OF),
            strength_property = quote(RELATION_STRENGTH),
            individual = quote(individual.as_str()),
        );
        if let Some(collection) = collection {
            let _ = write!(sql, "\n  AND anchor_to.object = {}", quote(collection.as_str()));
        }
        sql.push_str("\nORDER BY collection, individual");
        Ok(sql)
    }

    /// Collections holding a member whose geometry intersects `buffer`, valid
    /// at `valid_at` (when given) and recorded at `db_at`.
    pub fn build_temporal_spatial_collection_intersection(
        &self,
        buffer: &BufferedGeometry,
        strength: f64,
        valid_at: Option<DateTime<Utc>>,
        db_at: DateTime<Utc>,
    ) -> Result<String> {
        let intersects = self.intersects_predicate("geom", buffer)?;
        let strength = number(strength)?;
        let mut sql = format!(
            "SELECT DISTINCT rel_to.object AS collection
FROM object_properties AS rel_to
JOIN object_properties AS rel_of
  ON rel_of.subject = rel_to.subject AND rel_of.property = {relation_of}
JOIN data_properties AS strength
  ON strength.subject = rel_to.subject AND strength.property = {strength_property}
JOIN data_properties AS geom
  ON geom.subject = rel_of.object AND geom.property = {as_wkt}
{validity}WHERE rel_to.property = {related_to}
  AND CAST(strength.value AS REAL) >= {strength}
  AND {intersects}",
            relation_of = quote(RELATION_OF),
            strength_property = quote(RELATION_STRENGTH),
            as_wkt = quote(AS_WKT),
            related_to = quote(RELATED_TO),
            validity = interval_joins(valid_at.is_some()),
        );
        if let Some(valid_at) = valid_at {
            sql.push_str(&interval_filter("valid_from", "valid_to", &valid_at));
        }
        sql.push_str(&interval_filter("db_from", "db_to", &db_at));
        sql.push_str("\nORDER BY collection");
        Ok(sql)
    }

    /// Members of `collection` asserted to be of `class`, optionally
    /// restricted to those intersecting `spatial`.
    pub fn build_collection_object_retrieval(
        &self,
        class: &Iri,
        collection: &Iri,
        strength: f64,
        spatial: Option<&BufferedGeometry>,
    ) -> Result<String> {
        let intersects = match spatial {
            Some(buffer) => Some(self.intersects_predicate("geom", buffer)?),
            None => None,
        };
        let strength = number(strength)?;
        let mut sql = format!(
            "SELECT DISTINCT rel_of.object AS individual
FROM object_properties AS rel_to
JOIN object_properties AS rel_of
  ON rel_of.subject = rel_to.subject AND rel_of.property = {relation_of}
JOIN data_properties AS strength
  ON strength.subject = rel_to.subject AND strength.property = {strength_property}
JOIN class_assertions AS member_class
  ON member_class.individual = rel_of.object AND member_class.class = {class}
",
            relation_of = quote(RELATION_OF),
            strength_property = quote(RELATION_STRENGTH),
            class = quote(class.as_str()),
        );
        if intersects.is_some() {
            let _ = writeln!(
                sql,
                "JOIN data_properties AS geom\n  ON geom.subject = rel_of.object AND geom.property = {}",
                quote(AS_WKT)
            );
        }
        let _ = write!(
            sql,
            "WHERE rel_to.property = {}\n  AND rel_to.object = {}\n  AND CAST(strength.value AS REAL) >= {}",
            quote(RELATED_TO),
            quote(collection.as_str()),
            strength,
        );
        if let Some(intersects) = intersects {
            let _ = write!(sql, "\n  AND {intersects}");
        }
        sql.push_str("\nORDER BY individual");
        Ok(sql)
    }

    /// Collections other than `collection` holding a member that a member of
    /// `collection` points to through an adjacency edge. Edges are directed.
    pub fn build_adjacent_collection_query(&self, collection: &Iri, strength: f64) -> Result<String> {
        let strength = number(strength)?;
        let adjacency = ADJACENCY_PROPERTIES
            .iter()
            .map(|p| quote(p))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "SELECT DISTINCT other_to.object AS collection
FROM object_properties AS anchor_to
JOIN object_properties AS anchor_of
  ON anchor_of.subject = anchor_to.subject AND anchor_of.property = {relation_of}
JOIN data_properties AS anchor_strength
  ON anchor_strength.subject = anchor_to.subject AND anchor_strength.property = {strength_property}
JOIN object_properties AS link
  ON link.subject = anchor_of.object AND link.property IN ({adjacency})
JOIN object_properties AS other_of
  ON other_of.object = link.object AND other_of.property = {relation_of}
JOIN object_properties AS other_to
  ON other_to.subject = other_of.subject AND other_to.property = {related_to}
JOIN data_properties AS other_strength
  ON other_strength.subject = other_of.subject AND other_strength.property = {strength_property}
WHERE anchor_to.property = {related_to}
  AND anchor_to.object = {collection}
  AND other_to.object <> {collection}
  AND CAST(anchor_strength.value AS REAL) >= {strength}
  AND CAST(other_strength.value AS REAL) >= {strength}
ORDER BY collection",
            relation_of = quote(RELATION_OF),
            related_to = quote(RELATED_TO),
            strength_property = quote(RELATION_STRENGTH),
            collection = quote(collection.as_str()),
        ))
    }

    fn intersects_predicate(&self, alias: &str, buffer: &BufferedGeometry) -> Result<String> {
        if !self.capabilities.spatial {
            return Err(SpatioGraphError::unsupported(
                "store does not support spatial intersection",
            ));
        }
        Ok(format!(
            "{BUFFER_INTERSECTS}({alias}.value, {}, {})",
            quote(&buffer.wkt),
            number(buffer.distance_m)?,
        ))
    }
}

fn interval_joins(with_validity: bool) -> String {
    let mut joins = String::new();
    let mut join = |alias: &str, property: &str| {
        let _ = writeln!(
            joins,
            "LEFT JOIN data_properties AS {alias}\n  ON {alias}.subject = rel_of.object AND {alias}.property = {}",
            quote(property)
        );
    };
    if with_validity {
        join("valid_from", VALID_FROM);
        join("valid_to", VALID_TO);
    }
    join("db_from", DB_FROM);
    join("db_to", DB_TO);
    joins
}

/// `[from, to)` containment; a missing bound is open.
fn interval_filter(from: &str, to: &str, at: &DateTime<Utc>) -> String {
    let at = quote(&format_date_time(at));
    format!(
        "\n  AND ({from}.value IS NULL OR {from}.value <= {at})\n  AND ({to}.value IS NULL OR {to}.value > {at})"
    )
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn number(value: f64) -> Result<String> {
    if value.is_finite() {
        Ok(value.to_string())
    } else {
        Err(SpatioGraphError::invalid_input(format!(
            "expected a finite number, got {value}"
        )))
    }
}
