//! Fixed ontology terms shared by the engine, the marshaller and the query builder.

use crate::iri::Iri;

pub const ONTOLOGY: &str = "http://spatiograph.dev/ontology#";

pub const COLLECTION_CLASS: &str = "http://spatiograph.dev/ontology#Collection";
pub const RELATION_CLASS: &str = "http://spatiograph.dev/ontology#Relation";

/// Relation → member individual.
pub const RELATION_OF: &str = "http://spatiograph.dev/ontology#relation_of";
/// Relation → collection.
pub const RELATED_TO: &str = "http://spatiograph.dev/ontology#related_to";
/// Collection → relation, inverse of [`RELATED_TO`].
pub const RELATED_BY: &str = "http://spatiograph.dev/ontology#related_by";
pub const RELATION_STRENGTH: &str = "http://spatiograph.dev/ontology#relation_strength";

pub const OBJECT_DATA: &str = "http://spatiograph.dev/ontology#object_data";
pub const VALID_FROM: &str = "http://spatiograph.dev/ontology#valid_from";
pub const VALID_TO: &str = "http://spatiograph.dev/ontology#valid_to";
pub const DB_FROM: &str = "http://spatiograph.dev/ontology#database_from";
pub const DB_TO: &str = "http://spatiograph.dev/ontology#database_to";
pub const AS_WKT: &str = "http://spatiograph.dev/ontology#as_wkt";

pub const SPATIAL_MEETS: &str = "http://spatiograph.dev/ontology#spatial_meets";
pub const SPATIAL_OVERLAPS: &str = "http://spatiograph.dev/ontology#spatial_overlaps";

/// Object properties that make the collections of their endpoints adjacent.
pub const ADJACENCY_PROPERTIES: [&str; 2] = [SPATIAL_MEETS, SPATIAL_OVERLAPS];

pub fn term(term: &str) -> Iri {
    Iri::from_absolute(term)
}
