//! Query-geometry shaping: buffer units and WKT envelopes.
//!
//! The engine never evaluates geometry itself. It normalises the buffer
//! distance into metres and hands the WKT to the query builder; the store's
//! SQL layer performs the intersection test (see
//! [`crate::store::functions`]), using the envelope helpers below.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SpatioGraphError};

/// Approximate length of one degree of latitude, in metres.
pub const METRES_PER_DEGREE: f64 = 111_320.0;

const GEOMETRY_KEYWORDS: [&str; 7] = [
    "POINT",
    "LINESTRING",
    "POLYGON",
    "MULTIPOINT",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "GEOMETRYCOLLECTION",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    #[default]
    Metre,
    Kilometre,
    Foot,
    Mile,
    NauticalMile,
}

impl LengthUnit {
    pub fn to_metres(&self, distance: f64) -> f64 {
        match self {
            LengthUnit::Metre => distance,
            LengthUnit::Kilometre => distance * 1_000.0,
            LengthUnit::Foot => distance * 0.3048,
            LengthUnit::Mile => distance * 1_609.344,
            LengthUnit::NauticalMile => distance * 1_852.0,
        }
    }
}

/// A query geometry together with its buffer distance in metres.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedGeometry {
    pub wkt: String,
    pub distance_m: f64,
}

impl BufferedGeometry {
    pub fn new(wkt: &str, distance: f64, unit: LengthUnit) -> Result<Self> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(SpatioGraphError::invalid_input(format!(
                "buffer distance must be a non-negative number, got {distance}"
            )));
        }
        Envelope::from_wkt(wkt)?;
        Ok(Self {
            wkt: wkt.trim().to_string(),
            distance_m: unit.to_metres(distance),
        })
    }

    pub fn unbuffered(wkt: &str) -> Result<Self> {
        Self::new(wkt, 0.0, LengthUnit::Metre)
    }
}

/// Axis-aligned bounding box of a WKT geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn from_wkt(wkt: &str) -> Result<Self> {
        let trimmed = wkt.trim();
        let upper = trimmed.to_ascii_uppercase();
        if !GEOMETRY_KEYWORDS.iter().any(|kw| upper.starts_with(kw)) {
            return Err(SpatioGraphError::invalid_input(format!(
                "unrecognised WKT geometry: {trimmed}"
            )));
        }
        let Some(open) = trimmed.find('(') else {
            return Err(SpatioGraphError::invalid_input(format!(
                "WKT geometry has no coordinates: {trimmed}"
            )));
        };
        if trimmed.matches('(').count() != trimmed.matches(')').count() {
            return Err(SpatioGraphError::invalid_input(format!(
                "unbalanced parentheses in WKT: {trimmed}"
            )));
        }

        let mut envelope: Option<Envelope> = None;
        let body = trimmed[open..].replace(['(', ')'], ",");
        for tuple in body.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let mut ordinates = tuple.split_whitespace();
            let (Some(x), Some(y)) = (ordinates.next(), ordinates.next()) else {
                return Err(SpatioGraphError::invalid_input(format!(
                    "malformed WKT coordinate '{tuple}'"
                )));
            };
            let x = parse_ordinate(x)?;
            let y = parse_ordinate(y)?;
            envelope = Some(match envelope {
                None => Envelope {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                },
                Some(env) => Envelope {
                    min_x: env.min_x.min(x),
                    min_y: env.min_y.min(y),
                    max_x: env.max_x.max(x),
                    max_y: env.max_y.max(y),
                },
            });
        }
        envelope.ok_or_else(|| {
            SpatioGraphError::invalid_input(format!("WKT geometry has no coordinates: {trimmed}"))
        })
    }

    pub fn expand_by(&self, amount: f64) -> Self {
        Envelope {
            min_x: self.min_x - amount,
            min_y: self.min_y - amount,
            max_x: self.max_x + amount,
            max_y: self.max_y + amount,
        }
    }

    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

fn parse_ordinate(token: &str) -> Result<f64> {
    token
        .parse::<f64>()
        .map_err(|_| SpatioGraphError::invalid_input(format!("invalid WKT ordinate '{token}'")))
}

/// Whether `geometry` intersects `query` expanded by `distance_m` metres.
pub fn buffered_intersects(geometry: &str, query: &str, distance_m: f64) -> Result<bool> {
    let target = Envelope::from_wkt(geometry)?;
    let search = Envelope::from_wkt(query)?.expand_by(distance_m / METRES_PER_DEGREE);
    Ok(search.intersects(&target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_envelope() {
        let env = Envelope::from_wkt("POLYGON ((0 0, 4 0, 4 3, 0 3, 0 0))").unwrap();
        assert_eq!(
            env,
            Envelope {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 4.0,
                max_y: 3.0
            }
        );
    }

    #[test]
    fn units_default_to_metres() {
        assert_eq!(LengthUnit::default(), LengthUnit::Metre);
        let geom = BufferedGeometry::new("POINT (1 1)", 2.0, LengthUnit::Kilometre).unwrap();
        assert_eq!(geom.distance_m, 2_000.0);
    }

    #[test]
    fn buffer_reaches_nearby_geometry() {
        // ~0.01 degrees apart, roughly 1.1 km
        let point = "POINT (10.00 10.00)";
        let other = "POINT (10.01 10.00)";
        assert!(!buffered_intersects(other, point, 500.0).unwrap());
        assert!(buffered_intersects(other, point, 1_500.0).unwrap());
    }

    #[test]
    fn malformed_wkt_is_rejected() {
        assert!(Envelope::from_wkt("CIRCLE (1 1)").is_err());
        assert!(Envelope::from_wkt("POINT EMPTY").is_err());
        assert!(Envelope::from_wkt("POINT (1 1").is_err());
        assert!(BufferedGeometry::new("POINT (1 1)", -3.0, LengthUnit::Metre).is_err());
    }
}
