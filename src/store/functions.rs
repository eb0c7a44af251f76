//! SQL functions registered on the SQLite connection when spatial support is on.

use rusqlite::{Connection, functions::FunctionFlags};

use crate::{errors::SpatioGraphError, spatial};

/// `st_buffer_intersects(geometry_wkt, query_wkt, distance_m)`: envelope
/// intersection of `geometry_wkt` with `query_wkt` buffered by `distance_m`
/// metres. A `NULL` geometry never matches.
pub const BUFFER_INTERSECTS: &str = "st_buffer_intersects";

pub fn register_spatial_functions(conn: &Connection) -> Result<(), SpatioGraphError> {
    conn.create_scalar_function(
        BUFFER_INTERSECTS,
        3,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let geometry: Option<String> = ctx.get(0)?;
            let query: String = ctx.get(1)?;
            let distance_m: f64 = ctx.get(2)?;
            let Some(geometry) = geometry else {
                return Ok(false);
            };
            spatial::buffered_intersects(&geometry, &query, distance_m)
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))
        },
    )
    .map_err(|e| SpatioGraphError::connection(e.to_string()))
}
