use rusqlite::Connection;

use crate::errors::SpatioGraphError;

pub fn ensure_schema(conn: &Connection) -> Result<(), SpatioGraphError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS individuals (
            iri       TEXT PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS class_assertions (
            individual TEXT NOT NULL,
            class      TEXT NOT NULL,
            PRIMARY KEY (individual, class)
        );
        CREATE TABLE IF NOT EXISTS object_properties (
            subject   TEXT NOT NULL,
            property  TEXT NOT NULL,
            object    TEXT NOT NULL,
            PRIMARY KEY (subject, property, object)
        );
        CREATE TABLE IF NOT EXISTS data_properties (
            subject   TEXT NOT NULL,
            property  TEXT NOT NULL,
            value     TEXT NOT NULL,
            datatype  TEXT NOT NULL,
            PRIMARY KEY (subject, property)
        );
        CREATE TABLE IF NOT EXISTS inverse_properties (
            property  TEXT NOT NULL,
            inverse   TEXT NOT NULL,
            PRIMARY KEY (property, inverse)
        );
        CREATE INDEX IF NOT EXISTS idx_class_assertions_class ON class_assertions(class);
        CREATE INDEX IF NOT EXISTS idx_object_properties_object ON object_properties(object, property);
        CREATE INDEX IF NOT EXISTS idx_object_properties_property ON object_properties(property);
        CREATE INDEX IF NOT EXISTS idx_data_properties_property ON data_properties(property);
        "#,
    )
    .map_err(|e| SpatioGraphError::schema(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        ensure_schema(&conn).expect("schema");
        ensure_schema(&conn).expect("schema twice");

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("prepare");
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .expect("query")
            .collect::<Result<_, _>>()
            .expect("rows");
        assert_eq!(
            tables,
            vec![
                "class_assertions",
                "data_properties",
                "individuals",
                "inverse_properties",
                "object_properties"
            ]
        );
    }
}
