#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spatiograph::{CollectionEngine, EngineConfig, SqliteStore, TemporalObject};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoObject {
    pub id: String,
    pub name: String,
    pub from: DateTime<Utc>,
    pub to: Option<DateTime<Utc>>,
    pub wkt: Option<String>,
}

impl TemporalObject for GeoObject {
    const CLASS: &'static str = "GeoObject";

    fn identifier(&self) -> String {
        self.id.clone()
    }

    fn valid_from(&self) -> DateTime<Utc> {
        self.from
    }

    fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.to
    }

    fn geometry(&self) -> Option<String> {
        self.wkt.clone()
    }
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn object(id: &str) -> GeoObject {
    GeoObject {
        id: id.to_string(),
        name: format!("object {id}"),
        from: at("2020-01-01T00:00:00Z"),
        to: None,
        wkt: None,
    }
}

pub fn located(id: &str, wkt: &str) -> GeoObject {
    GeoObject {
        wkt: Some(wkt.to_string()),
        ..object(id)
    }
}

pub fn engine() -> CollectionEngine<SqliteStore> {
    engine_with(EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> CollectionEngine<SqliteStore> {
    init_tracing();
    CollectionEngine::open(config).expect("engine")
}

/// Routes engine logs to the test harness; `RUST_LOG=spatiograph=debug`
/// shows transaction boundaries.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Full identifier of a short name under the engine prefix.
pub fn full(engine: &CollectionEngine<SqliteStore>, local: &str) -> String {
    format!("{}{}", engine.prefix(), local)
}
