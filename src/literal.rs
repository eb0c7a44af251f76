use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{Result, SpatioGraphError},
    temporal::{format_date_time, parse_date_time},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Datatype {
    String,
    Double,
    DateTime,
    Wkt,
    Json,
}

impl Datatype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Datatype::String => "string",
            Datatype::Double => "double",
            Datatype::DateTime => "date_time",
            Datatype::Wkt => "wkt",
            Datatype::Json => "json",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "string" => Ok(Datatype::String),
            "double" => Ok(Datatype::Double),
            "date_time" => Ok(Datatype::DateTime),
            "wkt" => Ok(Datatype::Wkt),
            "json" => Ok(Datatype::Json),
            other => Err(SpatioGraphError::marshalling(format!("unknown datatype '{other}'"))),
        }
    }
}

/// A typed data-property value in its lexical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    lexical: String,
    datatype: Datatype,
}

impl Literal {
    pub fn new<T: Into<String>>(lexical: T, datatype: Datatype) -> Self {
        Self {
            lexical: lexical.into(),
            datatype,
        }
    }

    pub fn string<T: Into<String>>(value: T) -> Self {
        Self::new(value, Datatype::String)
    }

    pub fn double(value: f64) -> Self {
        Self::new(value.to_string(), Datatype::Double)
    }

    pub fn date_time(value: &DateTime<Utc>) -> Self {
        Self::new(format_date_time(value), Datatype::DateTime)
    }

    pub fn wkt<T: Into<String>>(value: T) -> Self {
        Self::new(value, Datatype::Wkt)
    }

    pub fn json(value: &serde_json::Value) -> Result<Self> {
        let lexical =
            serde_json::to_string(value).map_err(|e| SpatioGraphError::marshalling(e.to_string()))?;
        Ok(Self::new(lexical, Datatype::Json))
    }

    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn as_f64(&self) -> Result<f64> {
        self.lexical.parse::<f64>().map_err(|e| {
            SpatioGraphError::marshalling(format!("invalid double '{}': {e}", self.lexical))
        })
    }

    pub fn as_date_time(&self) -> Result<DateTime<Utc>> {
        parse_date_time(&self.lexical)
    }

    pub fn as_json(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.lexical).map_err(|e| SpatioGraphError::marshalling(e.to_string()))
    }
}
