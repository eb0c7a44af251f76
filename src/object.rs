//! Conversion between domain objects and store individuals.
//!
//! A domain type implements [`TemporalObject`]; the [`ObjectMarshaller`]
//! stores it as an individual of the type's class carrying the serialized
//! object plus the validity, recording and geometry properties the query
//! builder filters on.

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    errors::{Result, SpatioGraphError},
    iri::{Iri, parse_string_to_iri},
    literal::Literal,
    spatial::Envelope,
    store::StoreTransaction,
    vocabulary::{self, term},
};

/// A spatiotemporal domain object that can be stored as an individual.
pub trait TemporalObject: Serialize + DeserializeOwned {
    /// Store class of this type, as a short name or an absolute identifier.
    const CLASS: &'static str;

    fn identifier(&self) -> String;

    fn valid_from(&self) -> DateTime<Utc>;

    fn valid_to(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Geometry as WKT.
    fn geometry(&self) -> Option<String> {
        None
    }
}

/// A domain object flattened into the values written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub individual: Iri,
    pub class: Iri,
    pub data: serde_json::Value,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub geometry: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObjectMarshaller {
    prefix: String,
}

impl ObjectMarshaller {
    pub fn new<T: Into<String>>(prefix: T) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn resolve_class<T: TemporalObject>(&self) -> Iri {
        parse_string_to_iri(&self.prefix, T::CLASS)
    }

    pub fn resolve_identity<T: TemporalObject>(&self, object: &T) -> Iri {
        parse_string_to_iri(&self.prefix, &object.identifier())
    }

    pub fn to_record<T: TemporalObject>(&self, object: &T) -> Result<ObjectRecord> {
        let identifier = object.identifier();
        if identifier.trim().is_empty() {
            return Err(SpatioGraphError::invalid_input("object identifier must be set"));
        }
        let valid_from = object.valid_from();
        let valid_to = object.valid_to();
        if let Some(to) = valid_to
            && to <= valid_from
        {
            return Err(SpatioGraphError::invalid_input(format!(
                "{identifier}: validity ends before it starts"
            )));
        }
        let geometry = object.geometry();
        if let Some(wkt) = &geometry {
            Envelope::from_wkt(wkt)?;
        }
        let data =
            serde_json::to_value(object).map_err(|e| SpatioGraphError::marshalling(e.to_string()))?;
        Ok(ObjectRecord {
            individual: parse_string_to_iri(&self.prefix, &identifier),
            class: self.resolve_class::<T>(),
            data,
            valid_from,
            valid_to,
            geometry,
        })
    }

    /// Writes `record` inside `txn`. Rewriting an object keeps its original
    /// recording time.
    pub fn write_record<X: StoreTransaction>(&self, txn: &mut X, record: &ObjectRecord) -> Result<()> {
        let individual = &record.individual;
        txn.create_individual(&record.class, individual)?;
        txn.write_data_property(individual, &term(vocabulary::OBJECT_DATA), &Literal::json(&record.data)?)?;
        txn.write_data_property(
            individual,
            &term(vocabulary::VALID_FROM),
            &Literal::date_time(&record.valid_from),
        )?;
        let valid_to = term(vocabulary::VALID_TO);
        match &record.valid_to {
            Some(end) => txn.write_data_property(individual, &valid_to, &Literal::date_time(end))?,
            None => clear_data_property(txn, individual, &valid_to)?,
        }
        let as_wkt = term(vocabulary::AS_WKT);
        match &record.geometry {
            Some(wkt) => txn.write_data_property(individual, &as_wkt, &Literal::wkt(wkt.as_str()))?,
            None => clear_data_property(txn, individual, &as_wkt)?,
        }
        let db_from = term(vocabulary::DB_FROM);
        if txn.get_data_property_value(individual, &db_from)?.is_none() {
            txn.write_data_property(individual, &db_from, &Literal::date_time(&Utc::now()))?;
        }
        tracing::debug!(%individual, class = %record.class, "wrote object");
        Ok(())
    }

    /// Reads the object stored at `individual` as it was valid at `valid_at`,
    /// and, when `db_at` is given, as it was recorded at `db_at`.
    pub fn read_object<T: TemporalObject, X: StoreTransaction>(
        &self,
        txn: &mut X,
        individual: &Iri,
        valid_at: DateTime<Utc>,
        db_at: Option<DateTime<Utc>>,
    ) -> Result<T> {
        if !txn.individual_exists(individual)? {
            return Err(SpatioGraphError::not_found(format!("individual {individual}")));
        }
        if !within(txn, individual, vocabulary::VALID_FROM, vocabulary::VALID_TO, valid_at)? {
            return Err(SpatioGraphError::not_found(format!(
                "{individual} is not valid at {valid_at}"
            )));
        }
        if let Some(db_at) = db_at
            && !within(txn, individual, vocabulary::DB_FROM, vocabulary::DB_TO, db_at)?
        {
            return Err(SpatioGraphError::not_found(format!(
                "{individual} is not recorded at {db_at}"
            )));
        }
        let data = txn
            .get_data_property_value(individual, &term(vocabulary::OBJECT_DATA))?
            .ok_or_else(|| {
                SpatioGraphError::marshalling(format!("{individual} has no object data"))
            })?;
        serde_json::from_value(data.as_json()?)
            .map_err(|e| SpatioGraphError::marshalling(format!("{individual}: {e}")))
    }
}

/// Drops a value left behind by an earlier write of the same individual.
fn clear_data_property<X: StoreTransaction>(txn: &mut X, individual: &Iri, property: &Iri) -> Result<()> {
    match txn.remove_data_property(individual, property, None) {
        Err(SpatioGraphError::NotFound(_)) => Ok(()),
        other => other,
    }
}

fn within<X: StoreTransaction>(
    txn: &mut X,
    individual: &Iri,
    from: &str,
    to: &str,
    at: DateTime<Utc>,
) -> Result<bool> {
    if let Some(start) = txn.get_data_property_value(individual, &term(from))?
        && at < start.as_date_time()?
    {
        return Ok(false);
    }
    if let Some(end) = txn.get_data_property_value(individual, &term(to))?
        && at >= end.as_date_time()?
    {
        return Ok(false);
    }
    Ok(true)
}
