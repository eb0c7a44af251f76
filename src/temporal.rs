//! Temporal values and point-in-time resolution.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};

use crate::{
    errors::{Result, SpatioGraphError},
    iri::Iri,
    store::StoreTransaction,
    vocabulary,
};

/// A caller-supplied instant. Values without an offset are interpreted as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temporal {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
}

impl Temporal {
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            Temporal::Date(date) => Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)),
            Temporal::DateTime(naive) => Utc.from_utc_datetime(naive),
            Temporal::Offset(dt) => dt.with_timezone(&Utc),
        }
    }
}

impl From<NaiveDate> for Temporal {
    fn from(value: NaiveDate) -> Self {
        Temporal::Date(value)
    }
}

impl From<NaiveDateTime> for Temporal {
    fn from(value: NaiveDateTime) -> Self {
        Temporal::DateTime(value)
    }
}

impl From<DateTime<FixedOffset>> for Temporal {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Temporal::Offset(value)
    }
}

impl From<DateTime<Utc>> for Temporal {
    fn from(value: DateTime<Utc>) -> Self {
        Temporal::Offset(value.fixed_offset())
    }
}

/// Fixed-width UTC form (`2020-01-01T00:00:00.000Z`); lexical order is chronological order.
pub fn format_date_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_date_time(lexical: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(lexical)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SpatioGraphError::marshalling(format!("invalid date-time '{lexical}': {e}")))
}

/// Adjusts `at` so it falls inside the validity interval of `individual`.
///
/// Instants before the interval resolve to its start; instants at or after
/// its end resolve to one millisecond before the end. Individuals without a
/// recorded validity start are returned unchanged.
pub fn adjusted_query_temporal<T: StoreTransaction>(
    txn: &mut T,
    individual: &Iri,
    at: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let Some(from) = txn.get_data_property_value(individual, &vocabulary::term(vocabulary::VALID_FROM))?
    else {
        return Ok(at);
    };
    let from = from.as_date_time()?;
    if at < from {
        tracing::trace!(%individual, %at, %from, "query instant precedes validity, clamping to start");
        return Ok(from);
    }
    if let Some(to) = txn.get_data_property_value(individual, &vocabulary::term(vocabulary::VALID_TO))? {
        let to = to.as_date_time()?;
        if at >= to {
            tracing::trace!(%individual, %at, %to, "query instant follows validity, clamping to end");
            return Ok(to - Duration::milliseconds(1));
        }
    }
    Ok(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_resolve_to_utc_midnight() {
        let date = NaiveDate::from_ymd_opt(2018, 3, 1).unwrap();
        let utc = Temporal::from(date).to_utc();
        assert_eq!(format_date_time(&utc), "2018-03-01T00:00:00.000Z");
    }

    #[test]
    fn offsets_are_normalised() {
        let dt = DateTime::parse_from_rfc3339("2018-03-01T02:30:00+02:00").unwrap();
        let utc = Temporal::from(dt).to_utc();
        assert_eq!(format_date_time(&utc), "2018-03-01T00:30:00.000Z");
        assert_eq!(parse_date_time(&format_date_time(&utc)).unwrap(), utc);
    }

    #[test]
    fn invalid_lexical_form_is_rejected() {
        let err = parse_date_time("yesterday").unwrap_err();
        assert!(matches!(err, SpatioGraphError::MarshallingError(_)));
    }
}
