//! Column codecs shared by the repositories.
//!
//! Timestamps are stored as unix milliseconds; enums and identities as their
//! wire strings. Decoding failures surface as
//! `rusqlite::Error::FromSqlConversionFailure` so they map like any other
//! row error.

use std::str::FromStr;

use calrecon_domain::{Identity, ReconError};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;

pub fn to_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn opt_to_ms(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(to_ms)
}

pub fn from_ms(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        let err = ReconError::Validation(format!("timestamp out of range: {ms}"));
        conversion_failure(idx, Type::Integer, err)
    })
}

pub fn opt_from_ms(idx: usize, ms: Option<i64>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    ms.map(|ms| from_ms(idx, ms)).transpose()
}

/// Parse a text column through the domain's `FromStr`.
pub fn parsed<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = ReconError>,
{
    raw.parse().map_err(|e| conversion_failure(idx, Type::Text, e))
}

pub fn identity(idx: usize, raw: &str) -> rusqlite::Result<Identity> {
    Identity::parse(raw).map_err(|e| conversion_failure(idx, Type::Text, e))
}

fn conversion_failure(idx: usize, ty: Type, err: ReconError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}
