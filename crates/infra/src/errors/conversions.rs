//! Conversions from external infrastructure errors into domain errors.

use std::time::Duration;

use calrecon_domain::ReconError;
use reqwest::{Error as HttpError, StatusCode};
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ReconError);

impl From<InfraError> for ReconError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ReconError> for InfraError {
    fn from(value: ReconError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoReconError {
    fn into_recon(self) -> ReconError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → ReconError */
/* -------------------------------------------------------------------------- */

/// SQLITE_CONSTRAINT_UNIQUE and SQLITE_CONSTRAINT_PRIMARYKEY
const UNIQUE_VIOLATION_CODES: [i32; 2] = [2067, 1555];

impl IntoReconError for SqlError {
    fn into_recon(self) -> ReconError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::ConstraintViolation, code)
                        if UNIQUE_VIOLATION_CODES.contains(&code) =>
                    {
                        let detail = format!("unique constraint violation: {message}");
                        ReconError::ConflictOnUpsert(detail)
                    }
                    (ErrorCode::ConstraintViolation, _) => {
                        ReconError::Validation(format!("constraint violation: {message}"))
                    }
                    (ErrorCode::DatabaseBusy, _) => ReconError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        ReconError::Database("database is locked".into())
                    }
                    _ => ReconError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => ReconError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                ReconError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                ReconError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => {
                ReconError::Database(format!("invalid database path: {}", path.to_string_lossy()))
            }
            other => ReconError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_recon())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → ReconError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        Self(ReconError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ReconError */
/* -------------------------------------------------------------------------- */

/// Map a non-success HTTP status onto the domain error taxonomy.
pub fn status_error(status: StatusCode, retry_after: Option<Duration>, body: &str) -> ReconError {
    let code = status.as_u16();
    let message = if body.trim().is_empty() {
        format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"))
    } else {
        format!("HTTP {code}: {}", body.trim())
    };

    match code {
        401 | 403 => ReconError::AuthFailure(message),
        404 | 410 => ReconError::NotFound(message),
        429 => ReconError::rate_limited(message, retry_after),
        500..=599 => ReconError::TransientRemote(message),
        400..=499 => ReconError::Validation(message),
        _ => ReconError::TransientRemote(message),
    }
}

impl IntoReconError for HttpError {
    fn into_recon(self) -> ReconError {
        if self.is_timeout() {
            return ReconError::TransientRemote("HTTP request timed out".into());
        }

        if self.is_connect() {
            return ReconError::TransientRemote("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return status_error(status, None, "");
        }

        if self.is_decode() {
            return ReconError::Validation(format!("malformed response body: {self}"));
        }

        ReconError::TransientRemote(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_recon())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
