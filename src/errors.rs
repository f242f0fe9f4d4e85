use actix_web::{error, http::StatusCode, HttpResponse};
use derive_more::{Display, Error};

#[derive(Debug, Clone, Display, Error, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum AppError {
    #[display(fmt = "internal error")]
    InternalError,

    #[display(fmt = "bad request")]
    BadClientData,

    #[display(fmt = "timeout")]
    Timeout,

    #[display(fmt = "authentication error")]
    AuthError,

    #[display(fmt = "token decoding error")]
    DecodeError,

    #[display(fmt = "token expired")]
    TokenExpirationError,

    #[display(fmt = "unauthorized")]
    Unauthorized,

    #[display(fmt = "not found")]
    NotFound,
}

impl error::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            AppError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadClientData => StatusCode::BAD_REQUEST,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::AuthError => StatusCode::UNAUTHORIZED,
            AppError::DecodeError => StatusCode::UNAUTHORIZED,
            AppError::TokenExpirationError => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                log::warn!("unique constraint violated: {}", db.message());
                AppError::BadClientData
            }
            sqlx::Error::PoolTimedOut => {
                log::error!("database pool timed out");
                AppError::Timeout
            }
            other => {
                log::error!("database error: {:?}", other);
                AppError::InternalError
            }
        }
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        log::warn!("rejected time slot input: {}", err);
        AppError::BadClientData
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpirationError,
            _ => AppError::DecodeError,
        }
    }
}

/// Failure of the time-slot codec. Carries the offending input so callers can
/// log or echo it.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[display(fmt = "invalid date '{}', expected YYYY-MM-DD", input)]
    InvalidDate { input: String },

    #[display(fmt = "invalid time '{}', expected HH:MM", input)]
    InvalidTime { input: String },

    #[display(fmt = "invalid hour range {}..={}", start, end)]
    InvalidRange { start: u32, end: u32 },

    #[display(fmt = "local time {} {} does not exist in this time zone", date, time)]
    NonexistentLocalTime { date: String, time: String },

    #[display(fmt = "invalid time zone offset {} minutes", minutes)]
    InvalidOffset { minutes: i32 },

    #[display(fmt = "unrecognized time slot document: {}", reason)]
    UnsupportedSchema { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert_eq!(AppError::from(sqlx::Error::RowNotFound), AppError::NotFound);
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
    }

    #[derive(Debug)]
    struct FakeDbError(sqlx::error::ErrorKind);

    impl std::fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }

    impl std::error::Error for FakeDbError {}

    impl sqlx::error::DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"users_email_key\""
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            match self.0 {
                sqlx::error::ErrorKind::UniqueViolation => sqlx::error::ErrorKind::UniqueViolation,
                _ => sqlx::error::ErrorKind::Other,
            }
        }
    }

    #[test]
    fn duplicate_rows_are_client_errors() {
        let duplicate = sqlx::Error::Database(Box::new(FakeDbError(sqlx::error::ErrorKind::UniqueViolation)));
        assert_eq!(AppError::from(duplicate), AppError::BadClientData);

        let other = sqlx::Error::Database(Box::new(FakeDbError(sqlx::error::ErrorKind::Other)));
        assert_eq!(AppError::from(other), AppError::InternalError);
    }

    #[test]
    fn conversion_errors_are_client_errors() {
        let err = AppError::from(ConversionError::InvalidTime { input: "25:00".into() });
        assert_eq!(err, AppError::BadClientData);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conversion_error_names_the_input() {
        let err = ConversionError::InvalidDate { input: "2025-13-01".into() };
        assert_eq!(err.to_string(), "invalid date '2025-13-01', expected YYYY-MM-DD");
    }
}
