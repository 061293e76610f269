use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable codes for domain failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoMatch,
    NoPlayer,
    DuplicatePlayer,
    PlayerAlreadyInMatch,
    ApplicationAlreadyExists,
    ApplicationNoExist,
    ApplicationTeamFull,
    ApplicationClosed,
    ApplicationMatchClosed,
    Unauthorized,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NoMatch | ErrorCode::NoPlayer | ErrorCode::ApplicationNoExist => {
                StatusCode::NOT_FOUND
            }
            ErrorCode::Unauthorized => StatusCode::FORBIDDEN,
            ErrorCode::DuplicatePlayer => StatusCode::BAD_REQUEST,
            ErrorCode::PlayerAlreadyInMatch
            | ErrorCode::ApplicationAlreadyExists
            | ErrorCode::ApplicationTeamFull
            | ErrorCode::ApplicationClosed
            | ErrorCode::ApplicationMatchClosed => StatusCode::CONFLICT,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ErrorCode::NoMatch => "NO_MATCH",
            ErrorCode::NoPlayer => "NO_PLAYER",
            ErrorCode::DuplicatePlayer => "DUPLICATE_PLAYER",
            ErrorCode::PlayerAlreadyInMatch => "PLAYER_ALREADY_IN_MATCH",
            ErrorCode::ApplicationAlreadyExists => "APPLICATION_ALREADY_EXISTS",
            ErrorCode::ApplicationNoExist => "APPLICATION_NO_EXIST",
            ErrorCode::ApplicationTeamFull => "APPLICATION_TEAM_FULL",
            ErrorCode::ApplicationClosed => "APPLICATION_CLOSED",
            ErrorCode::ApplicationMatchClosed => "APPLICATION_MATCH_CLOSED",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
        };
        write!(f, "{}", code)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Domain { code: ErrorCode, message: String },

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ApiError {
    pub fn domain(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError::Domain {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn no_match(match_id: impl std::fmt::Display) -> Self {
        Self::domain(
            ErrorCode::NoMatch,
            format!("No existing match with id: {}", match_id),
        )
    }

    pub fn team_full() -> Self {
        Self::domain(ErrorCode::ApplicationTeamFull, "Team is full")
    }

    /// Domain code carried by this error, if any
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ApiError::Domain { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
    status: u16,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Domain { code, .. } => code.status(),
            ApiError::InternalServerError(_) | ApiError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let (code, message) = match self {
            ApiError::Domain { code, .. } => (code.to_string(), self.to_string()),
            ApiError::InternalServerError(_) => {
                ("INTERNAL_SERVER_ERROR".to_string(), "Internal server error".to_string())
            }
            ApiError::DatabaseError(_) => ("DATABASE_ERROR".to_string(), "Database error".to_string()),
            ApiError::BadRequest(_) => ("BAD_REQUEST".to_string(), self.to_string()),
            ApiError::ValidationError(_) => ("VALIDATION_ERROR".to_string(), self.to_string()),
            ApiError::Unauthorized => ("UNAUTHENTICATED".to_string(), self.to_string()),
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: message,
            code,
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::ApplicationMatchClosed).unwrap();
        assert_eq!(json, "\"APPLICATION_MATCH_CLOSED\"");
        assert_eq!(ErrorCode::ApplicationMatchClosed.to_string(), "APPLICATION_MATCH_CLOSED");

        let decoded: ErrorCode = serde_json::from_str("\"NO_MATCH\"").unwrap();
        assert_eq!(decoded, ErrorCode::NoMatch);
    }

    #[test]
    fn test_domain_codes_map_to_distinct_statuses() {
        assert_eq!(ErrorCode::NoMatch.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::Unauthorized.status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::ApplicationTeamFull.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::DuplicatePlayer.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_domain_error_response() {
        let err = ApiError::no_match("42");
        assert_eq!(err.code(), Some(ErrorCode::NoMatch));
        assert_eq!(err.to_string(), "No existing match with id: 42");

        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_non_domain_errors_have_no_code() {
        assert_eq!(ApiError::Unauthorized.code(), None);
        assert_eq!(
            ApiError::bad_request("nope").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::internal_error("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
