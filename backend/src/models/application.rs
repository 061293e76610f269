use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationStatus::Pending => write!(f, "PENDING"),
            ApplicationStatus::Accepted => write!(f, "ACCEPTED"),
            ApplicationStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub match_id: Uuid,
    pub player_id: Uuid,
    pub team_number: Option<i16>,
    pub message: Option<String>,
    pub phone: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

impl Application {
    pub fn is_pending(&self) -> bool {
        self.status == ApplicationStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateApplicationDto {
    pub match_id: Uuid,
    #[validate(range(min = 1, max = 2))]
    pub team_number: Option<i16>,
    #[validate(length(max = 500))]
    pub message: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AcceptApplicationDto {
    #[validate(range(min = 1, max = 2))]
    pub team_number: i16,
}

/// Row to insert for a new application; always starts PENDING
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub match_id: Uuid,
    pub player_id: Uuid,
    pub team_number: Option<i16>,
    pub message: Option<String>,
    pub phone: Option<String>,
}
