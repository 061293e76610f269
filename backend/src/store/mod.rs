//! Persistence gateway for matches, teams, players and applications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::models::application::{Application, ApplicationStatus, NewApplication};
use crate::models::match_model::{MatchDetails, MatchQuery, MatchStatus};
use crate::models::player::Player;
use crate::service::team_composer::TeamDraft;

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::InMemoryStore;
pub use postgres::PgMatchStore;

/// Match row plus its two team drafts
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub date_time: DateTime<Utc>,
    pub location: String,
    pub description: Option<String>,
    pub duration: i32,
    pub points_deviation: i32,
    pub category_id: i32,
    pub gender_id: i32,
    pub creator_player_id: Uuid,
    pub status: MatchStatus,
    pub teams: Vec<TeamDraft>,
}

/// Scalar columns to overwrite; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchChanges {
    pub date_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub duration: Option<i32>,
    pub points_deviation: Option<i32>,
    pub category_id: Option<i32>,
    pub gender_id: Option<i32>,
}

impl MatchChanges {
    pub fn is_empty(&self) -> bool {
        *self == MatchChanges::default()
    }
}

/// Roster-mutating operations re-check team capacity inside their own
/// transaction (or lock) and fail with `APPLICATION_TEAM_FULL` when a
/// concurrent writer filled the team first.
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ApiError>;

    /// Insert the match, its two teams, any guest players, and connect every
    /// rostered player to both the match and its team.
    async fn create_match(&self, new_match: NewMatch) -> Result<MatchDetails, ApiError>;

    /// Match with teams, roster, sets and pending applications.
    async fn find_match(&self, match_id: Uuid) -> Result<Option<MatchDetails>, ApiError>;

    /// One page of matches and the total count, read in one transaction.
    async fn list_matches(&self, query: &MatchQuery) -> Result<(Vec<MatchDetails>, i64), ApiError>;

    /// Returns false when the match does not exist.
    async fn update_match(&self, match_id: Uuid, changes: &MatchChanges) -> Result<bool, ApiError>;

    /// Empty both teams and the roster, then fill them from the drafts.
    async fn replace_teams(&self, match_id: Uuid, teams: Vec<TeamDraft>) -> Result<(), ApiError>;

    /// Returns false when the match does not exist.
    async fn set_match_status(&self, match_id: Uuid, status: MatchStatus) -> Result<bool, ApiError>;

    /// Connect the player to the roster and team; returns the new roster size.
    /// A PENDING match whose roster becomes full is closed in the same write.
    async fn add_player_to_team(
        &self,
        match_id: Uuid,
        team_number: i16,
        player_id: Uuid,
    ) -> Result<usize, ApiError>;

    async fn remove_player_from_team(
        &self,
        match_id: Uuid,
        team_number: i16,
        player_id: Uuid,
    ) -> Result<(), ApiError>;

    async fn find_player(&self, player_id: Uuid) -> Result<Option<Player>, ApiError>;

    async fn delete_player(&self, player_id: Uuid) -> Result<(), ApiError>;

    async fn count_completed_matches(&self, player_id: Uuid) -> Result<i64, ApiError>;

    async fn find_application(&self, application_id: Uuid) -> Result<Option<Application>, ApiError>;

    /// Any application of the player on the match, whatever its status.
    async fn find_player_application(
        &self,
        match_id: Uuid,
        player_id: Uuid,
    ) -> Result<Option<Application>, ApiError>;

    async fn create_application(&self, new_application: NewApplication) -> Result<Application, ApiError>;

    /// Connect the applicant to the roster and team and mark the application
    /// ACCEPTED as one unit, closing a PENDING match that becomes full.
    /// Returns the application and the new roster size.
    async fn accept_application(
        &self,
        application_id: Uuid,
        team_number: i16,
    ) -> Result<(Application, usize), ApiError>;

    /// Move a PENDING application to `status`. An application resolved in
    /// the meantime fails with APPLICATION_CLOSED and is left as it is.
    async fn set_application_status(
        &self,
        application_id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Application, ApiError>;
}
