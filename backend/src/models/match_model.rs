use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::api_error::ApiError;
use crate::models::application::Application;
use crate::models::player::Player;

/// Players a single team can hold
pub const TEAM_CAPACITY: usize = 2;
/// Players a full match holds (two full teams)
pub const MATCH_CAPACITY: usize = TEAM_CAPACITY * 2;
pub const TEAM_NUMBERS: [i16; 2] = [1, 2];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Pending,
    Closed,
    Completed,
    Cancelled,
}

impl MatchStatus {
    /// Status a non-terminal match should have for the given roster size
    pub fn for_roster_size(players: usize) -> Self {
        if players >= MATCH_CAPACITY {
            MatchStatus::Closed
        } else {
            MatchStatus::Pending
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Pending => write!(f, "PENDING"),
            MatchStatus::Closed => write!(f, "CLOSED"),
            MatchStatus::Completed => write!(f, "COMPLETED"),
            MatchStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for MatchStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(MatchStatus::Pending),
            "CLOSED" => Ok(MatchStatus::Closed),
            "COMPLETED" => Ok(MatchStatus::Completed),
            "CANCELLED" => Ok(MatchStatus::Cancelled),
            other => Err(ApiError::bad_request(format!("Unknown match status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Match {
    pub id: Uuid,
    pub date_time: DateTime<Utc>,
    pub location: String,
    pub description: Option<String>,
    pub duration: i32,
    pub points_deviation: i32,
    pub category_id: i32,
    pub gender_id: i32,
    pub creator_player_id: Uuid,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Team {
    pub id: Uuid,
    pub match_id: Uuid,
    pub team_number: i16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamWithPlayers {
    #[serde(flatten)]
    pub team: Team,
    pub players: Vec<Player>,
}

impl TeamWithPlayers {
    pub fn is_full(&self) -> bool {
        self.players.len() >= TEAM_CAPACITY
    }

    pub fn contains(&self, player_id: Uuid) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }
}

/// Result of a played set
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchSet {
    pub id: Uuid,
    pub match_id: Uuid,
    pub set_number: i16,
    pub team1_score: i16,
    pub team2_score: i16,
}

/// A match together with its teams, roster, sets and pending applications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDetails {
    #[serde(flatten)]
    pub match_data: Match,
    pub teams: Vec<TeamWithPlayers>,
    pub players: Vec<Player>,
    pub sets: Vec<MatchSet>,
    pub applications: Vec<Application>,
}

impl MatchDetails {
    pub fn team(&self, team_number: i16) -> Option<&TeamWithPlayers> {
        self.teams.iter().find(|t| t.team.team_number == team_number)
    }

    /// Team currently holding the player
    pub fn team_of(&self, player_id: Uuid) -> Option<&TeamWithPlayers> {
        self.teams.iter().find(|t| t.contains(player_id))
    }

    pub fn contains_player(&self, player_id: Uuid) -> bool {
        self.team_of(player_id).is_some()
    }

    pub fn roster_size(&self) -> usize {
        self.teams.iter().map(|t| t.players.len()).sum()
    }

    pub fn is_team_full(&self, team_number: i16) -> bool {
        self.team(team_number).map(|t| t.is_full()).unwrap_or(false)
    }
}

// ===== Request DTOs =====

/// Descriptor for a guest player created ad hoc for a match. Unknown keys
/// are rejected so a malformed `{"id": ...}` entry never becomes a guest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuestPlayerDto {
    pub display_name: Option<String>,
    pub category_id: Option<i32>,
    pub position: Option<String>,
    pub phone: Option<String>,
}

/// One roster slot: a registered player, or a guest to be created
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RosterEntry {
    Existing { id: Uuid },
    Guest(GuestPlayerDto),
}

impl RosterEntry {
    pub fn player_id(&self) -> Option<Uuid> {
        match self {
            RosterEntry::Existing { id } => Some(*id),
            RosterEntry::Guest(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TeamsDto {
    #[validate(length(max = 2))]
    pub team1: Option<Vec<RosterEntry>>,
    #[validate(length(max = 2))]
    pub team2: Option<Vec<RosterEntry>>,
}

impl TeamsDto {
    pub fn roster(&self, team_number: i16) -> Option<&Vec<RosterEntry>> {
        match team_number {
            1 => self.team1.as_ref(),
            2 => self.team2.as_ref(),
            _ => None,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &RosterEntry> {
        self.team1
            .iter()
            .flatten()
            .chain(self.team2.iter().flatten())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMatchDto {
    pub date: NaiveDate,
    pub time: String,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub category_id: i32,
    #[validate(range(min = 0))]
    pub points_deviation: i32,
    pub gender_id: i32,
    #[validate(nested)]
    pub teams: Option<TeamsDto>,
    #[validate(range(min = 1))]
    pub duration: i32,
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateMatchDto {
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub category_id: Option<i32>,
    #[validate(range(min = 0))]
    pub points_deviation: Option<i32>,
    pub gender_id: Option<i32>,
    #[validate(nested)]
    pub teams: Option<TeamsDto>,
    #[validate(range(min = 1))]
    pub duration: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddPlayerDto {
    #[validate(range(min = 1, max = 2))]
    pub team_number: i16,
    pub player_id: Uuid,
}

/// Combine a calendar date and an `HH:MM` wall-clock time into a UTC timestamp
pub fn combine_date_time(date: NaiveDate, time: &str) -> Result<DateTime<Utc>, ApiError> {
    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .map_err(|_| ApiError::bad_request(format!("Invalid time of day: {}", time)))?;
    Ok(date.and_time(time).and_utc())
}

pub fn validate_team_number(team_number: i16) -> Result<(), ApiError> {
    if TEAM_NUMBERS.contains(&team_number) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Team number must be 1 or 2, got {}",
            team_number
        )))
    }
}

// ===== Listing =====

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GetMatchesQuery {
    /// Comma separated gender ids
    pub gender: Option<String>,
    /// Comma separated statuses
    pub status: Option<String>,
    pub created_by: Option<bool>,
    pub is_player: Option<bool>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFilters {
    pub genders: Vec<i32>,
    pub statuses: Vec<MatchStatus>,
    pub created_by: bool,
    pub is_player: bool,
    pub page: u32,
    pub page_size: u32,
}

impl Default for MatchFilters {
    fn default() -> Self {
        Self {
            genders: vec![],
            statuses: vec![],
            created_by: false,
            is_player: false,
            page: 1,
            page_size: 10,
        }
    }
}

impl MatchFilters {
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.page_size as i64
    }
}

impl TryFrom<GetMatchesQuery> for MatchFilters {
    type Error = ApiError;

    fn try_from(query: GetMatchesQuery) -> Result<Self, Self::Error> {
        query.validate()?;

        let genders = split_list(query.gender.as_deref())
            .map(|g| {
                g.parse::<i32>()
                    .map_err(|_| ApiError::bad_request(format!("Invalid gender id: {}", g)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let statuses = split_list(query.status.as_deref())
            .map(str::parse::<MatchStatus>)
            .collect::<Result<Vec<_>, _>>()?;
        let defaults = MatchFilters::default();

        Ok(MatchFilters {
            genders,
            statuses,
            created_by: query.created_by.unwrap_or(false),
            is_player: query.is_player.unwrap_or(false),
            page: query.page.unwrap_or(defaults.page),
            page_size: query.page_size.unwrap_or(defaults.page_size),
        })
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Which matches a listing covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchScope {
    /// Every pending match
    Open,
    /// Pending matches the player created and/or plays in
    Player {
        player_id: Uuid,
        created_by: bool,
        is_player: bool,
    },
}

#[derive(Debug, Clone)]
pub struct MatchQuery {
    pub scope: MatchScope,
    pub filters: MatchFilters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}
