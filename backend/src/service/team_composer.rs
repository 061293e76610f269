//! Builds initial team membership from roster lists.

use std::collections::HashSet;

use uuid::Uuid;

use crate::api_error::{ApiError, ErrorCode};
use crate::models::match_model::{RosterEntry, TeamsDto, TEAM_CAPACITY, TEAM_NUMBERS};
use crate::models::player::NewGuestPlayer;

/// Directive for creating (or replacing) one team: connect the existing
/// players and create the guests.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamDraft {
    pub team_number: i16,
    pub existing_players: Vec<Uuid>,
    pub guests: Vec<NewGuestPlayer>,
}

impl TeamDraft {
    pub fn empty(team_number: i16) -> Self {
        Self {
            team_number,
            existing_players: vec![],
            guests: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.existing_players.len() + self.guests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compose a single team. Guests inherit the match gender.
pub fn compose_team(
    team_number: i16,
    roster: Option<&[RosterEntry]>,
    gender_id: i32,
) -> Result<TeamDraft, ApiError> {
    let roster = roster.unwrap_or(&[]);
    if roster.len() > TEAM_CAPACITY {
        return Err(ApiError::domain(
            ErrorCode::ApplicationTeamFull,
            format!(
                "Team {} cannot hold {} players (max {})",
                team_number,
                roster.len(),
                TEAM_CAPACITY
            ),
        ));
    }

    let mut draft = TeamDraft::empty(team_number);
    for entry in roster {
        match entry {
            RosterEntry::Existing { id } => draft.existing_players.push(*id),
            RosterEntry::Guest(guest) => draft.guests.push(NewGuestPlayer {
                display_name: guest.display_name.clone(),
                gender_id,
                category_id: guest.category_id,
                position: guest.position.clone(),
                phone: guest.phone.clone(),
            }),
        }
    }
    Ok(draft)
}

/// Compose both teams of a match, team 1 first.
pub fn compose_teams(teams: Option<&TeamsDto>, gender_id: i32) -> Result<Vec<TeamDraft>, ApiError> {
    TEAM_NUMBERS
        .iter()
        .map(|&number| {
            let roster = teams.and_then(|t| t.roster(number)).map(Vec::as_slice);
            compose_team(number, roster, gender_id)
        })
        .collect()
}

/// A registered player may occupy only one slot across both teams.
pub fn ensure_distinct_players(teams: &TeamsDto) -> Result<(), ApiError> {
    let mut seen = HashSet::new();
    for id in teams.entries().filter_map(RosterEntry::player_id) {
        if !seen.insert(id) {
            return Err(ApiError::domain(
                ErrorCode::DuplicatePlayer,
                "The same player cannot be added twice",
            ));
        }
    }
    Ok(())
}

pub fn roster_size(teams: Option<&TeamsDto>) -> usize {
    teams.map(|t| t.entries().count()).unwrap_or(0)
}
