use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{MatchChanges, MatchStore, NewMatch};
use crate::api_error::{ApiError, ErrorCode};
use crate::models::application::{Application, ApplicationStatus, NewApplication};
use crate::models::match_model::{
    Match, MatchDetails, MatchQuery, MatchScope, MatchSet, MatchStatus, Team, TeamWithPlayers,
    MATCH_CAPACITY, TEAM_CAPACITY,
};
use crate::models::player::Player;
use crate::service::team_composer::TeamDraft;

struct TeamSlot {
    team: Team,
    players: Vec<Uuid>,
}

#[derive(Default)]
struct MemoryState {
    matches: HashMap<Uuid, Match>,
    teams: HashMap<Uuid, Vec<TeamSlot>>,
    roster: HashMap<Uuid, Vec<Uuid>>,
    players: HashMap<Uuid, Player>,
    applications: HashMap<Uuid, Application>,
    sets: Vec<MatchSet>,
}

impl MemoryState {
    fn details(&self, match_id: Uuid, pending_applications: bool) -> Option<MatchDetails> {
        let match_data = self.matches.get(&match_id)?.clone();
        let teams = self
            .teams
            .get(&match_id)
            .map(|slots| {
                slots
                    .iter()
                    .map(|slot| TeamWithPlayers {
                        team: slot.team.clone(),
                        players: self.lookup_players(&slot.players),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let players = self
            .roster
            .get(&match_id)
            .map(|ids| self.lookup_players(ids))
            .unwrap_or_default();
        let sets = self
            .sets
            .iter()
            .filter(|s| s.match_id == match_id)
            .cloned()
            .collect();
        let mut applications: Vec<Application> = if pending_applications {
            self.applications
                .values()
                .filter(|a| a.match_id == match_id && a.is_pending())
                .cloned()
                .collect()
        } else {
            vec![]
        };
        applications.sort_by_key(|a| a.created_at);

        Some(MatchDetails {
            match_data,
            teams,
            players,
            sets,
            applications,
        })
    }

    fn lookup_players(&self, ids: &[Uuid]) -> Vec<Player> {
        ids.iter().filter_map(|id| self.players.get(id)).cloned().collect()
    }

    fn require_player(&self, player_id: Uuid) -> Result<(), ApiError> {
        if self.players.contains_key(&player_id) {
            Ok(())
        } else {
            Err(ApiError::domain(
                ErrorCode::NoPlayer,
                format!("No existing player with id: {}", player_id),
            ))
        }
    }

    /// Materialize a draft: create its guests and return every player id.
    fn materialize(&mut self, draft: TeamDraft) -> Result<Vec<Uuid>, ApiError> {
        for id in &draft.existing_players {
            self.require_player(*id)?;
        }
        let mut ids = draft.existing_players;
        for guest in draft.guests {
            let id = Uuid::new_v4();
            self.players.insert(id, guest.into_player(id));
            ids.push(id);
        }
        Ok(ids)
    }

    fn connect(&mut self, match_id: Uuid, team_number: i16, player_id: Uuid) -> Result<usize, ApiError> {
        self.require_player(player_id)?;
        let roster = self.roster.entry(match_id).or_default();
        if roster.contains(&player_id) {
            return Err(ApiError::domain(
                ErrorCode::PlayerAlreadyInMatch,
                "Player is already in the match",
            ));
        }
        let slot = self
            .teams
            .get_mut(&match_id)
            .and_then(|slots| slots.iter_mut().find(|s| s.team.team_number == team_number))
            .ok_or_else(|| ApiError::no_match(match_id))?;
        if slot.players.len() >= TEAM_CAPACITY {
            return Err(ApiError::team_full());
        }
        slot.players.push(player_id);
        roster.push(player_id);
        let size = roster.len();

        if size >= MATCH_CAPACITY {
            if let Some(m) = self.matches.get_mut(&match_id) {
                if m.status == MatchStatus::Pending {
                    m.status = MatchStatus::Closed;
                }
            }
        }
        Ok(size)
    }

    fn matches_query(&self, m: &Match, query: &MatchQuery) -> bool {
        let filters = &query.filters;
        if m.status != MatchStatus::Pending {
            return false;
        }
        if !filters.genders.is_empty() && !filters.genders.contains(&m.gender_id) {
            return false;
        }
        if !filters.statuses.is_empty() && !filters.statuses.contains(&m.status) {
            return false;
        }
        match &query.scope {
            MatchScope::Open => true,
            MatchScope::Player {
                player_id,
                created_by,
                is_player,
            } => {
                let created = *created_by && m.creator_player_id == *player_id;
                let playing = *is_player
                    && self
                        .roster
                        .get(&m.id)
                        .map(|r| r.contains(player_id))
                        .unwrap_or(false);
                created || playing
            }
        }
    }
}

/// Store kept entirely in process memory
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, ApiError> {
        self.state
            .read()
            .map_err(|_| ApiError::internal_error("Failed to read store"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, ApiError> {
        self.state
            .write()
            .map_err(|_| ApiError::internal_error("Failed to write store"))
    }

    /// Register a player record (players are owned by account management)
    pub fn insert_player(&self, player: Player) -> Result<(), ApiError> {
        self.write()?.players.insert(player.id, player);
        Ok(())
    }

    pub fn insert_set(&self, set: MatchSet) -> Result<(), ApiError> {
        self.write()?.sets.push(set);
        Ok(())
    }
}

#[async_trait]
impl MatchStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), ApiError> {
        self.read().map(|_| ())
    }

    async fn create_match(&self, new_match: NewMatch) -> Result<MatchDetails, ApiError> {
        let mut state = self.write()?;
        state.require_player(new_match.creator_player_id)?;

        let match_id = Uuid::new_v4();
        let mut slots = Vec::with_capacity(new_match.teams.len());
        let mut roster = Vec::new();
        for draft in new_match.teams {
            let team = Team {
                id: Uuid::new_v4(),
                match_id,
                team_number: draft.team_number,
            };
            let players = state.materialize(draft)?;
            roster.extend(players.iter().copied());
            slots.push(TeamSlot { team, players });
        }

        state.matches.insert(
            match_id,
            Match {
                id: match_id,
                date_time: new_match.date_time,
                location: new_match.location,
                description: new_match.description,
                duration: new_match.duration,
                points_deviation: new_match.points_deviation,
                category_id: new_match.category_id,
                gender_id: new_match.gender_id,
                creator_player_id: new_match.creator_player_id,
                status: new_match.status,
                created_at: Utc::now(),
            },
        );
        state.teams.insert(match_id, slots);
        state.roster.insert(match_id, roster);

        state
            .details(match_id, true)
            .ok_or_else(|| ApiError::internal_error("Created match vanished"))
    }

    async fn find_match(&self, match_id: Uuid) -> Result<Option<MatchDetails>, ApiError> {
        Ok(self.read()?.details(match_id, true))
    }

    async fn list_matches(&self, query: &MatchQuery) -> Result<(Vec<MatchDetails>, i64), ApiError> {
        let state = self.read()?;
        let mut selected: Vec<&Match> = state
            .matches
            .values()
            .filter(|m| state.matches_query(m, query))
            .collect();
        match query.scope {
            MatchScope::Open => selected.sort_by_key(|m| m.date_time),
            MatchScope::Player { .. } => {
                selected.sort_by(|a, b| b.created_at.cmp(&a.created_at))
            }
        }

        let total = selected.len() as i64;
        let page = selected
            .into_iter()
            .skip(query.filters.offset() as usize)
            .take(query.filters.page_size as usize)
            .filter_map(|m| {
                let with_applications = match query.scope {
                    MatchScope::Player {
                        player_id,
                        created_by: true,
                        ..
                    } => m.creator_player_id == player_id,
                    _ => false,
                };
                state.details(m.id, with_applications)
            })
            .collect();
        Ok((page, total))
    }

    async fn update_match(&self, match_id: Uuid, changes: &MatchChanges) -> Result<bool, ApiError> {
        let mut state = self.write()?;
        let Some(m) = state.matches.get_mut(&match_id) else {
            return Ok(false);
        };
        if let Some(date_time) = changes.date_time {
            m.date_time = date_time;
        }
        if let Some(location) = &changes.location {
            m.location = location.clone();
        }
        if let Some(description) = &changes.description {
            m.description = Some(description.clone());
        }
        if let Some(duration) = changes.duration {
            m.duration = duration;
        }
        if let Some(points_deviation) = changes.points_deviation {
            m.points_deviation = points_deviation;
        }
        if let Some(category_id) = changes.category_id {
            m.category_id = category_id;
        }
        if let Some(gender_id) = changes.gender_id {
            m.gender_id = gender_id;
        }
        Ok(true)
    }

    async fn replace_teams(&self, match_id: Uuid, teams: Vec<TeamDraft>) -> Result<(), ApiError> {
        let mut state = self.write()?;
        if !state.matches.contains_key(&match_id) {
            return Err(ApiError::no_match(match_id));
        }

        let mut filled = Vec::with_capacity(teams.len());
        for draft in teams {
            let number = draft.team_number;
            filled.push((number, state.materialize(draft)?));
        }

        let mut roster = Vec::new();
        let slots = state.teams.entry(match_id).or_default();
        for slot in slots.iter_mut() {
            slot.players.clear();
        }
        for (number, players) in filled {
            if let Some(slot) = slots.iter_mut().find(|s| s.team.team_number == number) {
                roster.extend(players.iter().copied());
                slot.players = players;
            }
        }
        state.roster.insert(match_id, roster);
        Ok(())
    }

    async fn set_match_status(&self, match_id: Uuid, status: MatchStatus) -> Result<bool, ApiError> {
        let mut state = self.write()?;
        match state.matches.get_mut(&match_id) {
            Some(m) => {
                m.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn add_player_to_team(
        &self,
        match_id: Uuid,
        team_number: i16,
        player_id: Uuid,
    ) -> Result<usize, ApiError> {
        self.write()?.connect(match_id, team_number, player_id)
    }

    async fn remove_player_from_team(
        &self,
        match_id: Uuid,
        team_number: i16,
        player_id: Uuid,
    ) -> Result<(), ApiError> {
        let mut state = self.write()?;
        if let Some(roster) = state.roster.get_mut(&match_id) {
            roster.retain(|id| *id != player_id);
        }
        if let Some(slot) = state
            .teams
            .get_mut(&match_id)
            .and_then(|slots| slots.iter_mut().find(|s| s.team.team_number == team_number))
        {
            slot.players.retain(|id| *id != player_id);
        }
        Ok(())
    }

    async fn find_player(&self, player_id: Uuid) -> Result<Option<Player>, ApiError> {
        Ok(self.read()?.players.get(&player_id).cloned())
    }

    async fn delete_player(&self, player_id: Uuid) -> Result<(), ApiError> {
        let mut state = self.write()?;
        state.players.remove(&player_id);
        for roster in state.roster.values_mut() {
            roster.retain(|id| *id != player_id);
        }
        for slot in state.teams.values_mut().flatten() {
            slot.players.retain(|id| *id != player_id);
        }
        Ok(())
    }

    async fn count_completed_matches(&self, player_id: Uuid) -> Result<i64, ApiError> {
        let state = self.read()?;
        let count = state
            .matches
            .values()
            .filter(|m| m.status == MatchStatus::Completed)
            .filter(|m| {
                state
                    .roster
                    .get(&m.id)
                    .map(|r| r.contains(&player_id))
                    .unwrap_or(false)
            })
            .count();
        Ok(count as i64)
    }

    async fn find_application(&self, application_id: Uuid) -> Result<Option<Application>, ApiError> {
        Ok(self.read()?.applications.get(&application_id).cloned())
    }

    async fn find_player_application(
        &self,
        match_id: Uuid,
        player_id: Uuid,
    ) -> Result<Option<Application>, ApiError> {
        Ok(self
            .read()?
            .applications
            .values()
            .find(|a| a.match_id == match_id && a.player_id == player_id)
            .cloned())
    }

    async fn create_application(&self, new_application: NewApplication) -> Result<Application, ApiError> {
        let mut state = self.write()?;
        state.require_player(new_application.player_id)?;
        if !state.matches.contains_key(&new_application.match_id) {
            return Err(ApiError::no_match(new_application.match_id));
        }
        let application = Application {
            id: Uuid::new_v4(),
            match_id: new_application.match_id,
            player_id: new_application.player_id,
            team_number: new_application.team_number,
            message: new_application.message,
            phone: new_application.phone,
            status: ApplicationStatus::Pending,
            created_at: Utc::now(),
        };
        state.applications.insert(application.id, application.clone());
        Ok(application)
    }

    async fn accept_application(
        &self,
        application_id: Uuid,
        team_number: i16,
    ) -> Result<(Application, usize), ApiError> {
        let mut state = self.write()?;
        let application = state
            .applications
            .get(&application_id)
            .cloned()
            .ok_or_else(|| ApiError::domain(ErrorCode::ApplicationNoExist, "Invalid application"))?;
        if !application.is_pending() {
            return Err(ApiError::domain(ErrorCode::ApplicationClosed, "Application is closed"));
        }

        let roster_size = state.connect(application.match_id, team_number, application.player_id)?;
        let stored = state
            .applications
            .get_mut(&application_id)
            .ok_or_else(|| ApiError::internal_error("Application vanished"))?;
        stored.status = ApplicationStatus::Accepted;
        Ok((stored.clone(), roster_size))
    }

    async fn set_application_status(
        &self,
        application_id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Application, ApiError> {
        let mut state = self.write()?;
        let application = state
            .applications
            .get_mut(&application_id)
            .ok_or_else(|| ApiError::domain(ErrorCode::ApplicationNoExist, "Invalid application"))?;
        if !application.is_pending() {
            return Err(ApiError::domain(ErrorCode::ApplicationClosed, "Application is closed"));
        }
        application.status = status;
        Ok(application.clone())
    }
}
