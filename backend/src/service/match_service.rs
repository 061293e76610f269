use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::api_error::{ApiError, ErrorCode};
use crate::models::match_model::*;
use crate::service::team_composer::{compose_teams, ensure_distinct_players, roster_size};
use crate::store::{MatchChanges, MatchStore, NewMatch};

/// Match lifecycle: creation, listing, roster changes and status transitions
#[derive(Clone)]
pub struct MatchService {
    store: Arc<dyn MatchStore>,
}

impl MatchService {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    // =============================================================================
    // CREATE MATCH
    // =============================================================================

    /// Create a match owned by `creator_id`. A match created with four
    /// players starts CLOSED.
    pub async fn create_match(
        &self,
        creator_id: Uuid,
        dto: CreateMatchDto,
    ) -> Result<MatchDetails, ApiError> {
        dto.validate()?;
        if let Some(teams) = &dto.teams {
            ensure_distinct_players(teams)?;
        }

        let date_time = combine_date_time(dto.date, &dto.time)?;
        let status = MatchStatus::for_roster_size(roster_size(dto.teams.as_ref()));
        let teams = compose_teams(dto.teams.as_ref(), dto.gender_id)?;
        let invited: Vec<Uuid> = teams
            .iter()
            .flat_map(|t| t.existing_players.iter().copied())
            .collect();

        let created = self
            .store
            .create_match(NewMatch {
                date_time,
                location: dto.location,
                description: dto.description,
                duration: dto.duration,
                points_deviation: dto.points_deviation,
                category_id: dto.category_id,
                gender_id: dto.gender_id,
                creator_player_id: creator_id,
                status,
                teams,
            })
            .await?;

        // Invited players are not notified yet; the ids are logged for follow-up.
        info!(
            match_id = %created.match_data.id,
            creator = %creator_id,
            status = %status,
            invited = ?invited,
            "Match created"
        );

        Ok(created)
    }

    // =============================================================================
    // QUERY METHODS
    // =============================================================================

    /// Pending matches matching the filters, with the total count.
    pub async fn get_open_matches(
        &self,
        filters: MatchFilters,
    ) -> Result<(Vec<MatchDetails>, i64), ApiError> {
        debug!(page = filters.page, page_size = filters.page_size, "Listing open matches");
        self.store
            .list_matches(&MatchQuery {
                scope: MatchScope::Open,
                filters,
            })
            .await
    }

    /// Pending matches the player created and/or plays in. With neither
    /// flag set both apply. Pending applications are attached to the
    /// matches the player created when `created_by` is set.
    pub async fn get_my_matches(
        &self,
        player_id: Uuid,
        filters: MatchFilters,
    ) -> Result<(Vec<MatchDetails>, i64), ApiError> {
        let (created_by, is_player) = match (filters.created_by, filters.is_player) {
            (false, false) => (true, true),
            flags => flags,
        };
        debug!(player_id = %player_id, created_by, is_player, "Listing player matches");
        self.store
            .list_matches(&MatchQuery {
                scope: MatchScope::Player {
                    player_id,
                    created_by,
                    is_player,
                },
                filters,
            })
            .await
    }

    pub async fn get_match_by_id(&self, match_id: Uuid) -> Result<Option<MatchDetails>, ApiError> {
        self.store.find_match(match_id).await
    }

    async fn require_match(&self, match_id: Uuid) -> Result<MatchDetails, ApiError> {
        self.store
            .find_match(match_id)
            .await?
            .ok_or_else(|| ApiError::no_match(match_id))
    }

    /// Number of COMPLETED matches the player is rostered in
    pub async fn get_player_matches_count(&self, player_id: Uuid) -> Result<i64, ApiError> {
        self.store.count_completed_matches(player_id).await
    }

    // =============================================================================
    // STATUS TRANSITIONS
    // =============================================================================

    /// Cancel a match, whatever its current status.
    pub async fn delete_match(&self, match_id: Uuid) -> Result<MatchDetails, ApiError> {
        self.change_state(match_id, MatchStatus::Cancelled).await?;
        info!(match_id = %match_id, "Match cancelled");
        self.require_match(match_id).await
    }

    /// Unconditional status transition
    pub async fn change_state(&self, match_id: Uuid, status: MatchStatus) -> Result<(), ApiError> {
        if !self.store.set_match_status(match_id, status).await? {
            return Err(ApiError::no_match(match_id));
        }
        debug!(match_id = %match_id, status = %status, "Match status changed");
        Ok(())
    }

    // =============================================================================
    // ROSTER CHANGES
    // =============================================================================

    pub async fn add_player_to_match(
        &self,
        match_id: Uuid,
        team_number: i16,
        player_id: Uuid,
    ) -> Result<MatchDetails, ApiError> {
        validate_team_number(team_number)?;
        let current = self.require_match(match_id).await?;

        if current.contains_player(player_id) {
            return Err(ApiError::domain(
                ErrorCode::PlayerAlreadyInMatch,
                "Player is already in the match",
            ));
        }
        if current.is_team_full(team_number) {
            return Err(ApiError::team_full());
        }

        let roster_size = self
            .store
            .add_player_to_team(match_id, team_number, player_id)
            .await?;
        info!(
            match_id = %match_id,
            player_id = %player_id,
            team_number,
            roster_size,
            "Player added to match"
        );

        self.require_match(match_id).await
    }

    /// Remove a player from the match. Guests are deleted outright and the
    /// match always goes back to PENDING.
    pub async fn delete_player_from_match(
        &self,
        match_id: Uuid,
        player_id: Uuid,
    ) -> Result<MatchDetails, ApiError> {
        let current = self.require_match(match_id).await?;

        let team_number = current
            .team_of(player_id)
            .map(|t| t.team.team_number)
            .ok_or_else(|| ApiError::domain(ErrorCode::Unauthorized, "Player is not in the match"))?;

        let player = self.store.find_player(player_id).await?.ok_or_else(|| {
            ApiError::domain(ErrorCode::NoPlayer, format!("No existing player with id: {}", player_id))
        })?;

        self.store
            .remove_player_from_team(match_id, team_number, player_id)
            .await?;
        if player.is_guest() {
            self.store.delete_player(player_id).await?;
            debug!(player_id = %player_id, "Guest player deleted");
        }
        if current.match_data.status != MatchStatus::Pending {
            self.change_state(match_id, MatchStatus::Pending).await?;
        }

        info!(match_id = %match_id, player_id = %player_id, "Player removed from match");
        self.require_match(match_id).await
    }

    // =============================================================================
    // UPDATE MATCH
    // =============================================================================

    /// Partial update. A supplied roster replaces both teams; guests left
    /// out of it are deleted.
    pub async fn update_match(
        &self,
        match_id: Uuid,
        dto: UpdateMatchDto,
    ) -> Result<MatchDetails, ApiError> {
        dto.validate()?;
        if let Some(teams) = &dto.teams {
            ensure_distinct_players(teams)?;
        }
        let current = self.require_match(match_id).await?;

        let date_time = match (dto.date, dto.time.as_deref()) {
            (Some(date), Some(time)) => Some(combine_date_time(date, time)?),
            _ => None,
        };
        let changes = MatchChanges {
            date_time,
            location: dto.location,
            description: dto.description,
            duration: dto.duration,
            points_deviation: dto.points_deviation,
            category_id: dto.category_id,
            gender_id: dto.gender_id,
        };
        if !changes.is_empty() && !self.store.update_match(match_id, &changes).await? {
            return Err(ApiError::no_match(match_id));
        }

        if let Some(teams) = dto.teams {
            let gender_id = dto.gender_id.unwrap_or(current.match_data.gender_id);
            let drafts = compose_teams(Some(&teams), gender_id)?;
            let kept: HashSet<Uuid> = teams.entries().filter_map(|e| e.player_id()).collect();
            let new_size = roster_size(Some(&teams));

            self.store.replace_teams(match_id, drafts).await?;

            for dropped in current
                .players
                .iter()
                .filter(|p| p.is_guest() && !kept.contains(&p.id))
            {
                self.store.delete_player(dropped.id).await?;
            }

            let status = current.match_data.status;
            if !status.is_terminal() {
                let derived = MatchStatus::for_roster_size(new_size);
                if derived != status {
                    self.change_state(match_id, derived).await?;
                }
            }
            info!(match_id = %match_id, players = new_size, "Match teams replaced");
        }

        info!(match_id = %match_id, "Match updated");
        self.require_match(match_id).await
    }
}
