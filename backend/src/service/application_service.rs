use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::api_error::{ApiError, ErrorCode};
use crate::models::application::*;
use crate::models::match_model::{validate_team_number, MatchDetails, MatchStatus};
use crate::store::MatchStore;

/// Applications to join a match and their resolution by the match creator
#[derive(Clone)]
pub struct ApplicationService {
    store: Arc<dyn MatchStore>,
}

impl ApplicationService {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    /// Apply to a match. Creator self-application and gender compatibility
    /// are not checked.
    pub async fn apply_to_match(
        &self,
        player_id: Uuid,
        dto: CreateApplicationDto,
    ) -> Result<Application, ApiError> {
        dto.validate()?;

        let details = self
            .store
            .find_match(dto.match_id)
            .await?
            .ok_or_else(|| ApiError::no_match(dto.match_id))?;

        if self
            .store
            .find_player_application(dto.match_id, player_id)
            .await?
            .is_some()
        {
            return Err(ApiError::domain(
                ErrorCode::ApplicationAlreadyExists,
                "You have already applied to this match",
            ));
        }

        if let Some(team_number) = dto.team_number {
            if details.is_team_full(team_number) {
                return Err(ApiError::team_full());
            }
        }

        let application = self
            .store
            .create_application(NewApplication {
                match_id: dto.match_id,
                player_id,
                team_number: dto.team_number,
                message: dto.message,
                phone: dto.phone,
            })
            .await?;

        info!(
            application_id = %application.id,
            match_id = %application.match_id,
            player_id = %player_id,
            "Application created"
        );
        Ok(application)
    }

    /// Accept a pending application, placing the applicant in `team_number`.
    pub async fn accept_application(
        &self,
        acting_player_id: Uuid,
        application_id: Uuid,
        team_number: i16,
    ) -> Result<Application, ApiError> {
        validate_team_number(team_number)?;
        let (application, details) = self
            .load_for_resolution(acting_player_id, application_id)
            .await?;

        // the requested team is checked even when the creator places the
        // applicant elsewhere
        let requested_full = application
            .team_number
            .map(|requested| details.is_team_full(requested))
            .unwrap_or(false);
        if requested_full || details.is_team_full(team_number) {
            return Err(ApiError::team_full());
        }
        if details.contains_player(application.player_id) {
            return Err(ApiError::domain(
                ErrorCode::PlayerAlreadyInMatch,
                "Player is already in the match",
            ));
        }

        let (accepted, roster_size) = self
            .store
            .accept_application(application_id, team_number)
            .await?;
        info!(
            application_id = %application_id,
            match_id = %accepted.match_id,
            player_id = %accepted.player_id,
            team_number,
            roster_size,
            "Application accepted"
        );
        Ok(accepted)
    }

    /// Reject a pending application; the roster is untouched.
    pub async fn reject_application(
        &self,
        acting_player_id: Uuid,
        application_id: Uuid,
    ) -> Result<Application, ApiError> {
        self.load_for_resolution(acting_player_id, application_id)
            .await?;

        let rejected = self
            .store
            .set_application_status(application_id, ApplicationStatus::Rejected)
            .await?;
        info!(
            application_id = %application_id,
            match_id = %rejected.match_id,
            "Application rejected"
        );
        Ok(rejected)
    }

    /// Guards shared by accept and reject, in reporting order: existence,
    /// creator authorization, open application, open match.
    async fn load_for_resolution(
        &self,
        acting_player_id: Uuid,
        application_id: Uuid,
    ) -> Result<(Application, MatchDetails), ApiError> {
        let application = self
            .store
            .find_application(application_id)
            .await?
            .ok_or_else(|| ApiError::domain(ErrorCode::ApplicationNoExist, "Invalid application"))?;

        let details = self
            .store
            .find_match(application.match_id)
            .await?
            .ok_or_else(|| ApiError::domain(ErrorCode::ApplicationNoExist, "Invalid application"))?;

        if details.match_data.creator_player_id != acting_player_id {
            warn!(
                application_id = %application_id,
                acting_player_id = %acting_player_id,
                "Non-creator tried to resolve an application"
            );
            return Err(ApiError::domain(
                ErrorCode::Unauthorized,
                "Only the match creator can resolve applications",
            ));
        }
        if !application.is_pending() {
            return Err(ApiError::domain(ErrorCode::ApplicationClosed, "Application is closed"));
        }
        if details.match_data.status != MatchStatus::Pending {
            return Err(ApiError::domain(ErrorCode::ApplicationMatchClosed, "Match is closed"));
        }

        Ok((application, details))
    }
}
