use crate::api_error::ApiError;
use crate::http::{acting_player, AppState};
use crate::models::match_model::*;
use crate::models::player::PlayerMatchesCount;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

fn page(items: Vec<MatchDetails>, total: i64, filters: &MatchFilters) -> Page<MatchDetails> {
    Page {
        items,
        total,
        page: filters.page,
        page_size: filters.page_size,
    }
}

// =============================================================================
// CREATE MATCH
// =============================================================================

/// POST /api/matches
/// Create a match owned by the calling player
pub async fn create_match(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateMatchDto>,
) -> Result<impl Responder, ApiError> {
    let creator_id = acting_player(&req)?;
    info!(creator = %creator_id, location = %body.location, "Received create match request");

    let result = state
        .match_service
        .create_match(creator_id, body.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(result))
}

// =============================================================================
// LISTINGS
// =============================================================================

/// GET /api/matches
/// Open (pending) matches, paginated
pub async fn get_open_matches(
    state: web::Data<AppState>,
    query: web::Query<GetMatchesQuery>,
) -> Result<impl Responder, ApiError> {
    let filters = MatchFilters::try_from(query.into_inner())?;
    let (items, total) = state.match_service.get_open_matches(filters.clone()).await?;

    Ok(HttpResponse::Ok().json(page(items, total, &filters)))
}

/// GET /api/matches/mine
/// Pending matches the caller created and/or plays in
pub async fn get_my_matches(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<GetMatchesQuery>,
) -> Result<impl Responder, ApiError> {
    let player_id = acting_player(&req)?;
    let filters = MatchFilters::try_from(query.into_inner())?;
    let (items, total) = state
        .match_service
        .get_my_matches(player_id, filters.clone())
        .await?;

    Ok(HttpResponse::Ok().json(page(items, total, &filters)))
}

/// GET /api/matches/:id
pub async fn get_match(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let match_id = path.into_inner();

    let result = state
        .match_service
        .get_match_by_id(match_id)
        .await?
        .ok_or_else(|| ApiError::no_match(match_id))?;

    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/players/:id/matches/count
pub async fn get_player_matches_count(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let player_id = path.into_inner();
    let completed_matches = state
        .match_service
        .get_player_matches_count(player_id)
        .await?;

    Ok(HttpResponse::Ok().json(PlayerMatchesCount {
        player_id,
        completed_matches,
    }))
}

// =============================================================================
// UPDATE / CANCEL
// =============================================================================

/// PUT /api/matches/:id
pub async fn update_match(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateMatchDto>,
) -> Result<impl Responder, ApiError> {
    let match_id = path.into_inner();
    info!(match_id = %match_id, "Received update match request");

    let result = state
        .match_service
        .update_match(match_id, body.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// DELETE /api/matches/:id
/// Cancels the match; the record is kept
pub async fn delete_match(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let match_id = path.into_inner();
    info!(match_id = %match_id, "Received delete match request");

    let result = state.match_service.delete_match(match_id).await?;

    Ok(HttpResponse::Ok().json(result))
}

// =============================================================================
// ROSTER
// =============================================================================

/// POST /api/matches/:id/players
pub async fn add_player(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<AddPlayerDto>,
) -> Result<impl Responder, ApiError> {
    let match_id = path.into_inner();
    body.validate()?;
    info!(
        match_id = %match_id,
        player_id = %body.player_id,
        team_number = body.team_number,
        "Received add player request"
    );

    let result = state
        .match_service
        .add_player_to_match(match_id, body.team_number, body.player_id)
        .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// DELETE /api/matches/:id/players/:player_id
pub async fn delete_player(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<impl Responder, ApiError> {
    let (match_id, player_id) = path.into_inner();
    info!(match_id = %match_id, player_id = %player_id, "Received remove player request");

    let result = state
        .match_service
        .delete_player_from_match(match_id, player_id)
        .await?;

    Ok(HttpResponse::Ok().json(result))
}

// =============================================================================
// ROUTE CONFIGURATION
// =============================================================================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/matches")
            .service(
                web::resource("")
                    .route(web::post().to(create_match))
                    .route(web::get().to(get_open_matches)),
            )
            .route("/mine", web::get().to(get_my_matches))
            .service(
                web::resource("/{id}")
                    .route(web::get().to(get_match))
                    .route(web::put().to(update_match))
                    .route(web::delete().to(delete_match)),
            )
            .route("/{id}/players", web::post().to(add_player))
            .route("/{id}/players/{player_id}", web::delete().to(delete_player)),
    )
    .route(
        "/players/{id}/matches/count",
        web::get().to(get_player_matches_count),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_match_request_deserialization() {
        let json = r#"{
            "date": "2025-03-14",
            "time": "19:30",
            "location": "Club Norte",
            "category_id": 4,
            "points_deviation": 1,
            "gender_id": 1,
            "duration": 90,
            "teams": {
                "team1": [{"id": "67e55044-10b1-426f-9247-bb680e5fe0c8"}],
                "team2": [{"display_name": "Guest"}]
            }
        }"#;
        let dto: CreateMatchDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.location, "Club Norte");
        assert!(dto.description.is_none());
        let teams = dto.teams.unwrap();
        assert_eq!(teams.entries().count(), 2);
    }

    #[test]
    fn test_add_player_request_deserialization() {
        let json = r#"{"team_number":2,"player_id":"67e55044-10b1-426f-9247-bb680e5fe0c8"}"#;
        let dto: AddPlayerDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.team_number, 2);
    }
}
