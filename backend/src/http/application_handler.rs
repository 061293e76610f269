use crate::api_error::ApiError;
use crate::http::{acting_player, AppState};
use crate::models::application::*;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// POST /api/applications
/// Apply to join a pending match
pub async fn apply_to_match(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateApplicationDto>,
) -> Result<impl Responder, ApiError> {
    let player_id = acting_player(&req)?;
    info!(player_id = %player_id, match_id = %body.match_id, "Received application");

    let result = state
        .application_service
        .apply_to_match(player_id, body.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(result))
}

/// PUT /api/applications/accept/:id
/// Creator accepts an application into the given team
pub async fn accept_application(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<AcceptApplicationDto>,
) -> Result<impl Responder, ApiError> {
    let acting = acting_player(&req)?;
    body.validate()?;
    let application_id = path.into_inner();

    let result = state
        .application_service
        .accept_application(acting, application_id, body.team_number)
        .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// PUT /api/applications/reject/:id
pub async fn reject_application(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<impl Responder, ApiError> {
    let acting = acting_player(&req)?;
    let application_id = path.into_inner();

    let result = state
        .application_service
        .reject_application(acting, application_id)
        .await?;

    Ok(HttpResponse::Ok().json(result))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/applications")
            .route("", web::post().to(apply_to_match))
            .route("/accept/{id}", web::put().to(accept_application))
            .route("/reject/{id}", web::put().to(reject_application)),
    );
}
