pub mod application_handler;
pub mod health;
pub mod match_handler;

use std::sync::Arc;

use actix_web::{web, HttpRequest};
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::auth::{AuthMiddleware, ClaimsExt, JwtConfig, JwtService};
use crate::service::{ApplicationService, MatchService};
use crate::store::MatchStore;

/// Application state shared by every handler
pub struct AppState {
    pub store: Arc<dyn MatchStore>,
    pub match_service: MatchService,
    pub application_service: ApplicationService,
}

impl AppState {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        let match_service = MatchService::new(store.clone());
        let application_service = ApplicationService::new(store.clone());
        Self {
            store,
            match_service,
            application_service,
        }
    }
}

/// Player acting on the request, taken from the validated token
pub(crate) fn acting_player(req: &HttpRequest) -> Result<Uuid, ApiError> {
    req.player_id().ok_or(ApiError::Unauthorized)
}

/// Mount every route under `/api`. Only the health check is public.
pub fn configure_routes(cfg: &mut web::ServiceConfig, jwt_config: &JwtConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .service(
                web::scope("")
                    .wrap(AuthMiddleware::new(JwtService::new(jwt_config.clone())))
                    .configure(match_handler::configure_routes)
                    .configure(application_handler::configure_routes),
            ),
    );
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::auth::Claims;
    use crate::models::player::Player;
    use crate::store::InMemoryStore;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub const SECRET: &str = "route_test_secret";

    pub fn jwt_config() -> JwtConfig {
        JwtConfig::new(SECRET)
    }

    pub fn bearer(player_id: Uuid) -> (&'static str, String) {
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            player_id,
            exp: (now + Duration::minutes(10)).timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        ("Authorization", format!("Bearer {}", token))
    }

    pub fn register(store: &InMemoryStore) -> Uuid {
        let id = Uuid::new_v4();
        store
            .insert_player(Player {
                id,
                user_id: Some(Uuid::new_v4()),
                display_name: None,
                gender_id: 1,
                category_id: None,
                position: None,
                phone: None,
            })
            .unwrap();
        id
    }
}
