use crate::auth::jwt_service::{Claims, JwtError, JwtService};
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Authentication middleware for protecting routes
pub struct AuthMiddleware {
    jwt_service: Rc<JwtService>,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self {
            jwt_service: Rc::new(jwt_service),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            jwt_service: self.jwt_service.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    jwt_service: Rc<JwtService>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .map(|value| value.strip_prefix("Bearer ").map(str::to_owned));

        let claims = match token {
            Some(Some(token)) => self.jwt_service.validate_token(&token),
            Some(None) => {
                warn!(path = %req.path(), "Invalid authorization header format");
                return Box::pin(async { Err(ErrorUnauthorized("Invalid authorization header format")) });
            }
            None => {
                warn!(path = %req.path(), "Missing authorization header");
                return Box::pin(async { Err(ErrorUnauthorized("Missing authorization header")) });
            }
        };

        match claims {
            Ok(claims) => {
                debug!(player_id = %claims.player_id, "Request authenticated");
                req.extensions_mut().insert(claims);
                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(JwtError::TokenExpired) => {
                warn!("Token expired");
                Box::pin(async { Err(ErrorUnauthorized("Token expired")) })
            }
            Err(e) => {
                warn!(error = %e, "Token validation failed");
                let message = format!("Invalid token: {}", e);
                Box::pin(async move { Err(ErrorUnauthorized(message)) })
            }
        }
    }
}

/// Extract claims from request (use in route handlers)
pub trait ClaimsExt {
    fn claims(&self) -> Option<Claims>;
    fn player_id(&self) -> Option<Uuid>;
}

impl ClaimsExt for actix_web::HttpRequest {
    fn claims(&self) -> Option<Claims> {
        self.extensions().get::<Claims>().cloned()
    }

    fn player_id(&self) -> Option<Uuid> {
        self.claims().map(|c| c.player_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt_service::JwtConfig;
    use actix_web::{test, web, App, HttpRequest, HttpResponse};
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    async fn whoami(req: HttpRequest) -> HttpResponse {
        match req.player_id() {
            Some(id) => HttpResponse::Ok().body(id.to_string()),
            None => HttpResponse::InternalServerError().finish(),
        }
    }

    fn bearer(player_id: Uuid) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            player_id,
            exp: (now + Duration::minutes(5)).timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"middleware_secret"),
        )
        .unwrap();
        format!("Bearer {}", token)
    }

    #[actix_web::test]
    async fn test_claims_reach_handler() {
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(JwtService::new(JwtConfig::new(
                    "middleware_secret",
                ))))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let player_id = Uuid::new_v4();
        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", bearer(player_id)))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, player_id.to_string().as_bytes());
    }

    #[actix_web::test]
    async fn test_rejects_missing_or_malformed_header() {
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(JwtService::new(JwtConfig::new(
                    "middleware_secret",
                ))))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/whoami").to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), 401);

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", "Token abc"))
            .to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), 401);
    }
}
