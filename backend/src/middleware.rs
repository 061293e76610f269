use actix_cors::Cors;
use actix_web::http::{header, Method};

/// CORS policy for the API. An empty origin list admits any origin, which is
/// what local development runs with.
pub fn cors_middleware(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600);

    if allowed_origins.is_empty() {
        return cors.allow_any_origin();
    }
    allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}
