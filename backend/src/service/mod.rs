// Service layer module
pub mod application_service;
pub mod match_service;
pub mod team_composer;


pub use application_service::ApplicationService;
pub use match_service::MatchService;
