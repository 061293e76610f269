// Core models
pub mod application;
pub mod match_model;
pub mod player;
