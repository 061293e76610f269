use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Player {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub display_name: Option<String>,
    pub gender_id: i32,
    pub category_id: Option<i32>,
    pub position: Option<String>,
    pub phone: Option<String>,
}

impl Player {
    /// Guests have no linked user account and only exist for a single match
    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }
}

/// Guest player to be created together with its team
#[derive(Debug, Clone, PartialEq)]
pub struct NewGuestPlayer {
    pub display_name: Option<String>,
    pub gender_id: i32,
    pub category_id: Option<i32>,
    pub position: Option<String>,
    pub phone: Option<String>,
}

impl NewGuestPlayer {
    pub fn into_player(self, id: Uuid) -> Player {
        Player {
            id,
            user_id: None,
            display_name: self.display_name,
            gender_id: self.gender_id,
            category_id: self.category_id,
            position: self.position,
            phone: self.phone,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerMatchesCount {
    pub player_id: Uuid,
    pub completed_matches: i64,
}
