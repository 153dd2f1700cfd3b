//! Request and response payloads for the collaborator REST endpoints.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::dto::validation::validate_user_name;

/// Response of `GET /api/categories`.
#[derive(Debug, Deserialize)]
pub struct CategoriesResponse {
    /// Question categories available for party creation.
    pub categories: Vec<String>,
}

/// Body of `POST /api/user/create`.
#[derive(Debug, Serialize)]
pub struct CreateUserRequest {
    /// Display name chosen at login.
    pub user_name: String,
}

impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_user_name(&self.user_name) {
            errors.add("user_name", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Response of `POST /api/user/create`.
#[derive(Debug, Deserialize)]
pub struct CreateUserResponse {
    /// Server-issued id for the new player.
    pub user_id: String,
}

/// One entry of the lobby's party listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PartySummary {
    /// Opaque party identifier.
    pub party_id: String,
    /// User id of the party creator.
    pub creator: String,
    /// Number of rounds the party will play.
    pub rounds: u32,
    /// User ids of the players who joined so far.
    #[serde(default)]
    pub participants: Vec<String>,
    /// Lifecycle label reported by the server (e.g. `waiting_for_players`).
    #[serde(default)]
    pub state: Option<String>,
}

/// Response of `GET /api/parties`.
#[derive(Debug, Deserialize)]
pub struct PartiesResponse {
    /// All parties currently known to the server.
    pub parties: Vec<PartySummary>,
}

/// Body of `POST /api/party/init`.
#[derive(Debug, Serialize, Validate)]
pub struct PartyInitRequest {
    /// Creator's player id.
    pub player_id: String,
    /// Question category for every round.
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub category: String,
    /// Number of rounds to play.
    #[validate(range(min = 1, max = 100, message = "rounds must be between 1 and 100"))]
    pub rounds: u32,
    /// Per-question time budget in seconds.
    #[validate(range(min = 5, max = 600, message = "timeout must be between 5 and 600 seconds"))]
    pub timeout: u32,
}

/// Response of `POST /api/party/init`.
#[derive(Debug, Deserialize)]
pub struct PartyInitResponse {
    /// Id of the freshly created party.
    pub party_id: String,
}

/// Body of `POST /api/party/{id}/join`.
#[derive(Debug, Serialize)]
pub struct JoinPartyRequest {
    /// Player joining the party.
    pub user_id: String,
}

/// Response of `POST /api/party/{id}/join`.
#[derive(Debug, Deserialize)]
pub struct JoinPartyResponse {
    /// Human-readable acknowledgement.
    #[serde(default)]
    pub message: Option<String>,
    /// Id of the game instance backing the party.
    #[serde(default)]
    pub game_id: Option<String>,
}

/// Response of `GET /api/party/{id}`, reduced to the field the session needs.
#[derive(Debug, Deserialize)]
pub struct PartyDetail {
    /// User id of the party creator; gates the start-game command.
    pub creator_id: String,
}
