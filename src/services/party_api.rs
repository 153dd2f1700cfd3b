use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use validator::Validate;

use crate::dto::api::{
    CategoriesResponse, CreateUserRequest, CreateUserResponse, JoinPartyRequest,
    JoinPartyResponse, PartiesResponse, PartyDetail, PartyInitRequest, PartyInitResponse,
    PartySummary,
};
use crate::error::ApiError;

/// Typed client for the collaborator REST endpoints.
///
/// These calls are plain request/response glue around the lobby and
/// game-creation flows; a failure is surfaced to the caller and never
/// retried automatically.
#[derive(Debug, Clone)]
pub struct PartyApi {
    client: Client,
    base_url: String,
}

impl PartyApi {
    /// Create a client for the API served at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// `GET /api/categories` — question categories available for creation.
    pub async fn categories(&self) -> Result<Vec<String>, ApiError> {
        let response: CategoriesResponse = self.get("/api/categories").await?;
        Ok(response.categories)
    }

    /// `POST /api/user/create` — register a player and obtain their id.
    pub async fn create_user(&self, user_name: &str) -> Result<CreateUserResponse, ApiError> {
        let request = CreateUserRequest {
            user_name: user_name.to_string(),
        };
        request.validate()?;
        self.post("/api/user/create", &request).await
    }

    /// `GET /api/parties` — every party currently known to the server.
    pub async fn parties(&self) -> Result<Vec<PartySummary>, ApiError> {
        let response: PartiesResponse = self.get("/api/parties").await?;
        Ok(response.parties)
    }

    /// `POST /api/party/init` — create a party and get its id back.
    pub async fn init_party(
        &self,
        request: &PartyInitRequest,
    ) -> Result<PartyInitResponse, ApiError> {
        request.validate()?;
        self.post("/api/party/init", request).await
    }

    /// `POST /api/party/{id}/join` — join a party before playing it.
    pub async fn join_party(
        &self,
        party_id: &str,
        user_id: &str,
    ) -> Result<JoinPartyResponse, ApiError> {
        let request = JoinPartyRequest {
            user_id: user_id.to_string(),
        };
        self.post(&format!("/api/party/{party_id}/join"), &request)
            .await
    }

    /// `GET /api/party/{id}` — party metadata; the session only needs the
    /// creator id out of it.
    pub async fn party(&self, party_id: &str) -> Result<PartyDetail, ApiError> {
        self.get(&format!("/api/party/{party_id}")).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|source| ApiError::Request {
                path: path.to_string(),
                source,
            })?;
        Self::decode(path, response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Request {
                path: path.to_string(),
                source,
            })?;
        Self::decode(path, response).await
    }

    async fn decode<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                path: path.to_string(),
                status,
                body,
            });
        }

        response.json::<T>().await.map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }
}
